// crates/db/src/util.rs
//! Row-shape <-> domain-shape translation helpers shared by every
//! repository.

use chrono::{DateTime, Utc};
use tracing::warn;

/// Decode a JSON-encoded string array column. A decode failure yields an
/// empty array (logged), never a crash.
pub fn decode_string_array(raw: &str, context: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(context, error = %e, "failed to decode JSON string array, using empty array");
            Vec::new()
        }
    }
}

pub fn encode_string_array(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(raw, error = %e, "failed to parse timestamp, using epoch");
            DateTime::<Utc>::UNIX_EPOCH
        })
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_string_array_empty_on_malformed_json() {
        assert_eq!(decode_string_array("not json", "test"), Vec::<String>::new());
        assert_eq!(decode_string_array("", "test"), Vec::<String>::new());
        assert_eq!(
            decode_string_array(r#"["a","b"]"#, "test"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn timestamp_round_trips() {
        let now = Utc::now();
        let formatted = format_timestamp(&now);
        let parsed = parse_timestamp(&formatted);
        assert_eq!(now.timestamp_millis(), parsed.timestamp_millis());
    }
}
