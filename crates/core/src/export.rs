// crates/core/src/export.rs
//! Export/import document shape. Rendered and
//! parsed by the db crate's repositories; this module only owns the wire
//! shape so both db and mcp can share it without a cyclic dependency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Observation, SessionSummary};

pub const EXPORT_VERSION: i32 = 1;

/// An observation as it appears in an export document: the raw tool
/// output is omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedObservation {
    pub id: String,
    pub session_id: String,
    pub obs_type: String,
    pub title: String,
    pub subtitle: String,
    pub facts: Vec<String>,
    pub narrative: String,
    pub concepts: Vec<String>,
    pub files_read: Vec<String>,
    pub files_modified: Vec<String>,
    pub tool_name: String,
    pub created_at: DateTime<Utc>,
    pub token_count: i64,
    pub discovery_tokens: i64,
    pub importance: i32,
    pub superseded_by: Option<String>,
    pub superseded_at: Option<DateTime<Utc>>,
}

impl From<&Observation> for ExportedObservation {
    fn from(o: &Observation) -> Self {
        ExportedObservation {
            id: o.id.clone(),
            session_id: o.session_id.clone(),
            obs_type: o.obs_type.as_str().to_string(),
            title: o.title.clone(),
            subtitle: o.subtitle.clone(),
            facts: o.facts.clone(),
            narrative: o.narrative.clone(),
            concepts: o.concepts.clone(),
            files_read: o.files_read.clone(),
            files_modified: o.files_modified.clone(),
            tool_name: o.tool_name.clone(),
            created_at: o.created_at,
            token_count: o.token_count,
            discovery_tokens: o.discovery_tokens,
            importance: o.importance,
            superseded_by: o.superseded_by.clone(),
            superseded_at: o.superseded_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: i32,
    #[serde(rename = "exportedAt")]
    pub exported_at: DateTime<Utc>,
    pub project: String,
    pub observations: Vec<ExportedObservation>,
    pub summaries: Vec<SessionSummary>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("unsupported export version: {0}")]
    UnsupportedVersion(i32),

    #[error("malformed export document: {0}")]
    Malformed(String),
}

/// Validate the top-level shape and version of an import payload. Returns
/// the parsed document on success; individual duplicate-id skipping
/// happens in the repository layer.
pub fn parse_import(json: &str) -> Result<ExportDocument, ImportError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ImportError::Malformed(e.to_string()))?;
    let version = value
        .get("version")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ImportError::Malformed("missing version".to_string()))? as i32;
    if version != EXPORT_VERSION {
        return Err(ImportError::UnsupportedVersion(version));
    }
    serde_json::from_value(value).map_err(|e| ImportError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_version() {
        let doc = r#"{"version":2,"exportedAt":"2026-01-01T00:00:00Z","project":"/p","observations":[],"summaries":[]}"#;
        let err = parse_import(doc).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedVersion(2)));
    }

    #[test]
    fn rejects_missing_version() {
        let doc = r#"{"project":"/p","observations":[],"summaries":[]}"#;
        assert!(parse_import(doc).is_err());
    }

    #[test]
    fn accepts_well_formed_v1_document() {
        let doc = r#"{"version":1,"exportedAt":"2026-01-01T00:00:00Z","project":"/p","observations":[],"summaries":[]}"#;
        let parsed = parse_import(doc).expect("should parse");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.project, "/p");
    }
}
