// crates/core/src/tokens.rs
//! Crude token estimation shared by the fallback compressor, the
//! progressive context builder's token-efficiency term, and the MCP
//! payload accounting. A real tokenizer lives with the external AI
//! collaborator; this is the core's own conservative estimate used when
//! no provider-reported count is available.

/// Roughly 4 characters per token, the same heuristic commonly used for
/// English prose token-budget estimates.
pub fn estimate(text: &str) -> i64 {
    let chars = text.chars().count();
    ((chars as f64) / 4.0).ceil() as i64
}

/// Discovery-tokens ROI metric: tokens saved versus re-reading the raw
/// tool output.
pub fn discovery_tokens(raw_output: &str, observation_token_count: i64) -> i64 {
    (estimate(raw_output) - observation_token_count).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_scales_with_length() {
        assert_eq!(estimate(""), 0);
        assert_eq!(estimate("abcd"), 1);
        assert_eq!(estimate("abcdefgh"), 2);
    }

    #[test]
    fn discovery_tokens_never_negative() {
        assert_eq!(discovery_tokens("short", 1000), 0);
        assert!(discovery_tokens(&"x".repeat(4000), 5) > 0);
    }
}
