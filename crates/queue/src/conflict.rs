// crates/queue/src/conflict.rs
//! Conflict-detection similarity. The policy bands (auto-supersede above
//! the upper band, log-only above the lower band) are fixed; the
//! similarity formula is a Jaccard blend over concepts/files, weighted
//! with narrative token overlap.

use agent_memory_core::types::Observation;
use std::collections::HashSet;

/// Narrative overlap plus shared concepts/files, weighted to favor
/// concepts (the most deliberate signal an author gives) over incidental
/// narrative wording.
pub fn similarity(a: &Observation, b: &Observation) -> f32 {
    let concepts = jaccard(&a.concepts, &b.concepts);
    let files = jaccard(&a.files_modified, &b.files_modified);
    let narrative = jaccard(&tokenize(&a.narrative), &tokenize(&b.narrative));
    0.4 * concepts + 0.3 * files + 0.3 * narrative
}

fn jaccard(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let sa: HashSet<&str> = a.iter().map(String::as_str).collect();
    let sb: HashSet<&str> = b.iter().map(String::as_str).collect();
    let inter = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        0.0
    } else {
        inter as f32 / union as f32
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(concepts: &[&str], files: &[&str], narrative: &str) -> Observation {
        use agent_memory_core::types::ObservationType;
        Observation {
            id: "id".into(),
            session_id: "s".into(),
            obs_type: ObservationType::Change,
            title: "t".into(),
            subtitle: String::new(),
            facts: vec![],
            narrative: narrative.into(),
            concepts: concepts.iter().map(|s| s.to_string()).collect(),
            files_read: vec![],
            files_modified: files.iter().map(|s| s.to_string()).collect(),
            raw_output: String::new(),
            tool_name: "Edit".into(),
            created_at: chrono::Utc::now(),
            token_count: 0,
            discovery_tokens: 0,
            importance: 3,
            embedding: None,
            superseded_by: None,
            superseded_at: None,
        }
    }

    #[test]
    fn identical_observations_score_one() {
        let a = obs(&["auth", "jwt"], &["src/auth.rs"], "rewrote the login flow");
        let b = obs(&["auth", "jwt"], &["src/auth.rs"], "rewrote the login flow");
        assert!((similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unrelated_observations_score_near_zero() {
        let a = obs(&["auth"], &["src/auth.rs"], "rewrote the login flow");
        let b = obs(&["billing"], &["src/billing.rs"], "fixed the invoice renderer");
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn partial_overlap_scores_between_bounds() {
        let a = obs(&["auth", "jwt"], &["src/auth.rs"], "rewrote the login flow");
        let b = obs(&["auth", "oauth"], &["src/auth.rs"], "rewrote the login screen");
        let score = similarity(&a, &b);
        assert!(score > 0.0 && score < 1.0);
    }
}
