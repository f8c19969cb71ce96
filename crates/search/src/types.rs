// crates/search/src/types.rs
//! Wire/domain types for the search orchestrator: strategies, filters,
//! and the result shape returned to callers.

use agent_memory_core::types::{Observation, ObservationType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three dispatchable search strategies. Modeled as a tagged enum so
/// the orchestrator has one function per variant and no nulls in its
/// code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStrategy {
    FilterOnly,
    Semantic,
    #[default]
    Hybrid,
}

/// Post-retrieval filters; multiple filters combine with AND, and within
/// `concepts`/`files` matching is OR (case-insensitive substring).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub obs_type: Option<ObservationType>,
    pub importance_min: Option<i32>,
    pub importance_max: Option<i32>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub concepts: Vec<String>,
    pub files: Vec<String>,
}

impl SearchFilters {
    /// Returns true if `observation` passes every configured filter.
    /// Superseded-row exclusion is handled upstream by the repositories,
    /// not here.
    pub fn matches(&self, observation: &Observation) -> bool {
        if let Some(t) = self.obs_type {
            if observation.obs_type != t {
                return false;
            }
        }
        if let Some(min) = self.importance_min {
            if observation.importance < min {
                return false;
            }
        }
        if let Some(max) = self.importance_max {
            if observation.importance > max {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if observation.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if observation.created_at > before {
                return false;
            }
        }
        if !self.concepts.is_empty() && !any_substring_match(&observation.concepts, &self.concepts) {
            return false;
        }
        if !self.files.is_empty() {
            let all_files: Vec<&String> = observation
                .files_read
                .iter()
                .chain(observation.files_modified.iter())
                .collect();
            let owned: Vec<String> = all_files.into_iter().cloned().collect();
            if !any_substring_match(&owned, &self.files) {
                return false;
            }
        }
        true
    }
}

fn any_substring_match(haystack: &[String], needles: &[String]) -> bool {
    haystack.iter().any(|h| {
        let h_lower = h.to_lowercase();
        needles.iter().any(|n| h_lower.contains(&n.to_lowercase()))
    })
}

/// The source a result came from, used when the user-level memory DB is
/// merged in alongside the project DB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Project,
    User,
}

/// `{observation, rank, snippet}` shaped record returned by both the FTS
/// and vector search paths, and by the final fused/filtered/reranked list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub observation: Observation,
    pub rank: usize,
    pub snippet: String,
    pub source: ResultSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub strategy: SearchStrategy,
    #[serde(default)]
    pub filters: SearchFilters,
    pub limit: Option<usize>,
}
