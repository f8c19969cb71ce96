// crates/core/src/provider.rs
//! The three external AI collaborators consumed by the core, modeled as
//! pure async function signatures.
//! Concrete implementations (an actual LLM client, an embedding API) live
//! outside this core and are injected as trait objects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::types::ObservationType;

/// The draft an observation is built from before an id/session/created_at
/// are assigned by the repository layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationDraft {
    pub obs_type: ObservationType,
    pub title: String,
    pub subtitle: String,
    pub facts: Vec<String>,
    pub narrative: String,
    pub concepts: Vec<String>,
    pub files_read: Vec<String>,
    pub files_modified: Vec<String>,
    pub importance: i32,
}

impl ObservationDraft {
    /// The deterministic fallback draft substituted when the real
    /// compressor fails.
    pub fn fallback(tool_name: &str, tool_output: &str) -> Self {
        const NARRATIVE_TRUNCATE_CHARS: usize = 500;
        let narrative: String = tool_output.chars().take(NARRATIVE_TRUNCATE_CHARS).collect();
        ObservationDraft {
            obs_type: ObservationType::Change,
            title: format!("{tool_name} execution"),
            subtitle: String::new(),
            facts: Vec::new(),
            narrative,
            concepts: Vec::new(),
            files_read: Vec::new(),
            files_modified: Vec::new(),
            importance: crate::types::Observation::DEFAULT_IMPORTANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummaryDraft {
    pub request: String,
    pub investigated: String,
    pub learned: String,
    pub completed: String,
    pub next_steps: String,
    pub summary: String,
    pub key_decisions: Vec<String>,
    pub files_modified: Vec<String>,
    pub concepts: Vec<String>,
}

/// `compress(input) -> ObservationDraft | Error`.
#[async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(
        &self,
        tool_output: &str,
        tool_name: &str,
    ) -> Result<ObservationDraft, ProviderError>;
}

/// `summarize(session-observations) -> SessionSummaryDraft | Error`.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        observations: &[crate::types::Observation],
    ) -> Result<SessionSummaryDraft, ProviderError>;
}

/// `embed(text) -> vector | null`. A `None` result means "no embedding
/// available for this item" and is not an error.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, ProviderError>;

    /// Fixed output dimension, used for vector-table initialization checks.
    fn dimension(&self) -> usize;
}

/// A candidate handed to the reranker; mirrors the shape search produces
/// before any rerank pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankCandidate {
    pub observation: crate::types::Observation,
    pub rank: usize,
    pub snippet: String,
}

/// `rerank(query, results, limit) -> results`. On failure the caller must
/// fall back to the pre-rerank order.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RerankCandidate>,
        limit: usize,
    ) -> Result<Vec<RerankCandidate>, ProviderError>;
}
