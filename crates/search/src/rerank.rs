// crates/search/src/rerank.rs
//! Two reranker variants behind the shared `agent_memory_core::provider::Reranker`
//! trait: a heuristic scorer and an LLM-based scorer. Both honor the
//! contract "on failure, return the input order".

use agent_memory_core::error::ProviderError;
use agent_memory_core::provider::{RerankCandidate, Reranker};
use async_trait::async_trait;
use chrono::Utc;

/// Weighs token overlap, recency decay, type importance, and explicit
/// importance. No external calls; always succeeds.
pub struct HeuristicReranker;

impl HeuristicReranker {
    fn score(query_tokens: &[String], candidate: &RerankCandidate) -> f64 {
        let narrative_tokens: Vec<String> = candidate
            .observation
            .narrative
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        let overlap = if query_tokens.is_empty() {
            0.0
        } else {
            let hits = query_tokens
                .iter()
                .filter(|t| narrative_tokens.iter().any(|n| n == *t))
                .count();
            hits as f64 / query_tokens.len() as f64
        };

        let age_hours = (Utc::now() - candidate.observation.created_at).num_hours().max(0) as f64;
        let recency = if age_hours < 24.0 {
            1.0
        } else if age_hours < 48.0 {
            0.8
        } else if age_hours < 168.0 {
            0.5
        } else {
            0.2
        };

        let type_importance = candidate.observation.obs_type.importance_weight();
        let explicit_importance = (candidate.observation.importance as f64) / 5.0;

        0.35 * overlap + 0.25 * recency + 0.2 * type_importance + 0.2 * explicit_importance
    }
}

#[async_trait]
impl Reranker for HeuristicReranker {
    async fn rerank(
        &self,
        query: &str,
        mut candidates: Vec<RerankCandidate>,
        limit: usize,
    ) -> Result<Vec<RerankCandidate>, ProviderError> {
        let query_tokens: Vec<String> = query.split_whitespace().map(|w| w.to_lowercase()).collect();
        let mut scored: Vec<(f64, RerankCandidate)> = candidates
            .drain(..)
            .map(|c| (Self::score(&query_tokens, &c), c))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, c)| c).collect())
    }
}

/// Returns an ordered list of candidate indices via a structured prompt.
/// Concrete LLM wiring is external (the "reranker" collaborator); this
/// crate only owns the contract: on any failure, or on an empty order,
/// fall back to the input order, and append any indices the LLM omitted
/// in their original order.
#[async_trait]
pub trait IndexOrderingProvider: Send + Sync {
    async fn order_indices(&self, query: &str, count: usize) -> Result<Vec<usize>, ProviderError>;
}

pub struct LlmReranker<P: IndexOrderingProvider> {
    provider: P,
}

impl<P: IndexOrderingProvider> LlmReranker<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: IndexOrderingProvider + Send + Sync> Reranker for LlmReranker<P> {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RerankCandidate>,
        limit: usize,
    ) -> Result<Vec<RerankCandidate>, ProviderError> {
        let order = match self.provider.order_indices(query, candidates.len()).await {
            Ok(order) if !order.is_empty() => order,
            _ => return Ok(candidates.into_iter().take(limit).collect()),
        };

        let mut seen = std::collections::HashSet::new();
        let mut reordered: Vec<RerankCandidate> = Vec::with_capacity(candidates.len());
        let mut pool: Vec<Option<RerankCandidate>> = candidates.into_iter().map(Some).collect();

        for idx in order {
            if idx < pool.len() && seen.insert(idx) {
                if let Some(c) = pool[idx].take() {
                    reordered.push(c);
                }
            }
        }
        // Any index the LLM omitted is appended in original order.
        for (idx, slot) in pool.into_iter().enumerate() {
            if let Some(c) = slot {
                if seen.insert(idx) {
                    reordered.push(c);
                }
            }
        }
        reordered.truncate(limit);
        Ok(reordered)
    }
}
