// crates/search/src/context.rs
//! Progressive Context Builder (C7): assembles a token-bounded payload
//! for the start of a new session from past summaries and observation
//! index entries, sorted by a relevance score.

use agent_memory_core::tokens;
use agent_memory_core::types::{ObservationIndexEntry, SessionSummary};
use chrono::Utc;

/// What the final payload is measured against; reported back as
/// `tokens_used` alongside the assembled items.
#[derive(Debug, Clone, Copy)]
pub struct ContextBudget {
    pub max_tokens: i64,
}

#[derive(Debug, Clone)]
pub enum ContextItem {
    Summary(SessionSummary),
    Observation(ObservationIndexEntry),
}

impl ContextItem {
    fn tokens(&self) -> i64 {
        match self {
            ContextItem::Summary(s) => s.token_count,
            ContextItem::Observation(o) => o.token_count,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgressiveContextPayload {
    pub items: Vec<ContextItem>,
    pub tokens_used: i64,
}

/// Recency/type-importance/session-affinity/token-efficiency weighted
/// relevance score, used to order observation-index entries when a
/// current session is known.
pub fn relevance_score(entry: &ObservationIndexEntry, current_session_id: Option<&str>) -> f64 {
    let age_hours = (Utc::now() - entry.created_at).num_hours().max(0) as f64;
    let recency = if age_hours < 24.0 {
        1.0
    } else if age_hours < 48.0 {
        0.8
    } else if age_hours < 168.0 {
        0.5
    } else {
        0.2
    };

    let type_importance = entry.obs_type.importance_weight();

    let session_affinity = match current_session_id {
        Some(current) => {
            if entry.session_id == current {
                1.0
            } else {
                0.3
            }
        }
        None => 0.5,
    };

    let tokens = entry.token_count as f64;
    let token_efficiency = if tokens <= 10.0 {
        1.0
    } else if tokens >= 200.0 {
        0.2
    } else {
        1.0 - 0.8 * (tokens - 10.0) / (200.0 - 10.0)
    };

    0.4 * recency + 0.3 * type_importance + 0.2 * session_affinity + 0.1 * token_efficiency
}

pub struct ProgressiveContextBuilder {
    current_session_id: Option<String>,
}

impl ProgressiveContextBuilder {
    pub fn new(current_session_id: Option<String>) -> Self {
        Self { current_session_id }
    }

    /// Greedily fills `budget.max_tokens`: summaries first (as many as
    /// fit, most recent first), then observation-index entries, sorted
    /// by relevance when a current session is known, otherwise by
    /// most-recent-first. Ties break by most-recent-first.
    pub fn build(
        &self,
        mut summaries: Vec<SessionSummary>,
        mut entries: Vec<ObservationIndexEntry>,
        budget: ContextBudget,
    ) -> ProgressiveContextPayload {
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if self.current_session_id.is_some() {
            entries.sort_by(|a, b| {
                let score_a = relevance_score(a, self.current_session_id.as_deref());
                let score_b = relevance_score(b, self.current_session_id.as_deref());
                score_b
                    .partial_cmp(&score_a)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            });
        } else {
            entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }

        let mut payload = ProgressiveContextPayload::default();
        let mut remaining = budget.max_tokens;

        for summary in summaries {
            let cost = summary.token_count.max(tokens::estimate(&summary.summary));
            if cost > remaining {
                continue;
            }
            remaining -= cost;
            payload.tokens_used += cost;
            payload.items.push(ContextItem::Summary(summary));
        }

        for entry in entries {
            let cost = entry.token_count;
            if cost > remaining {
                continue;
            }
            remaining -= cost;
            payload.tokens_used += cost;
            payload.items.push(ContextItem::Observation(entry));
        }

        payload
    }
}
