// crates/search/src/orchestrator.rs
//! The hybrid search orchestrator (C6): dispatches across three
//! strategies, fuses full-text and vector result streams with RRF,
//! applies post-filters, optionally augments via the entity graph,
//! optionally reranks, and optionally merges in a user-level memory DB.

use std::collections::HashMap;
use std::sync::Arc;

use agent_memory_core::provider::{Embedder, RerankCandidate, Reranker};
use agent_memory_core::types::Observation;
use agent_memory_db::vector::VectorIndexKind;
use agent_memory_db::{DbResult, EntityRepository, ObservationRepository};
use sqlx::SqlitePool;

use crate::entity_augment::augment_with_entity_graph;
use crate::rrf::reciprocal_rank_fusion;
use crate::types::{ResultSource, SearchFilters, SearchRequest, SearchResultItem, SearchStrategy};
use crate::vector_search::{in_process_cosine, native_knn, VectorHit};

const DEFAULT_LIMIT: usize = 10;

/// A second project-independent database consulted after the primary
/// project DB; its results are appended and tagged `ResultSource::User`.
pub struct UserMemory {
    pub observations: ObservationRepository,
}

pub struct SearchOrchestrator {
    pool: SqlitePool,
    observations: ObservationRepository,
    entities: Option<EntityRepository>,
    embedder: Option<Arc<dyn Embedder>>,
    reranker: Option<Arc<dyn Reranker>>,
    vector_kind: VectorIndexKind,
    user_memory: Option<UserMemory>,
    /// Cap on candidates handed to the reranker.
    max_rerank_candidates: usize,
}

impl SearchOrchestrator {
    pub fn new(pool: SqlitePool, observations: ObservationRepository, vector_kind: VectorIndexKind) -> Self {
        Self {
            pool,
            observations,
            entities: None,
            embedder: None,
            reranker: None,
            vector_kind,
            user_memory: None,
            max_rerank_candidates: 50,
        }
    }

    pub fn with_entities(mut self, entities: EntityRepository) -> Self {
        self.entities = Some(entities);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_user_memory(mut self, user_memory: UserMemory) -> Self {
        self.user_memory = Some(user_memory);
        self
    }

    pub async fn search(&self, request: &SearchRequest) -> DbResult<Vec<SearchResultItem>> {
        let limit = request.limit.unwrap_or(DEFAULT_LIMIT).max(1);

        let mut results = match request.strategy {
            SearchStrategy::FilterOnly => {
                self.search_filter_only(&self.observations, &request.query, &request.filters, limit)
                    .await?
            }
            SearchStrategy::Semantic => self.search_semantic(&request.query, &request.filters, limit).await?,
            SearchStrategy::Hybrid => self.search_hybrid(&request.query, &request.filters, limit).await?,
        };

        if let Some(entities) = &self.entities {
            augment_with_entity_graph(entities, &self.observations, &request.query, &mut results, limit).await?;
        }

        if let Some(reranker) = &self.reranker {
            if results.len() > 1 {
                results = self.rerank(reranker.as_ref(), &request.query, results, limit).await;
            }
        }

        if let Some(user_memory) = &self.user_memory {
            let mut user_results = self
                .search_filter_only(&user_memory.observations, &request.query, &request.filters, limit)
                .await?;
            for r in &mut user_results {
                r.source = ResultSource::User;
            }
            results.extend(user_results);
        }

        results.truncate(limit);
        Ok(results)
    }

    async fn rerank(
        &self,
        reranker: &dyn Reranker,
        query: &str,
        results: Vec<SearchResultItem>,
        limit: usize,
    ) -> Vec<SearchResultItem> {
        let sources: HashMap<String, ResultSource> =
            results.iter().map(|r| (r.observation.id.clone(), r.source)).collect();
        let candidates: Vec<RerankCandidate> = results
            .iter()
            .take(self.max_rerank_candidates)
            .map(|r| RerankCandidate {
                observation: r.observation.clone(),
                rank: r.rank,
                snippet: r.snippet.clone(),
            })
            .collect();
        let original = results;

        match reranker.rerank(query, candidates, limit).await {
            Ok(reranked) => reranked
                .into_iter()
                .enumerate()
                .map(|(rank, c)| {
                    let source = sources.get(&c.observation.id).copied().unwrap_or(ResultSource::Project);
                    SearchResultItem {
                        observation: c.observation,
                        rank,
                        snippet: c.snippet,
                        source,
                    }
                })
                .collect(),
            Err(_) => original,
        }
    }

    async fn search_filter_only(
        &self,
        observations: &ObservationRepository,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> DbResult<Vec<SearchResultItem>> {
        let fetch_limit = ((limit * 3).max(limit)) as i64;
        let candidates = observations.search_fts(query, fetch_limit).await?;
        let mut out = Vec::new();
        for obs in candidates {
            if !filters.matches(&obs) {
                continue;
            }
            out.push(SearchResultItem {
                rank: out.len(),
                snippet: snippet(&obs, query),
                observation: obs,
                source: ResultSource::Project,
            });
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    /// Pure vector search; falls back to filter-only when no embedder is
    /// configured or embedding fails.
    async fn search_semantic(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> DbResult<Vec<SearchResultItem>> {
        let embedder = match &self.embedder {
            Some(e) => e,
            None => return self.search_filter_only(&self.observations, query, filters, limit).await,
        };
        let embedding = match embedder.embed(query).await {
            Ok(Some(v)) => v,
            _ => return self.search_filter_only(&self.observations, query, filters, limit).await,
        };

        let hits = self.vector_search(&embedding, &[], limit * 3).await?;
        let mut out = Vec::new();
        for hit in hits {
            if hit.observation.is_superseded() || !filters.matches(&hit.observation) {
                continue;
            }
            out.push(SearchResultItem {
                rank: out.len(),
                snippet: snippet(&hit.observation, query),
                observation: hit.observation,
                source: ResultSource::Project,
            });
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    /// Run FTS and vector search concurrently (by list, not by task), fuse
    /// with RRF. When the FTS list is empty, fall back to the full vector
    /// KNN result rather than fusing against nothing.
    async fn search_hybrid(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> DbResult<Vec<SearchResultItem>> {
        let fts_fetch = ((limit * 3).max(limit)) as i64;
        let fts_results = self.observations.search_fts(query, fts_fetch).await?;
        let fts_ids: Vec<String> = fts_results.iter().map(|o| o.id.clone()).collect();

        let embedding = match &self.embedder {
            Some(embedder) => embedder.embed(query).await.ok().flatten(),
            None => None,
        };

        let vector_hits: Vec<VectorHit> = match embedding {
            Some(vec) => self.vector_search(&vec, &fts_ids, limit * 3).await?,
            None => Vec::new(),
        };
        let vector_ids: Vec<String> = vector_hits.iter().map(|h| h.observation.id.clone()).collect();

        let mut lookup: HashMap<String, Observation> = HashMap::new();
        for o in fts_results {
            lookup.insert(o.id.clone(), o);
        }
        for hit in vector_hits {
            lookup.entry(hit.observation.id.clone()).or_insert(hit.observation);
        }

        let fused: Vec<(String, f64)> = if fts_ids.is_empty() {
            vector_ids
                .iter()
                .enumerate()
                .map(|(rank, id)| (id.clone(), 1.0 / (crate::rrf::RRF_K + rank as f64 + 1.0)))
                .collect()
        } else {
            reciprocal_rank_fusion(&fts_ids, &vector_ids)
        };

        let mut out = Vec::new();
        for (id, _score) in fused {
            let Some(obs) = lookup.get(&id) else { continue };
            if obs.is_superseded() || !filters.matches(obs) {
                continue;
            }
            out.push(SearchResultItem {
                rank: out.len(),
                snippet: snippet(obs, query),
                observation: obs.clone(),
                source: ResultSource::Project,
            });
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    async fn vector_search(
        &self,
        embedding: &[f32],
        candidate_ids: &[String],
        limit: usize,
    ) -> DbResult<Vec<VectorHit>> {
        match self.vector_kind {
            VectorIndexKind::Native => {
                native_knn(&self.pool, &self.observations, embedding, candidate_ids, limit).await
            }
            VectorIndexKind::InProcess => in_process_cosine(&self.observations, embedding, limit).await,
        }
    }
}

/// A short excerpt of the narrative for display; not full-text-highlighted,
/// just the first sentence-ish chunk.
fn snippet(observation: &Observation, _query: &str) -> String {
    const MAX_CHARS: usize = 200;
    observation.narrative.chars().take(MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_memory_core::error::ProviderError;
    use agent_memory_core::provider::ObservationDraft;
    use agent_memory_core::types::ObservationType;
    use agent_memory_db::{Database, SessionRepository};
    use async_trait::async_trait;

    fn draft(title: &str, concepts: &[&str], files: &[&str], importance: i32) -> ObservationDraft {
        ObservationDraft {
            obs_type: ObservationType::Discovery,
            title: title.to_string(),
            subtitle: String::new(),
            facts: vec![],
            narrative: format!("narrative about {title}"),
            concepts: concepts.iter().map(|s| s.to_string()).collect(),
            files_read: files.iter().map(|s| s.to_string()).collect(),
            files_modified: vec![],
            importance,
        }
    }

    async fn build() -> (SearchOrchestrator, ObservationRepository, SessionRepository) {
        let db = Database::open_in_memory().await.unwrap();
        let sessions = SessionRepository::new(db.pool().clone());
        let observations = ObservationRepository::new(db.pool().clone());
        let orchestrator = SearchOrchestrator::new(db.pool().clone(), observations.clone(), VectorIndexKind::InProcess);
        (orchestrator, observations, sessions)
    }

    /// Filter-only strategy narrows by importance bounds and by
    /// concept/file substring matches, with no ranking involved.
    #[tokio::test]
    async fn filter_only_importance_and_concept_file_narrowing() {
        let (orchestrator, observations, sessions) = build().await;
        let s = sessions.create("/project/filters").await.unwrap();

        let importances = [5, 1, 3, 2];
        let mut ids = Vec::new();
        for importance in importances {
            let o = observations
                .create(
                    &s.id,
                    &draft(
                        "authentication OR database OR API OR testing work",
                        if importance == 5 { &["OAuth2"] } else { &[] },
                        if importance == 5 { &["src/auth.ts"] } else { &[] },
                        importance,
                    ),
                    "Read",
                    "x",
                )
                .await
                .unwrap();
            ids.push((o.id, importance));
        }

        let request = SearchRequest {
            query: "authentication OR database OR API OR testing".into(),
            strategy: SearchStrategy::FilterOnly,
            filters: SearchFilters {
                importance_min: Some(3),
                ..Default::default()
            },
            limit: Some(10),
        };
        let results = orchestrator.search(&request).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.observation.importance >= 3));

        let request_narrow = SearchRequest {
            filters: SearchFilters {
                importance_min: Some(3),
                concepts: vec!["OAuth2".into()],
                files: vec!["src/auth.ts".into()],
                ..Default::default()
            },
            ..request
        };
        let narrowed = orchestrator.search(&request_narrow).await.unwrap();
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].observation.importance, 5);
    }

    #[tokio::test]
    async fn supersession_is_excluded_from_search() {
        let (orchestrator, observations, sessions) = build().await;
        let s = sessions.create("/p").await.unwrap();
        let old = observations.create(&s.id, &draft("uniquefindme", &[], &[], 3), "Read", "x").await.unwrap();
        let new = observations.create(&s.id, &draft("uniquefindme2", &[], &[], 3), "Read", "x").await.unwrap();
        observations.supersede(&old.id, &new.id).await.unwrap();

        let request = SearchRequest {
            query: "uniquefindme".into(),
            strategy: SearchStrategy::FilterOnly,
            ..Default::default()
        };
        let results = orchestrator.search(&request).await.unwrap();
        assert!(results.is_empty());
    }

    struct FixedEmbedder(Vec<f32>);
    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Option<Vec<f32>>, ProviderError> {
            Ok(Some(self.0.clone()))
        }
        fn dimension(&self) -> usize {
            self.0.len()
        }
    }

    #[tokio::test]
    async fn semantic_falls_back_to_filter_only_without_embedder() {
        let (orchestrator, observations, sessions) = build().await;
        let s = sessions.create("/p").await.unwrap();
        observations.create(&s.id, &draft("findabletoken", &[], &[], 3), "Read", "x").await.unwrap();

        let request = SearchRequest {
            query: "findabletoken".into(),
            strategy: SearchStrategy::Semantic,
            ..Default::default()
        };
        let results = orchestrator.search(&request).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn hybrid_merges_fts_and_vector_hits() {
        let (orchestrator, observations, sessions) = build().await;
        let orchestrator = orchestrator.with_embedder(Arc::new(FixedEmbedder(vec![1.0, 0.0])));
        let s = sessions.create("/p").await.unwrap();
        let o = observations.create(&s.id, &draft("distinctivetoken", &[], &[], 3).clone(), "Read", "x").await.unwrap();
        observations.set_embedding(&o.id, Some(&[1.0, 0.0])).await.unwrap();

        let request = SearchRequest {
            query: "distinctivetoken".into(),
            strategy: SearchStrategy::Hybrid,
            ..Default::default()
        };
        let results = orchestrator.search(&request).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].observation.id, o.id);
    }
}
