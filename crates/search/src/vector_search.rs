// crates/search/src/vector_search.rs
//! Vector search paths: native KNN against the `vec0`-style virtual table
//! when available, falling back to an in-process cosine scan over
//! `observations.embedding` otherwise.

use agent_memory_core::types::Observation;
use agent_memory_db::vector::cosine_similarity;
use agent_memory_db::{DbResult, ObservationRepository};
use sqlx::{Row, SqlitePool};

/// `{observation, rank}` pair ordered best-first, ready to feed into RRF or
/// the filter-only/semantic assembly.
pub struct VectorHit {
    pub observation: Observation,
    pub rank: usize,
}

/// Native KNN, pre-filtered to `candidate_ids` (the FTS result set) when
/// non-empty, bounded at 3x the requested limit.
pub async fn native_knn(
    pool: &SqlitePool,
    observations: &ObservationRepository,
    query_embedding: &[f32],
    candidate_ids: &[String],
    limit: usize,
) -> DbResult<Vec<VectorHit>> {
    let bound = (limit * 3).max(limit);
    let embedding_json = serde_json::to_string(query_embedding).unwrap_or_else(|_| "[]".to_string());

    let rows = if candidate_ids.is_empty() {
        sqlx::query(
            "SELECT observation_id, distance FROM observation_vectors
             WHERE embedding MATCH ? AND k = ? ORDER BY distance",
        )
        .bind(&embedding_json)
        .bind(bound as i64)
        .fetch_all(pool)
        .await?
    } else {
        let placeholders = candidate_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT observation_id, distance FROM observation_vectors
             WHERE embedding MATCH ? AND k = ? AND observation_id IN ({placeholders})
             ORDER BY distance"
        );
        let mut query = sqlx::query(&sql).bind(&embedding_json).bind(bound as i64);
        for id in candidate_ids {
            query = query.bind(id);
        }
        query.fetch_all(pool).await?
    };

    let mut hits = Vec::with_capacity(rows.len());
    for (rank, row) in rows.iter().enumerate() {
        let id: String = row.get("observation_id");
        if let Some(observation) = observations.get_by_id(&id).await? {
            hits.push(VectorHit { observation, rank });
        }
        if hits.len() >= limit {
            break;
        }
    }
    Ok(hits)
}

/// In-process cosine fallback: load up to 10x limit candidates with a
/// stored embedding, score, drop below 0.3, sort descending, take top N.
pub async fn in_process_cosine(
    observations: &ObservationRepository,
    query_embedding: &[f32],
    limit: usize,
) -> DbResult<Vec<VectorHit>> {
    const MIN_SIMILARITY: f32 = 0.3;
    let pool_size = (limit * 10).max(limit) as i64;
    let candidates = observations.candidates_with_embedding(pool_size).await?;

    let mut scored: Vec<(Observation, f32)> = candidates
        .into_iter()
        .filter_map(|o| {
            let embedding = o.embedding.clone()?;
            let score = cosine_similarity(query_embedding, &embedding);
            (score >= MIN_SIMILARITY).then_some((o, score))
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);

    Ok(scored
        .into_iter()
        .enumerate()
        .map(|(rank, (observation, _))| VectorHit { observation, rank })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_memory_core::provider::ObservationDraft;
    use agent_memory_core::types::ObservationType;
    use agent_memory_db::{Database, SessionRepository};

    fn draft(title: &str) -> ObservationDraft {
        ObservationDraft {
            obs_type: ObservationType::Discovery,
            title: title.to_string(),
            subtitle: String::new(),
            facts: vec![],
            narrative: "n".into(),
            concepts: vec![],
            files_read: vec![],
            files_modified: vec![],
            importance: 3,
        }
    }

    #[tokio::test]
    async fn in_process_cosine_drops_low_similarity_and_sorts_descending() {
        let db = Database::open_in_memory().await.unwrap();
        let sessions = SessionRepository::new(db.pool().clone());
        let observations = ObservationRepository::new(db.pool().clone());
        let s = sessions.create("/p").await.unwrap();

        let close = observations.create(&s.id, &draft("close"), "Read", "x").await.unwrap();
        observations.set_embedding(&close.id, Some(&[1.0, 0.0, 0.0])).await.unwrap();
        let far = observations.create(&s.id, &draft("far"), "Read", "x").await.unwrap();
        observations.set_embedding(&far.id, Some(&[0.0, 1.0, 0.0])).await.unwrap();
        let orthogonal_but_below_threshold = observations.create(&s.id, &draft("unrelated"), "Read", "x").await.unwrap();
        observations
            .set_embedding(&orthogonal_but_below_threshold.id, Some(&[-1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let hits = in_process_cosine(&observations, &[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].observation.id, close.id);
    }

    #[tokio::test]
    async fn in_process_cosine_respects_limit() {
        let db = Database::open_in_memory().await.unwrap();
        let sessions = SessionRepository::new(db.pool().clone());
        let observations = ObservationRepository::new(db.pool().clone());
        let s = sessions.create("/p").await.unwrap();
        for i in 0..5 {
            let o = observations.create(&s.id, &draft(&format!("o{i}")), "Read", "x").await.unwrap();
            observations.set_embedding(&o.id, Some(&[1.0, 0.0, 0.0])).await.unwrap();
        }
        let hits = in_process_cosine(&observations, &[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }
}
