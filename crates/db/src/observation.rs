// crates/db/src/observation.rs
//! Observation repository: create/read/update/delete, full-text search,
//! timeline and supersession.

use agent_memory_core::provider::ObservationDraft;
use agent_memory_core::tokens;
use agent_memory_core::types::{Observation, ObservationIndexEntry, ObservationType};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::util::{decode_string_array, encode_string_array, format_timestamp, parse_timestamp};

#[derive(Clone)]
pub struct ObservationRepository {
    pool: SqlitePool,
}

fn row_to_observation(row: &sqlx::sqlite::SqliteRow) -> Observation {
    let obs_type: String = row.get("obs_type");
    let embedding_raw: Option<String> = row.get("embedding");
    let embedding = embedding_raw.and_then(|raw| match serde_json::from_str::<Vec<f32>>(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(error = %e, "corrupt embedding JSON, treating as absent");
            None
        }
    });

    Observation {
        id: row.get("id"),
        session_id: row.get("session_id"),
        obs_type: ObservationType::parse(&obs_type).unwrap_or(ObservationType::Change),
        title: row.get("title"),
        subtitle: row.get("subtitle"),
        facts: decode_string_array(&row.get::<String, _>("facts"), "observation.facts"),
        narrative: row.get("narrative"),
        concepts: decode_string_array(&row.get::<String, _>("concepts"), "observation.concepts"),
        files_read: decode_string_array(&row.get::<String, _>("files_read"), "observation.files_read"),
        files_modified: decode_string_array(
            &row.get::<String, _>("files_modified"),
            "observation.files_modified",
        ),
        raw_output: row.get("raw_output"),
        tool_name: row.get("tool_name"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        token_count: row.get("token_count"),
        discovery_tokens: row.get("discovery_tokens"),
        importance: row.get("importance"),
        embedding,
        superseded_by: row.get("superseded_by"),
        superseded_at: row
            .get::<Option<String>, _>("superseded_at")
            .map(|s| parse_timestamp(&s)),
    }
}

impl ObservationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        session_id: &str,
        draft: &ObservationDraft,
        tool_name: &str,
        raw_output: &str,
    ) -> DbResult<Observation> {
        let id = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now();
        let token_count = tokens::estimate(&draft.narrative);
        let discovery_tokens = tokens::discovery_tokens(raw_output, token_count);
        let importance = if (1..=5).contains(&draft.importance) {
            draft.importance
        } else {
            Observation::DEFAULT_IMPORTANCE
        };

        sqlx::query(
            "INSERT INTO observations
                (id, session_id, obs_type, title, subtitle, facts, narrative, concepts,
                 files_read, files_modified, raw_output, tool_name, created_at,
                 token_count, discovery_tokens, importance)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(session_id)
        .bind(draft.obs_type.as_str())
        .bind(&draft.title)
        .bind(&draft.subtitle)
        .bind(encode_string_array(&draft.facts))
        .bind(&draft.narrative)
        .bind(encode_string_array(&draft.concepts))
        .bind(encode_string_array(&draft.files_read))
        .bind(encode_string_array(&draft.files_modified))
        .bind(raw_output)
        .bind(tool_name)
        .bind(format_timestamp(&created_at))
        .bind(token_count)
        .bind(discovery_tokens)
        .bind(importance)
        .execute(&self.pool)
        .await?;

        Ok(Observation {
            id,
            session_id: session_id.to_string(),
            obs_type: draft.obs_type,
            title: draft.title.clone(),
            subtitle: draft.subtitle.clone(),
            facts: draft.facts.clone(),
            narrative: draft.narrative.clone(),
            concepts: draft.concepts.clone(),
            files_read: draft.files_read.clone(),
            files_modified: draft.files_modified.clone(),
            raw_output: raw_output.to_string(),
            tool_name: tool_name.to_string(),
            created_at,
            token_count,
            discovery_tokens,
            importance,
            embedding: None,
            superseded_by: None,
            superseded_at: None,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Observation>> {
        let row = sqlx::query("SELECT * FROM observations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_observation))
    }

    /// Lightweight index entries for a project, newest first. Excludes
    /// superseded rows unless `include_superseded`.
    pub async fn get_index(
        &self,
        project_path: &str,
        include_superseded: bool,
    ) -> DbResult<Vec<ObservationIndexEntry>> {
        let sql = if include_superseded {
            "SELECT o.* FROM observations o JOIN sessions s ON s.id = o.session_id
             WHERE s.project_path = ? ORDER BY o.created_at DESC"
        } else {
            "SELECT o.* FROM observations o JOIN sessions s ON s.id = o.session_id
             WHERE s.project_path = ? AND o.superseded_by IS NULL ORDER BY o.created_at DESC"
        };
        let rows = sqlx::query(sql).bind(project_path).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(row_to_observation)
            .map(|o| ObservationIndexEntry::from(&o))
            .collect())
    }

    /// Reverse-chronological timeline for a session (or whole project when
    /// `session_id` is None).
    pub async fn timeline(
        &self,
        project_path: &str,
        session_id: Option<&str>,
        limit: i64,
        include_superseded: bool,
    ) -> DbResult<Vec<Observation>> {
        let mut sql = String::from(
            "SELECT o.* FROM observations o JOIN sessions s ON s.id = o.session_id WHERE s.project_path = ?",
        );
        if session_id.is_some() {
            sql.push_str(" AND o.session_id = ?");
        }
        if !include_superseded {
            sql.push_str(" AND o.superseded_by IS NULL");
        }
        sql.push_str(" ORDER BY o.created_at DESC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(project_path);
        if let Some(sid) = session_id {
            query = query.bind(sid);
        }
        query = query.bind(limit);
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_observation).collect())
    }

    /// Full-text search over title/subtitle/narrative/facts/concepts/files,
    /// ranked by FTS5 bm25 (lower is better); returns (observation, rank)
    /// with rank 0-based, best first. Always excludes superseded rows.
    pub async fn search_fts(&self, query: &str, limit: i64) -> DbResult<Vec<Observation>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT o.* FROM observations_fts f
             JOIN observations o ON o.rowid = f.rowid
             WHERE observations_fts MATCH ? AND o.superseded_by IS NULL
             ORDER BY bm25(observations_fts) LIMIT ?",
        )
        .bind(fts_query_escape(trimmed))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_observation).collect())
    }

    /// Mark `old` as superseded by `new`, atomically. `new` must exist and
    /// must not itself be superseded.
    pub async fn supersede(&self, old_id: &str, new_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let new_row = sqlx::query("SELECT superseded_by FROM observations WHERE id = ?")
            .bind(new_id)
            .fetch_optional(&mut *tx)
            .await?;
        let new_row = new_row.ok_or_else(|| DbError::NotFound(format!("observation {new_id}")))?;
        let new_superseded_by: Option<String> = new_row.get("superseded_by");
        if new_superseded_by.is_some() {
            return Err(DbError::InvalidState(format!(
                "cannot supersede with {new_id}: it is itself superseded"
            )));
        }

        let now = format_timestamp(&chrono::Utc::now());
        let result = sqlx::query(
            "UPDATE observations SET superseded_by = ?, superseded_at = ? WHERE id = ? AND superseded_by IS NULL",
        )
        .bind(new_id)
        .bind(&now)
        .bind(old_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("observation {old_id}")));
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn set_embedding(&self, id: &str, embedding: Option<&[f32]>) -> DbResult<()> {
        let raw = embedding.map(|e| serde_json::to_string(e).unwrap_or_else(|_| "null".to_string()));
        sqlx::query("UPDATE observations SET embedding = ? WHERE id = ?")
            .bind(raw)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Candidates with a non-null stored embedding, most recent first,
    /// capped at `limit` (used by the in-process cosine fallback when no
    /// native vector index is available).
    pub async fn candidates_with_embedding(&self, limit: i64) -> DbResult<Vec<Observation>> {
        let rows = sqlx::query(
            "SELECT * FROM observations WHERE embedding IS NOT NULL AND superseded_by IS NULL
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_observation).collect())
    }

    /// Generic field update used by the `mem-update` MCP tool. Only
    /// non-`None` fields are applied.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_fields(
        &self,
        id: &str,
        title: Option<&str>,
        subtitle: Option<&str>,
        narrative: Option<&str>,
        importance: Option<i32>,
        concepts: Option<&[String]>,
    ) -> DbResult<()> {
        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("observation {id}")))?;

        let title = title.unwrap_or(&existing.title);
        let subtitle = subtitle.unwrap_or(&existing.subtitle);
        let narrative = narrative.unwrap_or(&existing.narrative);
        let importance = importance.unwrap_or(existing.importance);
        let concepts_owned;
        let concepts = match concepts {
            Some(c) => {
                concepts_owned = c.to_vec();
                &concepts_owned
            }
            None => &existing.concepts,
        };

        sqlx::query(
            "UPDATE observations SET title = ?, subtitle = ?, narrative = ?, importance = ?, concepts = ?
             WHERE id = ?",
        )
        .bind(title)
        .bind(subtitle)
        .bind(narrative)
        .bind(importance.clamp(1, 5))
        .bind(encode_string_array(concepts))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM observations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns the project path for the session owning an observation, used
    /// by the MCP layer's project-isolation check.
    pub async fn project_path_for(&self, observation_id: &str) -> DbResult<Option<String>> {
        let row = sqlx::query(
            "SELECT s.project_path as project_path FROM observations o
             JOIN sessions s ON s.id = o.session_id WHERE o.id = ?",
        )
        .bind(observation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get::<String, _>("project_path")))
    }
}

/// FTS5 MATCH syntax treats bare punctuation specially; wrap each token in
/// quotes so arbitrary user queries (including literal OR/AND/NOT as plain
/// words) behave predictably while still allowing the caller to pass
/// explicit boolean operators.
fn fts_query_escape(q: &str) -> String {
    q.split_whitespace()
        .map(|tok| {
            if matches!(tok, "OR" | "AND" | "NOT") {
                tok.to_string()
            } else {
                format!("\"{}\"", tok.replace('"', "\"\""))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRepository;
    use crate::Database;

    async fn repos() -> (SessionRepository, ObservationRepository) {
        let db = Database::open_in_memory().await.unwrap();
        (
            SessionRepository::new(db.pool().clone()),
            ObservationRepository::new(db.pool().clone()),
        )
    }

    fn draft(title: &str) -> ObservationDraft {
        ObservationDraft {
            obs_type: ObservationType::Discovery,
            title: title.to_string(),
            subtitle: "sub".to_string(),
            facts: vec!["fact1".to_string(), "fact2".to_string()],
            narrative: "narrative text".to_string(),
            concepts: vec!["OAuth2".to_string()],
            files_read: vec!["src/auth.ts".to_string()],
            files_modified: vec![],
            importance: 5,
        }
    }

    #[tokio::test]
    async fn create_and_round_trip_array_fields() {
        let (sessions, observations) = repos().await;
        let s = sessions.create("/p").await.unwrap();
        let created = observations
            .create(&s.id, &draft("old"), "Read", "raw output")
            .await
            .unwrap();
        let fetched = observations.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.facts, vec!["fact1", "fact2"]);
        assert_eq!(fetched.concepts, vec!["OAuth2"]);
        assert_eq!(fetched.files_read, vec!["src/auth.ts"]);
    }

    #[tokio::test]
    async fn supersede_hides_from_index_and_fts() {
        let (sessions, observations) = repos().await;
        let s = sessions.create("/p").await.unwrap();
        let old = observations.create(&s.id, &draft("old"), "Read", "x").await.unwrap();
        let new = observations.create(&s.id, &draft("new"), "Read", "x").await.unwrap();

        observations.supersede(&old.id, &new.id).await.unwrap();

        let index = observations.get_index("/p", false).await.unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].id, new.id);

        let index_all = observations.get_index("/p", true).await.unwrap();
        assert_eq!(index_all.len(), 2);

        let hits = observations.search_fts("old", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn supersede_rejects_chaining_through_a_superseded_target() {
        let (sessions, observations) = repos().await;
        let s = sessions.create("/p").await.unwrap();
        let a = observations.create(&s.id, &draft("a"), "Read", "x").await.unwrap();
        let b = observations.create(&s.id, &draft("b"), "Read", "x").await.unwrap();
        let c = observations.create(&s.id, &draft("c"), "Read", "x").await.unwrap();
        observations.supersede(&a.id, &b.id).await.unwrap();
        let err = observations.supersede(&c.id, &a.id).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn fts_tracks_insert_delete_update() {
        let (sessions, observations) = repos().await;
        let s = sessions.create("/p").await.unwrap();
        let o = observations
            .create(&s.id, &draft("uniquetoken123"), "Read", "x")
            .await
            .unwrap();
        assert_eq!(observations.search_fts("uniquetoken123", 10).await.unwrap().len(), 1);

        observations
            .update_fields(&o.id, Some("renamed456"), None, None, None, None)
            .await
            .unwrap();
        assert!(observations.search_fts("uniquetoken123", 10).await.unwrap().is_empty());
        assert_eq!(observations.search_fts("renamed456", 10).await.unwrap().len(), 1);

        observations.delete(&o.id).await.unwrap();
        assert!(observations.search_fts("renamed456", 10).await.unwrap().is_empty());
    }
}
