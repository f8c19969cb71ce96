// crates/db/src/summary.rs
//! Session summary repository.

use agent_memory_core::provider::SessionSummaryDraft;
use agent_memory_core::tokens;
use agent_memory_core::types::SessionSummary;
use sqlx::{Row, SqlitePool};

use crate::error::DbResult;
use crate::util::{decode_string_array, encode_string_array, format_timestamp, parse_timestamp};

#[derive(Clone)]
pub struct SummaryRepository {
    pool: SqlitePool,
}

fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> SessionSummary {
    SessionSummary {
        session_id: row.get("session_id"),
        request: row.get("request"),
        investigated: row.get("investigated"),
        learned: row.get("learned"),
        completed: row.get("completed"),
        next_steps: row.get("next_steps"),
        summary: row.get("summary"),
        key_decisions: decode_string_array(&row.get::<String, _>("key_decisions"), "summary.key_decisions"),
        files_modified: decode_string_array(
            &row.get::<String, _>("files_modified"),
            "summary.files_modified",
        ),
        concepts: decode_string_array(&row.get::<String, _>("concepts"), "summary.concepts"),
        token_count: row.get("token_count"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
    }
}

impl SummaryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert the one summary row for a session.
    pub async fn upsert(&self, session_id: &str, draft: &SessionSummaryDraft) -> DbResult<SessionSummary> {
        let token_count = tokens::estimate(&draft.summary);
        let created_at = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO session_summaries
                (session_id, request, investigated, learned, completed, next_steps, summary,
                 key_decisions, files_modified, concepts, token_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                request = excluded.request,
                investigated = excluded.investigated,
                learned = excluded.learned,
                completed = excluded.completed,
                next_steps = excluded.next_steps,
                summary = excluded.summary,
                key_decisions = excluded.key_decisions,
                files_modified = excluded.files_modified,
                concepts = excluded.concepts,
                token_count = excluded.token_count",
        )
        .bind(session_id)
        .bind(&draft.request)
        .bind(&draft.investigated)
        .bind(&draft.learned)
        .bind(&draft.completed)
        .bind(&draft.next_steps)
        .bind(&draft.summary)
        .bind(encode_string_array(&draft.key_decisions))
        .bind(encode_string_array(&draft.files_modified))
        .bind(encode_string_array(&draft.concepts))
        .bind(token_count)
        .bind(format_timestamp(&created_at))
        .execute(&self.pool)
        .await?;

        Ok(SessionSummary {
            session_id: session_id.to_string(),
            request: draft.request.clone(),
            investigated: draft.investigated.clone(),
            learned: draft.learned.clone(),
            completed: draft.completed.clone(),
            next_steps: draft.next_steps.clone(),
            summary: draft.summary.clone(),
            key_decisions: draft.key_decisions.clone(),
            files_modified: draft.files_modified.clone(),
            concepts: draft.concepts.clone(),
            token_count,
            created_at,
        })
    }

    pub async fn get_by_session(&self, session_id: &str) -> DbResult<Option<SessionSummary>> {
        let row = sqlx::query("SELECT * FROM session_summaries WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_summary))
    }

    /// Most recent summaries across a project, newest first (used by the
    /// progressive context builder).
    pub async fn recent_for_project(&self, project_path: &str, limit: i64) -> DbResult<Vec<SessionSummary>> {
        let rows = sqlx::query(
            "SELECT sm.* FROM session_summaries sm
             JOIN sessions s ON s.id = sm.session_id
             WHERE s.project_path = ? ORDER BY sm.created_at DESC LIMIT ?",
        )
        .bind(project_path)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_summary).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRepository;
    use crate::Database;

    #[tokio::test]
    async fn upsert_is_unique_per_session() {
        let db = Database::open_in_memory().await.unwrap();
        let sessions = SessionRepository::new(db.pool().clone());
        let summaries = SummaryRepository::new(db.pool().clone());
        let s = sessions.create("/p").await.unwrap();

        let draft = SessionSummaryDraft {
            request: "r1".into(),
            investigated: "i".into(),
            learned: "l".into(),
            completed: "c".into(),
            next_steps: "n".into(),
            summary: "first".into(),
            key_decisions: vec!["d1".into()],
            files_modified: vec![],
            concepts: vec![],
        };
        summaries.upsert(&s.id, &draft).await.unwrap();
        let draft2 = SessionSummaryDraft {
            summary: "second".into(),
            ..draft
        };
        summaries.upsert(&s.id, &draft2).await.unwrap();

        let fetched = summaries.get_by_session(&s.id).await.unwrap().unwrap();
        assert_eq!(fetched.summary, "second");
    }
}
