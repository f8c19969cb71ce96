// crates/db/src/pending.rs
//! Pending message queue repository. Transitions form a monotone lattice
//! pending < processing < {completed, failed}, with the sole exception of
//! the stale-reset edge processing -> pending.

use agent_memory_core::types::{MessageStatus, PendingMessage};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::DbResult;
use crate::util::{format_timestamp, parse_timestamp};

#[derive(Clone)]
pub struct PendingRepository {
    pool: SqlitePool,
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> PendingMessage {
    let status: String = row.get("status");
    PendingMessage {
        id: row.get("id"),
        session_id: row.get("session_id"),
        tool_name: row.get("tool_name"),
        tool_output: row.get("tool_output"),
        call_id: row.get("call_id"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        status: MessageStatus::parse(&status).unwrap_or(MessageStatus::Pending),
        retry_count: row.get("retry_count"),
        last_error: row.get("last_error"),
    }
}

impl PendingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert one pending row; FIFO order is preserved by `created_at`.
    pub async fn enqueue(
        &self,
        session_id: &str,
        tool_name: &str,
        tool_output: &str,
        call_id: &str,
    ) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO pending_messages (id, session_id, tool_name, tool_output, call_id, created_at, status, retry_count)
             VALUES (?, ?, ?, ?, ?, ?, 'pending', 0)",
        )
        .bind(&id)
        .bind(session_id)
        .bind(tool_name)
        .bind(tool_output)
        .bind(call_id)
        .bind(format_timestamp(&chrono::Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Oldest-first pending rows, bounded by `limit`.
    pub async fn get_pending(&self, limit: i64) -> DbResult<Vec<PendingMessage>> {
        let rows = sqlx::query(
            "SELECT * FROM pending_messages WHERE status = 'pending' ORDER BY created_at ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    pub async fn mark_processing(&self, id: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE pending_messages SET status = 'processing', processing_started_at = ? WHERE id = ?",
        )
        .bind(format_timestamp(&chrono::Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_completed(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE pending_messages SET status = 'completed' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE pending_messages SET status = 'failed', retry_count = retry_count + 1, last_error = ? WHERE id = ?",
        )
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Atomically move every `processing` row older than the cutoff back to
    /// `pending`; returns the count reset.
    pub async fn reset_stale(&self, older_than_minutes: i64) -> DbResult<u64> {
        let cutoff = chrono::Utc::now() - chrono::Duration::minutes(older_than_minutes);
        let result = sqlx::query(
            "UPDATE pending_messages SET status = 'pending', processing_started_at = NULL
             WHERE status = 'processing' AND processing_started_at < ?",
        )
        .bind(format_timestamp(&cutoff))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PendingMessage>> {
        let row = sqlx::query("SELECT * FROM pending_messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_message))
    }

    /// Delete completed messages older than `days`; returns the count
    /// deleted.
    pub async fn delete_completed_older_than(&self, days: u32) -> DbResult<u64> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(days as i64);
        let result = sqlx::query("DELETE FROM pending_messages WHERE status = 'completed' AND created_at < ?")
            .bind(format_timestamp(&cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
