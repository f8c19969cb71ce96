// crates/db/src/retention.rs
//! Retention operations. Both never touch data
//! belonging to active/idle sessions.

use sqlx::SqlitePool;

use crate::error::DbResult;
use crate::util::format_timestamp;

/// Delete observations belonging to `completed` sessions whose
/// `created_at` is older than `days`. Returns the count deleted. Never
/// deletes observations in active or idle sessions.
pub async fn delete_observations_older_than(pool: &SqlitePool, days: u32) -> DbResult<u64> {
    let cutoff = chrono::Utc::now() - chrono::Duration::days(days as i64);
    let result = sqlx::query(
        "DELETE FROM observations WHERE id IN (
            SELECT o.id FROM observations o
            JOIN sessions s ON s.id = o.session_id
            WHERE s.status = 'completed' AND o.created_at < ?
        )",
    )
    .bind(format_timestamp(&cutoff))
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Delete completed pending-queue entries older than `days`. Returns the
/// count deleted.
pub async fn delete_completed_messages_older_than(pool: &SqlitePool, days: u32) -> DbResult<u64> {
    let cutoff = chrono::Utc::now() - chrono::Duration::days(days as i64);
    let result = sqlx::query("DELETE FROM pending_messages WHERE status = 'completed' AND created_at < ?")
        .bind(format_timestamp(&cutoff))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
