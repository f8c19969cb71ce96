// crates/db/src/session.rs
//! Session repository.

use agent_memory_core::types::{Session, SessionStatus};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::util::{format_timestamp, parse_timestamp};

#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Session {
    let status: String = row.get("status");
    Session {
        id: row.get("id"),
        project_path: row.get("project_path"),
        started_at: parse_timestamp(row.get::<String, _>("started_at").as_str()),
        ended_at: row
            .get::<Option<String>, _>("ended_at")
            .map(|s| parse_timestamp(&s)),
        status: SessionStatus::parse(&status).unwrap_or(SessionStatus::Active),
        observation_count: row.get("observation_count"),
        summary_id: row.get("summary_id"),
    }
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new session for `project_path`, status=active.
    pub async fn create(&self, project_path: &str) -> DbResult<Session> {
        let id = Uuid::new_v4().to_string();
        let started_at = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO sessions (id, project_path, started_at, status, observation_count)
             VALUES (?, ?, ?, 'active', 0)",
        )
        .bind(&id)
        .bind(project_path)
        .bind(format_timestamp(&started_at))
        .execute(&self.pool)
        .await?;

        Ok(Session {
            id,
            project_path: project_path.to_string(),
            started_at,
            ended_at: None,
            status: SessionStatus::Active,
            observation_count: 0,
            summary_id: None,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_session))
    }

    pub async fn list_by_project(&self, project_path: &str) -> DbResult<Vec<Session>> {
        let rows = sqlx::query("SELECT * FROM sessions WHERE project_path = ? ORDER BY started_at DESC")
            .bind(project_path)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_session).collect())
    }

    /// Transition a session's status (active -> idle -> completed). Setting
    /// `completed` also stamps `ended_at` if not already set.
    pub async fn set_status(&self, id: &str, status: SessionStatus) -> DbResult<()> {
        if status == SessionStatus::Completed {
            sqlx::query(
                "UPDATE sessions SET status = ?, ended_at = COALESCE(ended_at, ?) WHERE id = ?",
            )
            .bind(status.as_str())
            .bind(format_timestamp(&chrono::Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query("UPDATE sessions SET status = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Recompute `observation_count` to equal the number of non-superseded
    /// observations referencing this session.
    pub async fn recompute_observation_count(&self, session_id: &str) -> DbResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as c FROM observations WHERE session_id = ? AND superseded_by IS NULL",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;
        let count: i64 = row.get("c");
        sqlx::query("UPDATE sessions SET observation_count = ? WHERE id = ?")
            .bind(count)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn set_summary_id(&self, session_id: &str, summary_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE sessions SET summary_id = ? WHERE id = ?")
            .bind(summary_id)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_or_require(&self, id: &str) -> DbResult<Session> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("session {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn repo() -> SessionRepository {
        let db = Database::open_in_memory().await.unwrap();
        SessionRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn create_and_read_back() {
        let repo = repo().await;
        let s = repo.create("/p").await.unwrap();
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.observation_count, 0);

        let fetched = repo.get_or_require(&s.id).await.unwrap();
        assert_eq!(fetched.project_path, "/p");
    }

    #[tokio::test]
    async fn status_transitions_stamp_ended_at_only_on_completion() {
        let repo = repo().await;
        let s = repo.create("/p").await.unwrap();
        repo.set_status(&s.id, SessionStatus::Idle).await.unwrap();
        let fetched = repo.get_or_require(&s.id).await.unwrap();
        assert_eq!(fetched.status, SessionStatus::Idle);
        assert!(fetched.ended_at.is_none());

        repo.set_status(&s.id, SessionStatus::Completed).await.unwrap();
        let fetched = repo.get_or_require(&s.id).await.unwrap();
        assert_eq!(fetched.status, SessionStatus::Completed);
        assert!(fetched.ended_at.is_some());
    }

    #[tokio::test]
    async fn list_by_project_filters_and_orders() {
        let repo = repo().await;
        repo.create("/p").await.unwrap();
        repo.create("/other").await.unwrap();
        let sessions = repo.list_by_project("/p").await.unwrap();
        assert_eq!(sessions.len(), 1);
    }
}
