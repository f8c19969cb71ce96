// crates/db/src/lib.rs
//! The embedded storage engine, search indexes and entity graph
//! repositories for the project memory service.

pub mod entity;
mod error;
pub mod export;
pub mod migrations;
pub mod observation;
pub mod pending;
pub mod retention;
pub mod session;
pub mod summary;
mod util;
pub mod vector;

pub use entity::EntityRepository;
pub use error::{DbError, DbResult};
pub use export::{export_project, import_document, ImportOutcome};
pub use observation::ObservationRepository;
pub use pending::PendingRepository;
pub use session::SessionRepository;
pub use summary::SummaryRepository;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Main database handle wrapping a SQLite connection pool: WAL journal
/// mode, normal synchronous, foreign keys on, a 5s busy timeout.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    db_path: PathBuf,
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn connect_options(path: &Path) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(
        SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
            .disable_statement_logging(),
    )
}

impl Database {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// On configuration failure this runs a two-step recovery dance:
    /// (a) remove the WAL/SHM/journal sidecars and reopen, (b) if still
    /// failing, remove the primary file too. If all three attempts fail,
    /// the original error is surfaced.
    pub async fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let original_err = match Self::try_open(path).await {
            Ok(db) => return Ok(db),
            Err(e) => e,
        };
        warn!(error = %original_err, "initial database open failed, attempting sidecar cleanup");

        for sidecar in agent_memory_core::paths::sidecar_paths(path) {
            let _ = std::fs::remove_file(&sidecar);
        }
        if let Ok(db) = Self::try_open(path).await {
            info!("database reopened after sidecar cleanup");
            return Ok(db);
        }
        warn!("database open still failing after sidecar cleanup, recreating primary file");

        let _ = std::fs::remove_file(path);
        match Self::try_open(path).await {
            Ok(db) => {
                info!("database recreated after full-file reset");
                Ok(db)
            }
            Err(_) => Err(original_err),
        }
    }

    async fn try_open(path: &Path) -> DbResult<Self> {
        let options = connect_options(path)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let db = Database {
            pool,
            db_path: path.to_owned(),
        };
        db.run_migrations().await?;
        Ok(db)
    }

    /// In-memory database for tests: shared cache so every pool connection
    /// sees the same database.
    pub async fn open_in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .shared_cache(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let db = Database {
            pool,
            db_path: PathBuf::new(),
        };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Apply every migration in `migrations::MIGRATIONS` not yet present in
    /// `_migrations`, in ascending order, each in its own transaction
    /// followed by a ledger insert. Running the same set twice is a no-op.
    async fn run_migrations(&self) -> DbResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let applied: Vec<(i64,)> = sqlx::query_as("SELECT version FROM _migrations")
            .fetch_all(&self.pool)
            .await?;
        let applied: std::collections::HashSet<i64> = applied.into_iter().map(|(v,)| v).collect();

        let mut pending: Vec<&migrations::Migration> = migrations::MIGRATIONS
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .collect();
        pending.sort_by_key(|m| m.version);

        for m in pending {
            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(m.up)
                .execute(&mut *tx)
                .await
                .map_err(|source| DbError::Migration {
                    version: m.version,
                    name: m.name.to_string(),
                    source,
                })?;
            sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
                .bind(m.version)
                .bind(m.name)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            info!(version = m.version, name = m.name, "applied migration");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Default on-disk layout: `<project>/.agent-memory/memory.db`.
pub fn default_db_path(project_root: &Path) -> PathBuf {
    project_root.join(".agent-memory").join("memory.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_runs_all_migrations() {
        let db = Database::open_in_memory().await.expect("open");
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(db.pool())
            .await
            .expect("sessions table exists");
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = Database::open_in_memory().await.expect("open");
        db.run_migrations().await.expect("second run is a no-op");
        let rows: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
            .fetch_one(db.pool())
            .await
            .expect("ledger readable");
        assert_eq!(rows.0, migrations::MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn file_based_database_creates_parent_dir_and_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let db_path = tmp.path().join("nested").join("memory.db");
        let db = Database::open(&db_path).await.expect("open");
        assert!(db_path.exists());
        assert_eq!(db.db_path(), db_path);
    }

    #[tokio::test]
    async fn recovers_by_recreating_a_corrupt_primary_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let db_path = tmp.path().join("memory.db");
        // Write garbage that is not a valid SQLite file.
        std::fs::write(&db_path, b"not a real sqlite file, deliberately corrupt").unwrap();
        let db = Database::open(&db_path).await.expect("should recover by recreating");
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(db.pool())
            .await
            .expect("sessions table exists after recovery");
        assert_eq!(count.0, 0);
    }
}
