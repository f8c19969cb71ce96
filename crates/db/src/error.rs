// crates/db/src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("failed to create database directory: {0}")]
    CreateDir(#[from] std::io::Error),

    #[error("migration {version} ({name}) failed: {source}")]
    Migration {
        version: i64,
        name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("embedding dimension mismatch: existing table has {existing}, configured is {configured}")]
    EmbeddingDimensionMismatch { existing: usize, configured: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("corrupt embedding JSON for observation {id}: {source}")]
    CorruptEmbedding {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Import(#[from] agent_memory_core::export::ImportError),
}

pub type DbResult<T> = Result<T, DbError>;
