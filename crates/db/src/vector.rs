// crates/db/src/vector.rs
//! Optional vector index. A native vector virtual table is probed for at
//! startup; when the ambient SQLite build has no such module, the probe
//! fails cleanly and the orchestrator falls back to the in-process
//! cosine path over the `observations.embedding` TEXT column.

use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::error::DbResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorIndexKind {
    /// A native `vec0`-style virtual table is active for KNN queries.
    Native,
    /// No native vector extension; callers must use in-process cosine.
    InProcess,
}

/// Ensure the vector table exists for `dimension`. Writes (or verifies) the
/// `_embedding_meta` row. If an existing vector table's dimension differs
/// from `dimension`, logs and returns `InProcess` rather than silently
/// truncating.
pub async fn ensure_vector_index(
    pool: &SqlitePool,
    dimension: usize,
    extension_available: bool,
) -> DbResult<VectorIndexKind> {
    let existing = sqlx::query("SELECT dimension, native_vector_index FROM _embedding_meta WHERE id = 1")
        .fetch_optional(pool)
        .await?;

    if let Some(row) = existing {
        let existing_dim: i64 = row.get("dimension");
        let native: i64 = row.get("native_vector_index");
        if existing_dim as usize != dimension {
            warn!(
                existing = existing_dim,
                configured = dimension,
                "embedding dimension mismatch, skipping native vector index initialization"
            );
            return Ok(VectorIndexKind::InProcess);
        }
        return Ok(if native != 0 {
            VectorIndexKind::Native
        } else {
            VectorIndexKind::InProcess
        });
    }

    let kind = if extension_available {
        match try_create_native_table(pool, dimension).await {
            Ok(()) => VectorIndexKind::Native,
            Err(e) => {
                warn!(error = %e, "native vector extension unavailable, falling back to in-process cosine");
                VectorIndexKind::InProcess
            }
        }
    } else {
        VectorIndexKind::InProcess
    };

    sqlx::query(
        "INSERT INTO _embedding_meta (id, dimension, native_vector_index) VALUES (1, ?, ?)",
    )
    .bind(dimension as i64)
    .bind(matches!(kind, VectorIndexKind::Native) as i64)
    .execute(pool)
    .await?;

    info!(?kind, dimension, "vector index initialized");
    Ok(kind)
}

async fn try_create_native_table(pool: &SqlitePool, dimension: usize) -> Result<(), sqlx::Error> {
    let sql = format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS observation_vectors USING vec0(observation_id TEXT PRIMARY KEY, embedding FLOAT[{dimension}])"
    );
    sqlx::query(&sql).execute(pool).await.map(|_| ())
}

/// Cosine similarity between two equal-length vectors; returns 0.0 for
/// mismatched or zero-magnitude inputs rather than panicking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
