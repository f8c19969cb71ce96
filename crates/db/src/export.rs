// crates/db/src/export.rs
//! Export/import of observations and summaries.
//! Rendering other file formats (Markdown/HTML) stays external; this is
//! the JSON shape `mem-export`/`mem-import` operate on directly.

use agent_memory_core::export::{parse_import, ExportDocument, ExportedObservation};
use agent_memory_core::types::ObservationType;
use sqlx::{Row, SqlitePool};

use crate::error::DbResult;
use crate::observation::ObservationRepository;
use crate::summary::SummaryRepository;
use crate::util::{encode_string_array, format_timestamp};

pub async fn export_project(pool: &SqlitePool, project_path: &str) -> DbResult<ExportDocument> {
    let observations = ObservationRepository::new(pool.clone());
    let summaries = SummaryRepository::new(pool.clone());

    let index = observations.get_index(project_path, true).await?;
    let mut exported = Vec::with_capacity(index.len());
    for entry in &index {
        if let Some(full) = observations.get_by_id(&entry.id).await? {
            exported.push(ExportedObservation::from(&full));
        }
    }

    let summary_rows = summaries.recent_for_project(project_path, i64::MAX).await?;

    Ok(ExportDocument {
        version: agent_memory_core::export::EXPORT_VERSION,
        exported_at: chrono::Utc::now(),
        project: project_path.to_string(),
        observations: exported,
        summaries: summary_rows,
    })
}

/// Result of an import pass: counts of rows actually inserted versus
/// skipped because the id already existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
}

pub async fn import_document(pool: &SqlitePool, json: &str) -> DbResult<ImportOutcome> {
    let doc = parse_import(json)?;
    let mut outcome = ImportOutcome::default();

    for obs in &doc.observations {
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM observations WHERE id = ?")
            .bind(&obs.id)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            outcome.skipped += 1;
            continue;
        }

        ensure_session_exists(pool, &obs.session_id, &doc.project).await?;

        sqlx::query(
            "INSERT INTO observations
                (id, session_id, obs_type, title, subtitle, facts, narrative, concepts,
                 files_read, files_modified, raw_output, tool_name, created_at,
                 token_count, discovery_tokens, importance, superseded_by, superseded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&obs.id)
        .bind(&obs.session_id)
        .bind(
            ObservationType::parse(&obs.obs_type)
                .unwrap_or(ObservationType::Change)
                .as_str(),
        )
        .bind(&obs.title)
        .bind(&obs.subtitle)
        .bind(encode_string_array(&obs.facts))
        .bind(&obs.narrative)
        .bind(encode_string_array(&obs.concepts))
        .bind(encode_string_array(&obs.files_read))
        .bind(encode_string_array(&obs.files_modified))
        .bind("") // raw tool output is omitted from exports
        .bind(&obs.tool_name)
        .bind(format_timestamp(&obs.created_at))
        .bind(obs.token_count)
        .bind(obs.discovery_tokens)
        .bind(obs.importance)
        .bind(&obs.superseded_by)
        .bind(obs.superseded_at.map(|t| format_timestamp(&t)))
        .execute(pool)
        .await?;
        outcome.imported += 1;
    }

    for summary in &doc.summaries {
        ensure_session_exists(pool, &summary.session_id, &doc.project).await?;
        let exists: Option<(String,)> =
            sqlx::query_as("SELECT session_id FROM session_summaries WHERE session_id = ?")
                .bind(&summary.session_id)
                .fetch_optional(pool)
                .await?;
        if exists.is_some() {
            outcome.skipped += 1;
            continue;
        }
        sqlx::query(
            "INSERT INTO session_summaries
                (session_id, request, investigated, learned, completed, next_steps, summary,
                 key_decisions, files_modified, concepts, token_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&summary.session_id)
        .bind(&summary.request)
        .bind(&summary.investigated)
        .bind(&summary.learned)
        .bind(&summary.completed)
        .bind(&summary.next_steps)
        .bind(&summary.summary)
        .bind(encode_string_array(&summary.key_decisions))
        .bind(encode_string_array(&summary.files_modified))
        .bind(encode_string_array(&summary.concepts))
        .bind(summary.token_count)
        .bind(format_timestamp(&summary.created_at))
        .execute(pool)
        .await?;
        outcome.imported += 1;
    }

    Ok(outcome)
}

async fn ensure_session_exists(pool: &SqlitePool, session_id: &str, project_path: &str) -> DbResult<()> {
    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM sessions WHERE id = ?")
        .bind(session_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        sqlx::query(
            "INSERT INTO sessions (id, project_path, started_at, status, observation_count)
             VALUES (?, ?, ?, 'completed', 0)",
        )
        .bind(session_id)
        .bind(project_path)
        .bind(format_timestamp(&chrono::Utc::now()))
        .execute(pool)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationRepository;
    use crate::session::SessionRepository;
    use crate::Database;
    use agent_memory_core::provider::ObservationDraft;

    #[tokio::test]
    async fn round_trips_and_skips_duplicate_ids_on_reimport() {
        let db = Database::open_in_memory().await.unwrap();
        let sessions = SessionRepository::new(db.pool().clone());
        let observations = ObservationRepository::new(db.pool().clone());
        let s = sessions.create("/p").await.unwrap();
        let draft = ObservationDraft {
            obs_type: ObservationType::Discovery,
            title: "t".into(),
            subtitle: String::new(),
            facts: vec!["f1".into()],
            narrative: "n".into(),
            concepts: vec!["c1".into()],
            files_read: vec![],
            files_modified: vec![],
            importance: 4,
        };
        observations.create(&s.id, &draft, "Read", "secret raw output").await.unwrap();

        let doc = export_project(db.pool(), "/p").await.unwrap();
        assert_eq!(doc.observations.len(), 1);
        assert_eq!(doc.observations[0].title, "t");

        let db2 = Database::open_in_memory().await.unwrap();
        let json = serde_json::to_string(&doc).unwrap();
        let outcome = import_document(db2.pool(), &json).await.unwrap();
        assert_eq!(outcome.imported, 1);
        assert_eq!(outcome.skipped, 0);

        // Re-importing the same document skips the already-present id.
        let outcome2 = import_document(db2.pool(), &json).await.unwrap();
        assert_eq!(outcome2.imported, 0);
        assert_eq!(outcome2.skipped, 1);
    }
}
