// crates/server/src/lib.rs
//! Composition root: wires the storage engine, queue processor, daemon
//! manager and search orchestrator into the objects the `serve`/`daemon`/
//! `doctor` subcommands drive. Opens the store, builds shared state, and
//! hands callers explicit objects rather than process-wide globals.

pub mod dual_mode;
pub mod fallback;

use std::path::PathBuf;
use std::sync::Arc;

use agent_memory_core::config::Config;
use agent_memory_core::provider::{Compressor, Embedder, Reranker};
use agent_memory_daemon::DaemonManager;
use agent_memory_db::vector::{ensure_vector_index, VectorIndexKind};
use agent_memory_db::{Database, EntityRepository, ObservationRepository, PendingRepository, SessionRepository, SummaryRepository};
use agent_memory_mcp::McpServer;
use agent_memory_queue::QueueProcessor;
use agent_memory_search::SearchOrchestrator;

/// Everything a running server instance needs, built once at startup.
pub struct ServerContext {
    pub config: Config,
    pub db: Database,
    pub sessions: SessionRepository,
    pub observations: ObservationRepository,
    pub summaries: SummaryRepository,
    pub pending: PendingRepository,
    pub entities: EntityRepository,
    pub vector_kind: VectorIndexKind,
    pub processor: Arc<QueueProcessor>,
}

impl ServerContext {
    /// Opens the database, runs migrations, probes the vector index and
    /// builds every repository and the queue processor. Does not start the
    /// daemon or bind any I/O — callers decide what to run.
    pub async fn build(config: Config, compressor: Arc<dyn Compressor>, embedder: Option<Arc<dyn Embedder>>) -> anyhow::Result<Self> {
        let db = Database::open(&config.db_path).await?;
        let pool = db.pool().clone();

        let sessions = SessionRepository::new(pool.clone());
        let observations = ObservationRepository::new(pool.clone());
        let summaries = SummaryRepository::new(pool.clone());
        let pending = PendingRepository::new(pool.clone());
        let entities = EntityRepository::new(pool.clone());

        let vector_kind = ensure_vector_index(&pool, config.embedding_dimension, config.vector_extension_available).await?;

        let processor = Arc::new(
            QueueProcessor::new(pending.clone(), observations.clone(), sessions.clone(), compressor, embedder)
                .with_batch_size(config.batch_size as i64),
        );

        Ok(Self {
            config,
            db,
            sessions,
            observations,
            summaries,
            pending,
            entities,
            vector_kind,
            processor,
        })
    }

    pub fn build_orchestrator(&self, reranker: Option<Arc<dyn Reranker>>, embedder: Option<Arc<dyn Embedder>>) -> SearchOrchestrator {
        let mut orchestrator =
            SearchOrchestrator::new(self.db.pool().clone(), self.observations.clone(), self.vector_kind)
                .with_entities(self.entities.clone());
        if let Some(embedder) = embedder {
            orchestrator = orchestrator.with_embedder(embedder);
        }
        if let Some(reranker) = reranker {
            orchestrator = orchestrator.with_reranker(reranker);
        }
        orchestrator
    }

    pub fn build_mcp_server(&self, orchestrator: SearchOrchestrator) -> Arc<McpServer> {
        Arc::new(McpServer::new(
            self.config.project_path.to_string_lossy().to_string(),
            self.db.pool().clone(),
            self.observations.clone(),
            self.sessions.clone(),
            self.summaries.clone(),
            orchestrator,
        ))
    }

    pub fn daemon_manager(&self, daemon_binary: PathBuf) -> DaemonManager {
        DaemonManager::new(
            self.config.pid_file_path(),
            daemon_binary.into_os_string(),
            vec![
                "daemon".into(),
                self.config.db_path.clone().into_os_string(),
                std::process::id().to_string().into(),
            ],
        )
    }
}
