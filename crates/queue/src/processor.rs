// crates/queue/src/processor.rs
//! Queue processor. Drains the pending queue in batches,
//! invokes the compressor, persists observations, and runs conflict
//! detection.

use std::sync::Arc;

use agent_memory_core::provider::{Compressor, Embedder, ObservationDraft};
use agent_memory_core::types::{Observation, PendingMessage};
use agent_memory_db::{DbResult, ObservationRepository, PendingRepository, SessionRepository};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::conflict::similarity;

/// Auto-supersede at or above this similarity.
const CONFLICT_UPPER_BAND: f32 = 0.82;
/// Log but do not auto-supersede at or above this similarity.
const CONFLICT_LOWER_BAND: f32 = 0.55;

const DEFAULT_BATCH_SIZE: i64 = 20;

/// `in-process` drains the queue itself; `enqueue-only` defers draining to
/// an out-of-process consumer, notified via the `on_enqueue` callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    InProcess,
    EnqueueOnly,
}

type EnqueueCallback = Arc<dyn Fn() + Send + Sync>;

pub struct QueueProcessor {
    pending: PendingRepository,
    observations: ObservationRepository,
    sessions: SessionRepository,
    compressor: Arc<dyn Compressor>,
    embedder: Option<Arc<dyn Embedder>>,
    mode: RwLock<ProcessingMode>,
    on_enqueue: RwLock<Option<EnqueueCallback>>,
    batch_size: i64,
}

impl QueueProcessor {
    pub fn new(
        pending: PendingRepository,
        observations: ObservationRepository,
        sessions: SessionRepository,
        compressor: Arc<dyn Compressor>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        Self {
            pending,
            observations,
            sessions,
            compressor,
            embedder,
            mode: RwLock::new(ProcessingMode::InProcess),
            on_enqueue: RwLock::new(None),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub async fn mode(&self) -> ProcessingMode {
        *self.mode.read().await
    }

    /// Switching modes never loses entries; it only changes who drains
    /// them.
    pub async fn set_mode(&self, mode: ProcessingMode) {
        *self.mode.write().await = mode;
    }

    pub async fn set_on_enqueue(&self, callback: EnqueueCallback) {
        *self.on_enqueue.write().await = Some(callback);
    }

    pub async fn clear_on_enqueue(&self) {
        *self.on_enqueue.write().await = None;
    }

    /// Inserts a pending row; in `enqueue-only` mode this is the
    /// producer's only effect, and the registered callback (if any) is
    /// fired synchronously to nudge the out-of-process consumer.
    pub async fn enqueue(
        &self,
        session_id: &str,
        tool_name: &str,
        tool_output: &str,
        call_id: &str,
    ) -> DbResult<String> {
        let id = self.pending.enqueue(session_id, tool_name, tool_output, call_id).await?;
        if self.mode().await == ProcessingMode::EnqueueOnly {
            if let Some(callback) = self.on_enqueue.read().await.as_ref() {
                callback();
            }
        }
        Ok(id)
    }

    /// Drains up to `batch_size` pending entries. A no-op in
    /// `enqueue-only` mode. Returns the count of rows that completed
    /// successfully (not attempted) — this drives the daemon's idle-exit
    /// timer.
    pub async fn process_batch(&self) -> DbResult<u64> {
        if self.mode().await == ProcessingMode::EnqueueOnly {
            return Ok(0);
        }

        let batch = self.pending.get_pending(self.batch_size).await?;
        let mut completed = 0u64;
        for message in &batch {
            match self.process_one(message).await {
                Ok(()) => completed += 1,
                Err(err) => {
                    warn!(message_id = %message.id, error = %err, "queue entry failed, marking failed");
                    if let Err(mark_err) = self.pending.mark_failed(&message.id, &err.to_string()).await {
                        warn!(message_id = %message.id, error = %mark_err, "failed to record failure for queue entry");
                    }
                }
            }
        }
        info!(completed, attempted = batch.len(), "queue batch processed");
        Ok(completed)
    }

    async fn process_one(&self, message: &PendingMessage) -> DbResult<()> {
        self.pending.mark_processing(&message.id).await?;

        let draft = match self
            .compressor
            .compress(&message.tool_output, &message.tool_name)
            .await
        {
            Ok(draft) => draft,
            Err(err) => {
                warn!(message_id = %message.id, error = %err, "compressor failed, using fallback draft");
                ObservationDraft::fallback(&message.tool_name, &message.tool_output)
            }
        };

        let observation = self
            .observations
            .create(&message.session_id, &draft, &message.tool_name, &message.tool_output)
            .await?;
        self.sessions.recompute_observation_count(&message.session_id).await?;

        if let Some(embedder) = &self.embedder {
            match embedder.embed(&observation.narrative).await {
                Ok(Some(vector)) => {
                    self.observations.set_embedding(&observation.id, Some(&vector)).await?;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(observation_id = %observation.id, error = %err, "embedding failed, leaving observation unembedded");
                }
            }
        }

        self.detect_conflicts(&observation).await?;
        self.pending.mark_completed(&message.id).await?;
        Ok(())
    }

    /// Find observations in the same session with high similarity to
    /// `new_observation`; supersede when above the upper band, log-only
    /// above the lower band.
    async fn detect_conflicts(&self, new_observation: &Observation) -> DbResult<()> {
        let session = self.sessions.get_or_require(&new_observation.session_id).await?;
        let siblings = self
            .observations
            .timeline(&session.project_path, Some(&new_observation.session_id), 200, false)
            .await?;

        for sibling in &siblings {
            if sibling.id == new_observation.id {
                continue;
            }
            let score = similarity(new_observation, sibling);
            if score >= CONFLICT_UPPER_BAND {
                self.observations.supersede(&sibling.id, &new_observation.id).await?;
                info!(old = %sibling.id, new = %new_observation.id, score, "auto-superseded conflicting observation");
            } else if score >= CONFLICT_LOWER_BAND {
                info!(candidate = %sibling.id, new = %new_observation.id, score, "possible conflict below auto-supersede threshold");
            }
        }
        Ok(())
    }
}
