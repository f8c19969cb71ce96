// crates/server/src/dual_mode.rs
//! Dual-mode orchestration: when the daemon is enabled and starts
//! successfully, the processor switches to enqueue-only and nudges the
//! daemon on every enqueue. A single scheduled tick covers both the
//! daemon's own batch timer while it's healthy, and the liveness check
//! that falls back to in-process processing once the daemon has died,
//! since both only ever need to run on the same cadence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_memory_daemon::DaemonManager;
use agent_memory_queue::{ProcessingMode, QueueProcessor};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct DualModeSupervisor {
    processor: Arc<QueueProcessor>,
    daemon: Arc<DaemonManager>,
    interval: Duration,
    daemon_healthy: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl DualModeSupervisor {
    pub fn new(processor: Arc<QueueProcessor>, daemon: Arc<DaemonManager>, interval: Duration) -> Self {
        Self {
            processor,
            daemon,
            interval,
            daemon_healthy: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Attempts to start the daemon; on success switches the processor to
    /// enqueue-only and wires the on-enqueue nudge, then spawns the
    /// combined timer/liveness loop. On failure the processor stays
    /// in-process and the loop still runs to drain the queue itself.
    pub async fn enable(&mut self) {
        let started = self.daemon.start().await.unwrap_or(false);
        if started {
            self.daemon_healthy.store(true, Ordering::SeqCst);
            self.processor.set_mode(ProcessingMode::EnqueueOnly).await;
            let daemon = self.daemon.clone();
            self.processor
                .set_on_enqueue(Arc::new(move || daemon.signal_process_now()))
                .await;
            info!("daemon started, processor switched to enqueue-only");
        } else {
            warn!("daemon failed to start, staying in-process");
        }

        let processor = self.processor.clone();
        let daemon = self.daemon.clone();
        let healthy = self.daemon_healthy.clone();
        let interval = self.interval;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if healthy.load(Ordering::SeqCst) {
                    if daemon.is_running() {
                        continue;
                    }
                    warn!("daemon no longer running, falling back to in-process processing");
                    healthy.store(false, Ordering::SeqCst);
                    processor.clear_on_enqueue().await;
                    processor.set_mode(ProcessingMode::InProcess).await;
                }
                if let Err(err) = processor.process_batch().await {
                    warn!(error = %err, "in-process queue batch failed");
                }
            }
        }));
    }

    /// Stops the daemon and cancels the liveness/timer task.
    pub fn shutdown(&mut self) {
        self.daemon.stop();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for DualModeSupervisor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use agent_memory_core::error::ProviderError;
    use agent_memory_core::provider::{Compressor, ObservationDraft};
    use agent_memory_db::{Database, ObservationRepository, PendingRepository, SessionRepository};
    use async_trait::async_trait;

    struct EchoCompressor;
    #[async_trait]
    impl Compressor for EchoCompressor {
        async fn compress(&self, tool_output: &str, tool_name: &str) -> Result<ObservationDraft, ProviderError> {
            Ok(ObservationDraft::fallback(tool_name, tool_output))
        }
    }

    #[tokio::test]
    async fn falls_back_to_in_process_when_daemon_fails_to_start() {
        let db = Database::open_in_memory().await.unwrap();
        let sessions = SessionRepository::new(db.pool().clone());
        let pending = PendingRepository::new(db.pool().clone());
        let observations = ObservationRepository::new(db.pool().clone());
        let processor = Arc::new(QueueProcessor::new(pending, observations, sessions.clone(), Arc::new(EchoCompressor), None));

        let tmp = tempfile::tempdir().unwrap();
        let daemon = Arc::new(DaemonManager::new(
            tmp.path().join("worker.pid"),
            "/bin/sh",
            vec!["-c".into(), "exit 1".into()],
        ));

        let mut supervisor = DualModeSupervisor::new(processor.clone(), daemon, Duration::from_millis(50));
        supervisor.enable().await;

        let session = sessions.create("/p").await.unwrap();
        processor.enqueue(&session.id, "Read", "hi", "c1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let refreshed = sessions.get_or_require(&session.id).await.unwrap();
        assert_eq!(refreshed.observation_count, 1);

        supervisor.shutdown();
    }
}
