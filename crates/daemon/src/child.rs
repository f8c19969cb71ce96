// crates/daemon/src/child.rs
//! The daemon child's run loop. Spawned by `DaemonManager::start` as a
//! separate OS process running the `daemon` server subcommand; this
//! module is the body of that process.
//!
//! `PROCESS_NOW`/`SHUTDOWN` are delivered as real OS signals
//! (`SIGUSR1`/`SIGTERM`) rather than an abstract IPC channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_memory_queue::QueueProcessor;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::pid::is_alive;

/// Auto-exit once idle this long with no parent connection.
const IDLE_EXIT: Duration = Duration::from_secs(60);

pub struct ChildRunLoop {
    processor: Arc<QueueProcessor>,
    interval: Duration,
    /// When set, the loop exits after [`IDLE_EXIT`] of inactivity once this
    /// pid is no longer alive (our proxy for "parent is no longer
    /// IPC-connected").
    parent_pid: Option<u32>,
}

impl ChildRunLoop {
    pub fn new(processor: Arc<QueueProcessor>, interval: Duration, parent_pid: Option<u32>) -> Self {
        Self {
            processor,
            interval,
            parent_pid,
        }
    }

    #[cfg(unix)]
    pub async fn run(self: Arc<Self>) {
        use tokio::signal::unix::{signal, SignalKind};

        let mut timer = tokio::time::interval(self.interval);
        let mut shutdown = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler, daemon run loop cannot start");
                return;
            }
        };
        let mut process_now = match signal(SignalKind::user_defined1()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to install SIGUSR1 handler, daemon run loop cannot start");
                return;
            }
        };

        let running = Arc::new(AtomicBool::new(false));
        let last_nonempty = Arc::new(Mutex::new(Instant::now()));

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.clone().spawn_batch(running.clone(), last_nonempty.clone());
                }
                _ = process_now.recv() => {
                    info!("received PROCESS_NOW, triggering immediate drain");
                    self.clone().spawn_batch(running.clone(), last_nonempty.clone());
                }
                _ = shutdown.recv() => {
                    info!("received SHUTDOWN, stopping timer");
                    break;
                }
            }

            let idle_for = last_nonempty.lock().await.elapsed();
            let parent_alive = self.parent_pid.map(is_alive).unwrap_or(true);
            if idle_for >= IDLE_EXIT && !parent_alive {
                info!(idle_secs = idle_for.as_secs(), "idle with no parent connection, exiting");
                break;
            }
        }
    }

    /// Run a batch in its own task, guarded against overlap with any batch
    /// already in flight.
    fn spawn_batch(self: Arc<Self>, running: Arc<AtomicBool>, last_nonempty: Arc<Mutex<Instant>>) {
        if running.swap(true, Ordering::SeqCst) {
            return;
        }
        tokio::spawn(async move {
            match self.processor.process_batch().await {
                Ok(completed) if completed > 0 => {
                    *last_nonempty.lock().await = Instant::now();
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "queue batch failed during daemon run loop"),
            }
            running.store(false, Ordering::SeqCst);
        });
    }
}
