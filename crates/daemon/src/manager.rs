// crates/daemon/src/manager.rs
//! Host-side daemon lifecycle: start/stop/signal. One `DaemonManager`
//! per database path.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{info, warn};

use crate::pid::{is_alive, PidFile};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const START_TIMEOUT: Duration = Duration::from_secs(2);

pub struct DaemonManager {
    pid_file: PidFile,
    program: OsString,
    args: Vec<OsString>,
}

impl DaemonManager {
    pub fn new(pid_path: PathBuf, program: impl Into<OsString>, args: Vec<OsString>) -> Self {
        Self {
            pid_file: PidFile::new(pid_path),
            program: program.into(),
            args,
        }
    }

    pub fn pid_path(&self) -> &Path {
        self.pid_file.path()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.pid_file.read(), Some(pid) if is_alive(pid))
    }

    /// A no-op returning `false` if already running. Otherwise spawns the
    /// daemon detached, redirecting all standard streams away, and polls
    /// for the PID file every 100ms for up to 2s.
    pub async fn start(&self) -> std::io::Result<bool> {
        if self.is_running() {
            return Ok(false);
        }

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
        command.stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command.spawn()?;

        let deadline = tokio::time::Instant::now() + START_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if self.is_running() {
                info!(pid_path = %self.pid_path().display(), "daemon started");
                return Ok(true);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        let started = self.is_running();
        if !started {
            warn!(pid_path = %self.pid_path().display(), "daemon did not report alive within the start timeout");
        }
        Ok(started)
    }

    /// Fire-and-forget `PROCESS_NOW` nudge; failures are swallowed because
    /// the child may have already died.
    #[cfg(unix)]
    pub fn signal_process_now(&self) {
        if let Some(pid) = self.pid_file.read() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGUSR1);
            }
        }
    }

    /// Send SIGTERM (errors ignored), then remove the PID file.
    #[cfg(unix)]
    pub fn stop(&self) {
        if let Some(pid) = self.pid_file.read() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
        self.pid_file.remove();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn is_running_is_false_before_start() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = DaemonManager::new(tmp.path().join("worker.pid"), "/bin/sh", vec!["-c".into(), "sleep 5".into()]);
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn start_spawns_and_polls_for_the_pid_file() {
        let tmp = tempfile::tempdir().unwrap();
        let pid_path = tmp.path().join("worker.pid");
        let script = format!("echo $$ > {} && sleep 2", pid_path.display());
        let manager = DaemonManager::new(pid_path, "/bin/sh", vec!["-c".into(), script.into()]);

        let started = manager.start().await.unwrap();
        assert!(started);
        assert!(manager.is_running());

        manager.stop();
    }

    #[tokio::test]
    async fn second_start_is_a_no_op_while_already_running() {
        let tmp = tempfile::tempdir().unwrap();
        let pid_path = tmp.path().join("worker.pid");
        let script = format!("echo $$ > {} && sleep 2", pid_path.display());
        let manager = DaemonManager::new(pid_path, "/bin/sh", vec!["-c".into(), script.into()]);
        assert!(manager.start().await.unwrap());
        assert!(!manager.start().await.unwrap());
        manager.stop();
    }

    #[tokio::test]
    async fn stop_removes_the_pid_file() {
        let tmp = tempfile::tempdir().unwrap();
        let pid_path = tmp.path().join("worker.pid");
        let script = format!("echo $$ > {} && sleep 2", pid_path.display());
        let manager = DaemonManager::new(pid_path.clone(), "/bin/sh", vec!["-c".into(), script.into()]);
        manager.start().await.unwrap();
        manager.stop();
        assert!(!pid_path.exists());
    }
}
