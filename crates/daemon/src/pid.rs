// crates/daemon/src/pid.rs
//! PID file read/write/remove and the signal-0 liveness probe.

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current process id, creating the parent directory if
    /// needed.
    pub fn write_current(&self) -> std::io::Result<()> {
        self.write(std::process::id())
    }

    pub fn write(&self, pid: u32) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, pid.to_string())
    }

    /// Returns the stored pid, or `None` if the file is missing or its
    /// content does not parse as an integer.
    pub fn read(&self) -> Option<u32> {
        fs::read_to_string(&self.path).ok()?.trim().parse().ok()
    }

    /// Best-effort removal; errors are swallowed.
    pub fn remove(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Signal-0 liveness probe: a permission-denied response still counts as
/// alive, since it proves the pid is held by *some* running process.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if result == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let pid_file = PidFile::new(tmp.path().join("nested").join("worker.pid"));
        pid_file.write(1234).unwrap();
        assert_eq!(pid_file.read(), Some(1234));
    }

    #[test]
    fn read_returns_none_for_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let pid_file = PidFile::new(tmp.path().join("worker.pid"));
        assert_eq!(pid_file.read(), None);
    }

    #[test]
    fn read_returns_none_for_unparseable_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("worker.pid");
        std::fs::write(&path, "not-a-pid").unwrap();
        let pid_file = PidFile::new(path);
        assert_eq!(pid_file.read(), None);
    }

    #[test]
    fn remove_is_a_no_op_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let pid_file = PidFile::new(tmp.path().join("worker.pid"));
        pid_file.remove();
    }

    #[test]
    fn current_process_is_alive() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    fn an_unused_high_pid_is_not_alive() {
        // Not airtight (pids can be reused) but stable enough for a unit test:
        // a pid this high is exceedingly unlikely to be assigned.
        assert!(!is_alive(u32::MAX - 1));
    }
}
