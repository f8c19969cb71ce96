// crates/daemon/src/reaper.rs
//! Orphan PID file cleanup.

use std::path::Path;

use crate::pid::{is_alive, PidFile};

/// Inspect the PID file for a daemon: missing is a no-op, invalid content
/// is removed, a dead process's file is removed, a live process is left
/// alone. Never signals a process it finds, since pid reuse is possible.
/// Returns 1 if a file was removed, 0 otherwise.
pub fn reap_orphan(pid_path: &Path) -> usize {
    let pid_file = PidFile::new(pid_path.to_path_buf());
    match pid_file.read() {
        None => {
            // Missing file, or unparseable content: remove defensively in
            // case the file exists but failed to parse.
            if pid_path.exists() {
                pid_file.remove();
                1
            } else {
                0
            }
        }
        Some(pid) => {
            if !is_alive(pid) {
                pid_file.remove();
                1
            } else {
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("worker.pid");
        assert_eq!(reap_orphan(&path), 0);
        assert!(!path.exists());
    }

    #[test]
    fn invalid_content_is_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("worker.pid");
        std::fs::write(&path, "garbage").unwrap();
        assert_eq!(reap_orphan(&path), 1);
        assert!(!path.exists());
    }

    #[test]
    fn dead_process_pid_file_is_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("worker.pid");
        std::fs::write(&path, (u32::MAX - 1).to_string()).unwrap();
        assert_eq!(reap_orphan(&path), 1);
        assert!(!path.exists());
    }

    #[test]
    fn live_process_pid_file_is_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("worker.pid");
        std::fs::write(&path, std::process::id().to_string()).unwrap();
        assert_eq!(reap_orphan(&path), 0);
        assert!(path.exists());
    }

    /// Reaping a stale pid file reports reaped==1, and a subsequent
    /// reap of the now-absent file reports reaped==0.
    #[test]
    fn second_reap_of_an_already_reaped_file_reports_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("worker.pid");
        std::fs::write(&path, "99999999").unwrap();
        assert_eq!(reap_orphan(&path), 1);
        assert_eq!(reap_orphan(&path), 0);
    }
}
