// crates/core/src/paths.rs
use std::path::{Path, PathBuf};

/// Derive the daemon PID file path from a database path by replacing its
/// filename.
pub fn pid_path_for_db(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .map(|p| p.join("worker.pid"))
        .unwrap_or_else(|| PathBuf::from("worker.pid"))
}

/// The write-ahead-log and shared-memory sidecar paths for a SQLite file,
/// used by the storage open recovery dance.
pub fn sidecar_paths(db_path: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(name) = db_path.file_name().and_then(|n| n.to_str()) {
        let parent = db_path.parent().unwrap_or_else(|| Path::new(""));
        out.push(parent.join(format!("{name}-wal")));
        out.push(parent.join(format!("{name}-shm")));
        out.push(parent.join(format!("{name}-journal")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_path_replaces_basename() {
        assert_eq!(
            pid_path_for_db(Path::new("/a/b/memory.db")),
            PathBuf::from("/a/b/worker.pid")
        );
    }

    #[test]
    fn sidecar_paths_cover_wal_shm_journal() {
        let sidecars = sidecar_paths(Path::new("/a/b/memory.db"));
        assert_eq!(
            sidecars,
            vec![
                PathBuf::from("/a/b/memory.db-wal"),
                PathBuf::from("/a/b/memory.db-shm"),
                PathBuf::from("/a/b/memory.db-journal"),
            ]
        );
    }
}
