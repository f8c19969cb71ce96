// crates/core/src/config.rs
//! Environment-variable configuration, loaded once at process startup into
//! a single struct. The surrounding config loader is external to this
//! crate; this is the subset the core itself reads.

use std::path::PathBuf;

/// Resolved runtime configuration. Every field has a documented default so
/// `Config::from_env` never fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub compression_enabled: bool,
    pub retention_days: u32,
    pub batch_size: usize,
    pub batch_interval_secs: u64,
    pub embedding_dimension: usize,
    pub vector_extension_available: bool,
    pub daemon_enabled: bool,
    pub client_version_hint: Option<String>,
    pub project_path: PathBuf,
}

const DEFAULT_RETENTION_DAYS: u32 = 90;
const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_BATCH_INTERVAL_SECS: u64 = 30;
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: default_db_path(&PathBuf::from(".")),
            compression_enabled: true,
            retention_days: DEFAULT_RETENTION_DAYS,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_interval_secs: DEFAULT_BATCH_INTERVAL_SECS,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            vector_extension_available: false,
            daemon_enabled: true,
            client_version_hint: None,
            project_path: PathBuf::from("."),
        }
    }
}

fn default_db_path(project_path: &std::path::Path) -> PathBuf {
    project_path.join(".agent-memory").join("memory.db")
}

impl Config {
    /// Read the `AGENT_MEMORY_*` environment keys, falling back to
    /// defaults for anything unset. `project_path` is the root of the
    /// project this server instance is scoped to.
    pub fn from_env(project_path: PathBuf) -> Self {
        let mut cfg = Config {
            db_path: default_db_path(&project_path),
            project_path,
            ..Config::default()
        };

        if let Ok(v) = std::env::var("AGENT_MEMORY_DB_PATH") {
            if !v.is_empty() {
                cfg.db_path = PathBuf::from(v);
            }
        }
        if let Ok(v) = std::env::var("AGENT_MEMORY_COMPRESSION_ENABLED") {
            cfg.compression_enabled = parse_bool(&v, cfg.compression_enabled);
        }
        if let Ok(v) = std::env::var("AGENT_MEMORY_RETENTION_DAYS") {
            cfg.retention_days = v.parse().unwrap_or(cfg.retention_days);
        }
        if let Ok(v) = std::env::var("AGENT_MEMORY_BATCH_SIZE") {
            cfg.batch_size = v.parse().unwrap_or(cfg.batch_size);
        }
        if let Ok(v) = std::env::var("AGENT_MEMORY_BATCH_INTERVAL_SECS") {
            cfg.batch_interval_secs = v.parse().unwrap_or(cfg.batch_interval_secs);
        }
        if let Ok(v) = std::env::var("AGENT_MEMORY_EMBEDDING_DIMENSION") {
            cfg.embedding_dimension = v.parse().unwrap_or(cfg.embedding_dimension);
        }
        if let Ok(v) = std::env::var("AGENT_MEMORY_VECTOR_EXTENSION") {
            cfg.vector_extension_available = parse_bool(&v, cfg.vector_extension_available);
        }
        if let Ok(v) = std::env::var("AGENT_MEMORY_DAEMON_ENABLED") {
            cfg.daemon_enabled = parse_bool(&v, cfg.daemon_enabled);
        }
        if let Ok(v) = std::env::var("AGENT_MEMORY_CLIENT_VERSION") {
            if !v.is_empty() {
                cfg.client_version_hint = Some(v);
            }
        }

        cfg
    }

    /// Path to the daemon PID file: the database path with its filename
    /// replaced by `worker.pid`.
    pub fn pid_file_path(&self) -> PathBuf {
        self.db_path
            .parent()
            .map(|p| p.join("worker.pid"))
            .unwrap_or_else(|| PathBuf::from("worker.pid"))
    }
}

fn parse_bool(v: &str, default: bool) -> bool {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_file_path_replaces_filename() {
        let cfg = Config {
            db_path: PathBuf::from("/tmp/project/memory.db"),
            ..Config::default()
        };
        assert_eq!(cfg.pid_file_path(), PathBuf::from("/tmp/project/worker.pid"));
    }

    #[test]
    fn parse_bool_handles_common_spellings() {
        assert!(parse_bool("true", false));
        assert!(parse_bool("1", false));
        assert!(!parse_bool("false", true));
        assert!(!parse_bool("0", true));
        assert!(parse_bool("garbage", true));
    }
}
