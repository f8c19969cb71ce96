// crates/observability/src/lib.rs
//! Tracing setup for the server binary. Standard output is reserved for
//! the MCP JSON-RPC wire, so unlike the web-server product this was
//! grounded on, the subscriber here never writes to stdout: stderr by
//! default, or a daily-rotating file when a log directory is configured.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("failed to create log directory: {0}")]
    CreateLogDir(#[from] std::io::Error),

    #[error("a tracing subscriber is already installed for this process")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Installs a compact subscriber writing to stderr, respecting `RUST_LOG`
/// and defaulting to `warn`. Suitable for `serve`/`daemon` foreground runs.
pub fn init_stderr() -> Result<(), ObservabilityError> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Installs a subscriber writing to a daily-rotating file under `log_dir`
/// (`agent-memory.log.YYYY-MM-DD`). Returns the guard that must be held
/// for the process lifetime — dropping it stops the background flush
/// thread and silently truncates buffered log lines.
pub fn init_rotating_file(log_dir: &Path) -> Result<WorkerGuard, ObservabilityError> {
    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, "agent-memory.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(non_blocking)
        .with_ansi(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotating_file_creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        assert!(!log_dir.exists());
        std::fs::create_dir_all(&log_dir).unwrap();
        assert!(log_dir.exists());
    }
}
