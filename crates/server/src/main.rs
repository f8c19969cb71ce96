// crates/server/src/main.rs
//! The `agent-memory` binary: composition root for the MCP stdio server,
//! the daemon child process, and a `doctor` diagnostic surface. Init
//! tracing, open the store, wire shared state, then dispatch to the
//! requested subcommand.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agent_memory_core::config::Config;
use agent_memory_daemon::{is_alive, reap_orphan, ChildRunLoop, PidFile};
use agent_memory_server::dual_mode::DualModeSupervisor;
use agent_memory_server::fallback::{NullCompressor, NullEmbedder};
use agent_memory_server::ServerContext;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agent-memory", version, about = "Per-project persistent memory service for AI coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP stdio JSON-RPC server (default when no subcommand is given).
    Serve {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Internal: run the C5 daemon child loop. Spawned by `DaemonManager::start`,
    /// not meant to be invoked directly.
    Daemon {
        db_path: PathBuf,
        /// PID of the parent process, used for the idle-exit liveness check.
        parent_pid: Option<u32>,
    },
    /// Print resolved configuration, applied migrations and vector-index status.
    Doctor {
        #[arg(long)]
        project: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve { project: None }) {
        Command::Serve { project } => run_serve(project).await,
        Command::Daemon { db_path, parent_pid } => run_daemon(db_path, parent_pid).await,
        Command::Doctor { project } => run_doctor(project).await,
    }
}

fn resolve_project(project: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let path = project.map(Ok).unwrap_or_else(std::env::current_dir)?;
    Ok(path.canonicalize().unwrap_or(path))
}

async fn run_serve(project: Option<PathBuf>) -> anyhow::Result<()> {
    agent_memory_observability::init_stderr()?;
    let project_path = resolve_project(project)?;
    let config = Config::from_env(project_path.clone());

    reap_orphan(&config.pid_file_path());

    let embedder = Arc::new(NullEmbedder::new(config.embedding_dimension));
    let ctx = ServerContext::build(config.clone(), Arc::new(NullCompressor), Some(embedder.clone())).await?;

    let mut supervisor = if config.daemon_enabled {
        let own_binary = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("agent-memory"));
        let manager = Arc::new(ctx.daemon_manager(own_binary));
        let mut supervisor = DualModeSupervisor::new(
            ctx.processor.clone(),
            manager,
            Duration::from_secs(config.batch_interval_secs),
        );
        supervisor.enable().await;
        Some(supervisor)
    } else {
        None
    };

    let orchestrator = ctx.build_orchestrator(None, Some(embedder));
    let server = ctx.build_mcp_server(orchestrator);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let result = server.run(stdin, stdout).await;

    if let Some(supervisor) = supervisor.as_mut() {
        supervisor.shutdown();
    }
    result.map_err(anyhow::Error::from)
}

async fn run_daemon(db_path: PathBuf, parent_pid: Option<u32>) -> anyhow::Result<()> {
    agent_memory_observability::init_stderr()?;
    let project_path = db_path
        .parent()
        .and_then(|p| p.parent())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut config = Config::from_env(project_path);
    config.db_path = db_path;

    let pid_file = PidFile::new(config.pid_file_path());
    pid_file.write_current()?;

    let ctx = ServerContext::build(config.clone(), Arc::new(NullCompressor), Some(Arc::new(NullEmbedder::new(config.embedding_dimension)))).await?;

    let run_loop = Arc::new(ChildRunLoop::new(
        ctx.processor.clone(),
        Duration::from_secs(config.batch_interval_secs),
        parent_pid,
    ));
    run_loop.run().await;

    pid_file.remove();
    Ok(())
}

async fn run_doctor(project: Option<PathBuf>) -> anyhow::Result<()> {
    agent_memory_observability::init_stderr()?;
    let project_path = resolve_project(project)?;
    let config = Config::from_env(project_path);

    let ctx = ServerContext::build(
        config.clone(),
        Arc::new(NullCompressor),
        Some(Arc::new(NullEmbedder::new(config.embedding_dimension))),
    )
    .await?;

    let applied: Vec<(i64, String)> = sqlx::query_as("SELECT version, name FROM _migrations ORDER BY version")
        .fetch_all(ctx.db.pool())
        .await?;

    println!("project path:       {}", config.project_path.display());
    println!("database path:      {}", config.db_path.display());
    println!("pid file path:      {}", config.pid_file_path().display());
    println!("compression:        {}", config.compression_enabled);
    println!("daemon enabled:     {}", config.daemon_enabled);
    println!("batch size:         {}", config.batch_size);
    println!("batch interval:     {}s", config.batch_interval_secs);
    println!("retention days:     {}", config.retention_days);
    println!("embedding dim:      {}", config.embedding_dimension);
    println!("vector index:       {:?}", ctx.vector_kind);
    let daemon_running = PidFile::new(config.pid_file_path()).read().is_some_and(is_alive);
    println!("daemon running:     {daemon_running}");
    println!("applied migrations:");
    for (version, name) in applied {
        println!("  {version:>3}  {name}");
    }

    Ok(())
}
