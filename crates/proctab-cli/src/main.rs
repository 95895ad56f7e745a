//! proctab CLI
//!
//! Starts container commands as detached processes, stops them, and lists
//! the ones still running according to the pid registry.

use std::path::PathBuf;

use clap::Parser;
use tracing::debug;

use proctab_cli::process_cmd::{self, ProcessAction};
use proctab_core::config::load_config;
use proctab_supervisor::Supervisor;

#[derive(Parser, Debug)]
#[command(name = "proctab")]
#[command(version, about = "Detached process supervisor with a self-healing pid registry", long_about = None)]
struct Cli {
    /// Registry directory (default: ~/.nscale/data)
    #[arg(long, global = true, env = "PROCTAB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Shell used to run commands
    #[arg(long, global = true, env = "PROCTAB_SHELL")]
    shell: Option<PathBuf>,

    /// Log level filter (e.g. "info", "debug", "warn")
    #[arg(long, global = true, env = "PROCTAB_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation)
    #[arg(long, global = true, env = "PROCTAB_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    action: ProcessAction,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config()?;
    if let Some(dir) = cli.data_dir {
        config.registry.data_dir = Some(dir);
    }
    if let Some(shell) = cli.shell {
        config.launcher.shell = shell;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    let log_filter = format!(
        "proctab={level},proctab_supervisor={level},proctab_core={level}",
        level = config.log_level
    );
    proctab_core::tracing_init::init_tracing(&log_filter, cli.log_json);

    let supervisor = Supervisor::from_config(&config)?;
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %supervisor.registry().data_dir().display(),
        "proctab ready"
    );

    process_cmd::run(&supervisor, cli.action).await
}
