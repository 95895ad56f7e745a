//! Process supervision subcommands.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;
use proctab_core::{Mode, ProcessRecord};
use proctab_supervisor::Supervisor;

use crate::console::ConsoleSink;
use crate::manifest::Manifest;

/// Supervision actions.
#[derive(Subcommand, Debug)]
pub enum ProcessAction {
    /// Show the command a start would run, without running it
    Preview {
        /// Launch manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Start a container's command as a detached process and record it
    Start {
        /// Launch manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,
        /// Dry run: report the command, spawn nothing, record nothing
        #[arg(long)]
        preview: bool,
    },
    /// Send SIGTERM to a container's process
    Stop {
        /// Launch manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,
        /// Pid to stop, overriding the manifest's `container.pid`
        #[arg(long)]
        pid: Option<u32>,
        /// Dry run: signal nothing
        #[arg(long)]
        preview: bool,
    },
    /// List supervised processes that are still running
    Ps {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

const fn mode(preview: bool) -> Mode {
    if preview { Mode::Preview } else { Mode::Live }
}

/// Execute a supervision subcommand.
pub async fn run(supervisor: &Supervisor, action: ProcessAction) -> anyhow::Result<()> {
    let mut out = io::stdout();
    match action {
        ProcessAction::Preview { manifest } => {
            let manifest = Manifest::load(&manifest)?;
            supervisor.preview(&manifest.container_definition, &ConsoleSink);
        }
        ProcessAction::Start { manifest, preview } => {
            let manifest = Manifest::load(&manifest)?;
            let request = manifest.request(mode(preview));
            if let Some(pid) = supervisor.start(&request, Arc::new(ConsoleSink)).await? {
                writeln!(out, "Started {} as pid {pid}.", manifest.container.id)?;
            }
        }
        ProcessAction::Stop {
            manifest,
            pid,
            preview,
        } => {
            let mut manifest = Manifest::load(&manifest)?;
            if pid.is_some() {
                manifest.container.pid = pid;
            }
            supervisor.stop(&manifest.request(mode(preview)), &ConsoleSink)?;
        }
        ProcessAction::Ps { json } => {
            let records = supervisor.read_all_process_details().await?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&records)?)?;
            } else {
                write_table(&mut out, &records)?;
            }
        }
    }
    Ok(())
}

fn write_table(out: &mut impl Write, records: &[ProcessRecord]) -> io::Result<()> {
    if records.is_empty() {
        return writeln!(out, "No supervised processes running.");
    }
    writeln!(
        out,
        "{:>8}  {:<24}  {:<24}  {:<12}  TARGET",
        "PID", "CONTAINER", "SYSTEM", "TYPE"
    )?;
    for r in records {
        writeln!(
            out,
            "{:>8}  {:<24}  {:<24}  {:<12}  {}",
            r.pid, r.container_id, r.system_id, r.container_type, r.target
        )?;
    }
    Ok(())
}
