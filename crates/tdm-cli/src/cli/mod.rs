//! CLI for the TDM transfer manager.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tdm_core::broadcast::NullGateway;
use tdm_core::config::{self, TdmConfig};
use tdm_core::engine::transmission::TransmissionEngine;
use tdm_core::job_db::JobDb;
use tdm_core::DownloadManager;

use commands::{run_add, run_coordinator, run_remove, run_status, send_control, ControlAction};

/// Top-level CLI for the TDM transfer manager.
#[derive(Debug, Parser)]
#[command(name = "tdm")]
#[command(about = "TDM: resumable torrent transfer manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Exactly one source for a new job.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Magnet link.
    #[arg(long)]
    pub magnet: Option<String>,
    /// HTTP/HTTPS URL of a .torrent file.
    #[arg(long)]
    pub url: Option<String>,
    /// Local .torrent file to upload.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a new transfer job.
    Add {
        /// Owning user.
        #[arg(long)]
        user: String,
        /// Target (catalog item) the transfer belongs to.
        #[arg(long)]
        target: String,
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Run the coordinator: recover, process queued jobs, stream progress until Ctrl-C.
    Run {
        /// Print progress notices as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Show status of all jobs.
    Status,

    /// Pause a running or queued job by its ID.
    Pause {
        /// Job identifier.
        id: i64,
    },

    /// Resume a paused or failed job by its ID.
    Resume {
        /// Job identifier.
        id: i64,
    },

    /// Cancel a job by its ID (the record is kept).
    Cancel {
        /// Job identifier.
        id: i64,
    },

    /// Cancel (if active) and delete a job record by ID.
    Remove {
        /// Job identifier.
        id: i64,
    },
}

/// Coordinator over the configured daemon and `db`, for commands that only
/// touch the store. Not started: nothing talks to the engine unless a job is
/// supervised, and none is in this process.
pub(crate) fn offline_manager(cfg: &TdmConfig, db: JobDb) -> Result<DownloadManager> {
    DownloadManager::new(
        cfg.clone(),
        db,
        Arc::new(TransmissionEngine::new(cfg)),
        Arc::new(NullGateway),
    )
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = JobDb::open_default().await?;

        match cli.command {
            CliCommand::Add {
                user,
                target,
                source,
            } => run_add(&cfg, db, &user, &target, source).await?,
            CliCommand::Run { json } => run_coordinator(cfg, db, json).await?,
            CliCommand::Status => run_status(&db).await?,
            CliCommand::Pause { id } => send_control(&cfg, db, ControlAction::Pause, id).await?,
            CliCommand::Resume { id } => send_control(&cfg, db, ControlAction::Resume, id).await?,
            CliCommand::Cancel { id } => send_control(&cfg, db, ControlAction::Cancel, id).await?,
            CliCommand::Remove { id } => run_remove(db, id).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
