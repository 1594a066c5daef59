//! `tdm pause|resume|cancel <id>` – forwarded to a running `tdm run`, or
//! applied to the job record directly when none is listening.

use anyhow::Result;
use tdm_core::config::{self, TdmConfig};
use tdm_core::job_db::JobDb;

use crate::cli::control_socket;
use crate::cli::offline_manager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Pause,
    Resume,
    Cancel,
}

impl ControlAction {
    pub fn verb(self) -> &'static str {
        match self {
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Cancel => "cancel",
        }
    }

    pub fn parse(verb: &str) -> Option<Self> {
        match verb {
            "pause" => Some(ControlAction::Pause),
            "resume" => Some(ControlAction::Resume),
            "cancel" => Some(ControlAction::Cancel),
            _ => None,
        }
    }

    fn done(self) -> &'static str {
        match self {
            ControlAction::Pause => "Paused",
            ControlAction::Resume => "Resumed",
            ControlAction::Cancel => "Cancelled",
        }
    }
}

pub async fn send_control(cfg: &TdmConfig, db: JobDb, action: ControlAction, id: i64) -> Result<()> {
    if let Ok(path) = config::control_socket_path() {
        match control_socket::send_command(&path, action, id).await {
            Ok(Some(reply)) => {
                control_socket::reply_to_result(&reply)?;
                println!("{} job {id}", action.done());
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("control socket unavailable: {:#}", e),
        }
    }

    let manager = offline_manager(cfg, db)?;
    match action {
        ControlAction::Pause => manager.pause(id).await?,
        ControlAction::Resume => manager.resume(id).await?,
        ControlAction::Cancel => manager.cancel(id).await?,
    }
    println!("{} job {id}", action.done());
    Ok(())
}
