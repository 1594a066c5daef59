//! `tdm remove <id>` – cancel the job if a coordinator runs it, then delete its record.

use anyhow::Result;
use tdm_core::config;
use tdm_core::job_db::JobDb;

use crate::cli::commands::ControlAction;
use crate::cli::control_socket;

pub async fn run_remove(db: JobDb, id: i64) -> Result<()> {
    if db.get_job(id).await?.is_none() {
        anyhow::bail!("job {id} not found");
    }
    if let Ok(path) = config::control_socket_path() {
        if let Ok(Some(reply)) = control_socket::send_command(&path, ControlAction::Cancel, id).await {
            if let Err(e) = control_socket::reply_to_result(&reply) {
                tracing::debug!(job_id = id, "cancel before remove: {:#}", e);
            }
        }
    }
    db.remove_job(id).await?;
    println!("Removed job {id}");
    Ok(())
}
