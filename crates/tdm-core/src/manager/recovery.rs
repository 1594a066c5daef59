//! Startup recovery: re-attach monitors to transfers the engine still holds
//! and put everything else back on the admission queue.

use super::{monitor, Shared};
use crate::engine::LoadedTransfer;
use crate::error::CoreError;
use crate::job_db::{unix_timestamp, Job, JobState};
use std::sync::Arc;

/// Outcome of one recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Jobs whose transfer was still loaded and now has a monitor again.
    pub reattached: usize,
    /// Jobs reset to queued and offered to the executors.
    pub requeued: usize,
    /// Jobs left queued because the admission queue was full.
    pub left_queued: usize,
}

pub(super) async fn recover(shared: Arc<Shared>) -> RecoveryReport {
    let mut report = RecoveryReport::default();

    let loaded = match shared.engine.list_loaded().await {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::warn!(error = %e, "could not list engine transfers; assuming none are loaded");
            Vec::new()
        }
    };
    tracing::info!("engine holds {} transfer(s)", loaded.len());

    let jobs = match shared
        .db
        .find_by_states(&[JobState::Running, JobState::Queued])
        .await
    {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::error!(error = %e, "could not load jobs for recovery");
            return report;
        }
    };

    for job in jobs {
        if shared.registry.contains(job.id) {
            continue;
        }
        let matched = job.info_hash.as_deref().and_then(|hash| {
            loaded
                .iter()
                .find(|t| t.info_hash.eq_ignore_ascii_case(hash))
        });
        if let Some(transfer) = matched {
            match reattach(&shared, job.clone(), transfer).await {
                Ok(()) => {
                    report.reattached += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(job_id = job.id, error = %e, "re-attach failed; requeueing");
                }
            }
        }
        requeue(&shared, &job, &mut report).await;
    }

    tracing::info!(
        reattached = report.reattached,
        requeued = report.requeued,
        left_queued = report.left_queued,
        "recovery finished"
    );
    report
}

async fn reattach(shared: &Arc<Shared>, mut job: Job, transfer: &LoadedTransfer) -> Result<(), CoreError> {
    if let Some(owner) = shared.registry.job_for_transfer(&transfer.transfer_id) {
        return Err(CoreError::InvalidRequest(format!(
            "transfer {} already supervised for job {}",
            transfer.transfer_id, owner
        )));
    }
    let updates = shared.engine.attach(&transfer.transfer_id).await?;
    let slot = Arc::clone(&shared.slots).try_acquire_owned().ok();
    if slot.is_none() {
        tracing::debug!(job_id = job.id, "no free executor slot; re-attaching without one");
    }
    let control = shared.registry.register(job.id, &transfer.transfer_id, slot)?;

    job.transfer_id = Some(transfer.transfer_id.clone());
    job.state = JobState::Running;
    job.error = None;
    job.updated_at = unix_timestamp();
    {
        let _writes = control.lock_writes().await;
        if let Err(e) = shared.db.save_job(&job).await {
            tracing::warn!(job_id = job.id, error = %e, "could not persist re-attached job");
        }
    }
    tracing::info!(job_id = job.id, transfer_id = %transfer.transfer_id, "re-attached to loaded transfer");
    shared
        .tasks
        .spawn(monitor::supervise(Arc::clone(shared), job, control, updates));
    Ok(())
}

async fn requeue(shared: &Shared, job: &Job, report: &mut RecoveryReport) {
    if job.state != JobState::Queued {
        if let Err(e) = shared.db.set_state(job.id, JobState::Queued).await {
            tracing::warn!(job_id = job.id, error = %e, "could not reset job to queued");
            return;
        }
    }
    match shared.queue.try_enqueue(job.id) {
        Ok(()) => {
            tracing::debug!(job_id = job.id, "job requeued");
            report.requeued += 1;
        }
        Err(e) => {
            tracing::warn!(job_id = job.id, error = %e, "job left queued");
            report.left_queued += 1;
        }
    }
}
