//! Pause, resume and cancel.
//!
//! A supervised job is controlled in place through its registry entry, under
//! the job's write lock so the monitor cannot overwrite the new state. A job
//! without an entry is controlled through its row alone.

use super::Shared;
use crate::error::CoreError;
use crate::job_db::{Job, JobId, JobState};
use crate::registry::JobControl;
use std::sync::Arc;

async fn load(shared: &Shared, id: JobId) -> Result<Job, CoreError> {
    shared.db.get_job(id).await?.ok_or(CoreError::NotFound(id))
}

async fn set_state(shared: &Shared, id: JobId, state: JobState) -> Result<(), CoreError> {
    if !shared.db.set_state(id, state).await? {
        return Err(CoreError::NotFound(id));
    }
    Ok(())
}

async fn notify_row(shared: &Shared, id: JobId) {
    match shared.db.get_job(id).await {
        Ok(Some(job)) => shared.notify(&job, None),
        Ok(None) => {}
        Err(e) => tracing::debug!(job_id = id, error = %e, "could not reload job for notice"),
    }
}

pub(super) async fn pause(shared: &Shared, id: JobId) -> Result<(), CoreError> {
    if let Some(control) = shared.registry.get(id) {
        return pause_in_place(shared, &control).await;
    }
    let job = load(shared, id).await?;
    match job.state {
        JobState::Paused => return Ok(()),
        s if s.is_terminal() => {
            return Err(CoreError::InvalidState {
                id,
                state: s,
                action: "pause",
            })
        }
        _ => set_state(shared, id, JobState::Paused).await?,
    }
    // A worker may have registered the transfer while the row was being written.
    if let Some(control) = shared.registry.get(id) {
        pause_in_place(shared, &control).await?;
    }
    tracing::info!(job_id = id, "job paused");
    notify_row(shared, id).await;
    Ok(())
}

async fn pause_in_place(shared: &Shared, control: &Arc<JobControl>) -> Result<(), CoreError> {
    let id = control.job_id();
    {
        let _writes = control.lock_writes().await;
        if control.is_cancelled() {
            return Err(CoreError::NotFound(id));
        }
        if !control.is_paused() {
            shared.engine.pause(control.transfer_id()).await?;
            control.set_paused(true);
        }
        set_state(shared, id, JobState::Paused).await?;
    }
    control.release_slot();
    tracing::info!(job_id = id, transfer_id = %control.transfer_id(), "transfer paused");
    notify_row(shared, id).await;
    Ok(())
}

pub(super) async fn resume(shared: &Shared, id: JobId) -> Result<(), CoreError> {
    if let Some(control) = shared.registry.get(id) {
        return resume_in_place(shared, &control).await;
    }
    let job = load(shared, id).await?;
    match job.state {
        JobState::Completed | JobState::Cancelled => {
            return Err(CoreError::InvalidState {
                id,
                state: job.state,
                action: "resume",
            })
        }
        // Claimed by an executor that is still starting the transfer.
        JobState::Running => return Ok(()),
        JobState::Paused | JobState::Failed => set_state(shared, id, JobState::Queued).await?,
        JobState::Queued => {}
    }
    match shared.queue.try_enqueue(id) {
        Ok(()) => tracing::info!(job_id = id, "job requeued"),
        Err(e) => tracing::warn!(job_id = id, error = %e, "job stays queued without a queue slot"),
    }
    notify_row(shared, id).await;
    Ok(())
}

async fn resume_in_place(shared: &Shared, control: &Arc<JobControl>) -> Result<(), CoreError> {
    let id = control.job_id();
    {
        let _writes = control.lock_writes().await;
        if control.is_cancelled() {
            return Err(CoreError::NotFound(id));
        }
        if !control.is_paused() {
            return Ok(());
        }
        shared.engine.resume(control.transfer_id()).await?;
        control.set_paused(false);
        set_state(shared, id, JobState::Running).await?;
    }
    match Arc::clone(&shared.slots).try_acquire_owned() {
        Ok(permit) => control.hold_slot(permit),
        Err(_) => tracing::debug!(job_id = id, "no free executor slot; resuming without one"),
    }
    tracing::info!(job_id = id, transfer_id = %control.transfer_id(), "transfer resumed");
    notify_row(shared, id).await;
    Ok(())
}

pub(super) async fn cancel(shared: &Shared, id: JobId) -> Result<(), CoreError> {
    if let Some(control) = shared.registry.remove(id) {
        return cancel_removed(shared, control).await;
    }
    let job = load(shared, id).await?;
    if job.state.is_terminal() {
        return Ok(());
    }
    set_state(shared, id, JobState::Cancelled).await?;
    // A worker may have registered the transfer while the row was being written.
    if let Some(control) = shared.registry.remove(id) {
        return cancel_removed(shared, control).await;
    }
    tracing::info!(job_id = id, "job cancelled");
    notify_row(shared, id).await;
    Ok(())
}

/// Stop a job whose registry entry was already removed.
async fn cancel_removed(shared: &Shared, control: Arc<JobControl>) -> Result<(), CoreError> {
    let id = control.job_id();
    {
        let _writes = control.lock_writes().await;
        control.cancel();
    }
    control.release_slot();
    if let Err(e) = shared.engine.cancel(control.transfer_id()).await {
        tracing::warn!(job_id = id, transfer_id = %control.transfer_id(), error = %e, "engine cancel failed");
    }
    set_state(shared, id, JobState::Cancelled).await?;
    tracing::info!(job_id = id, transfer_id = %control.transfer_id(), "transfer cancelled");
    notify_row(shared, id).await;
    Ok(())
}
