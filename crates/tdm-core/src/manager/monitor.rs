//! Progress monitor: one task per supervised transfer.
//!
//! Applies engine samples to the job row in receipt order, persists each
//! snapshot, and pushes a notice to the owning user. Ends on a final sample,
//! on cancellation, when the engine closes the stream, or when the row is gone.

use super::guard::MonitorGuard;
use super::Shared;
use crate::engine::{ProgressUpdate, TransferStatus, UpdateSource};
use crate::job_db::{unix_timestamp, Job, JobState};
use crate::registry::JobControl;
use std::sync::Arc;
use std::time::Duration;

const TERMINAL_SAVE_ATTEMPTS: u32 = 3;
const TERMINAL_SAVE_BACKOFF: Duration = Duration::from_millis(200);

enum Flow {
    Continue,
    Finished,
}

pub(super) async fn supervise(
    shared: Arc<Shared>,
    mut job: Job,
    control: Arc<JobControl>,
    mut updates: UpdateSource,
) {
    let _guard = MonitorGuard {
        registry: &shared.registry,
        control: Arc::clone(&control),
    };
    let job_id = job.id;
    tracing::debug!(job_id, transfer_id = %control.transfer_id(), "monitor attached");

    loop {
        let update = tokio::select! {
            biased;
            _ = control.cancelled() => {
                tracing::debug!(job_id, "monitor cancelled");
                return;
            }
            next = updates.recv() => match next {
                Some(u) => u,
                None => {
                    stream_closed(&shared, &job, &control).await;
                    return;
                }
            },
        };
        if let Flow::Finished = apply(&shared, &mut job, &control, update).await {
            return;
        }
    }
}

/// Fold one sample into `job`. Byte counters and progress never move backwards.
pub(super) fn merge_sample(job: &mut Job, update: &ProgressUpdate, paused: bool, now: i64) {
    let downloaded = i64::try_from(update.downloaded_bytes).unwrap_or(i64::MAX);
    if downloaded >= job.downloaded_bytes {
        job.downloaded_bytes = downloaded;
        job.progress = update.progress.clamp(0.0, 100.0);
    } else {
        tracing::debug!(
            job_id = job.id,
            previous = job.downloaded_bytes,
            reported = downloaded,
            "regressing byte count ignored"
        );
    }
    job.total_bytes = i64::try_from(update.total_bytes).unwrap_or(i64::MAX);
    job.download_rate = i64::try_from(update.download_rate).unwrap_or(i64::MAX);
    job.upload_rate = i64::try_from(update.upload_rate).unwrap_or(i64::MAX);
    job.peers = i64::from(update.peers);
    job.seeds = i64::from(update.seeds);
    job.eta_secs = update.eta_secs.map(|s| i64::try_from(s).unwrap_or(i64::MAX));
    if job.info_hash.is_none() {
        job.info_hash = update.info_hash.clone();
    }
    job.updated_at = now;

    match update.status {
        TransferStatus::Completed => {
            job.state = JobState::Completed;
            job.progress = 100.0;
            job.downloaded_bytes = job.downloaded_bytes.max(job.total_bytes);
            job.download_rate = 0;
            job.eta_secs = Some(0);
            job.completed_at = Some(now);
            job.error = None;
        }
        TransferStatus::Failed => {
            job.state = JobState::Failed;
            job.download_rate = 0;
            job.upload_rate = 0;
            job.error = Some(
                update
                    .error
                    .clone()
                    .unwrap_or_else(|| "engine reported failure".to_string()),
            );
        }
        TransferStatus::Paused => job.state = JobState::Paused,
        TransferStatus::Waiting | TransferStatus::Downloading => {
            job.state = if paused {
                JobState::Paused
            } else {
                JobState::Running
            };
        }
    }
}

async fn apply(shared: &Shared, job: &mut Job, control: &JobControl, update: ProgressUpdate) -> Flow {
    let writes = control.lock_writes().await;
    // A cancel removes the entry before it takes the lock.
    if control.is_cancelled() || !shared.registry.is_current(control) {
        return Flow::Finished;
    }
    merge_sample(job, &update, control.is_paused(), unix_timestamp());
    let terminal = job.state.is_terminal();

    if terminal {
        // Deregister first: a terminal row must never belong to a registered job.
        shared.registry.remove_if_current(control);
        control.release_slot();
        let saved = save_terminal(shared, job).await;
        drop(writes);
        if saved {
            shared.notify(job, update.name.as_deref());
        }
        tracing::info!(job_id = job.id, state = %job.state, error = ?job.error, "transfer finished");
        return Flow::Finished;
    }

    match shared.db.save_job(job).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(job_id = job.id, "job row vanished; ending supervision");
            return Flow::Finished;
        }
        Err(e) => {
            tracing::warn!(job_id = job.id, error = %e, "progress write failed; skipping sample");
            return Flow::Continue;
        }
    }
    drop(writes);
    shared.notify(job, update.name.as_deref());
    Flow::Continue
}

async fn save_terminal(shared: &Shared, job: &Job) -> bool {
    for attempt in 1..=TERMINAL_SAVE_ATTEMPTS {
        match shared.db.save_job(job).await {
            Ok(true) => return true,
            Ok(false) => {
                tracing::warn!(job_id = job.id, "job row vanished before final write");
                return false;
            }
            Err(e) => {
                tracing::warn!(job_id = job.id, attempt, error = %e, "final write failed");
                if attempt < TERMINAL_SAVE_ATTEMPTS {
                    tokio::time::sleep(TERMINAL_SAVE_BACKOFF).await;
                }
            }
        }
    }
    false
}

/// The engine closed the stream: no more updates. Supervision ends and the
/// row keeps its last persisted state for recovery or a later resume.
async fn stream_closed(shared: &Shared, job: &Job, control: &JobControl) {
    let _writes = control.lock_writes().await;
    if control.is_cancelled() || !shared.registry.remove_if_current(control) {
        return;
    }
    control.release_slot();
    tracing::info!(
        job_id = job.id,
        transfer_id = %control.transfer_id(),
        state = %job.state,
        "update stream closed; supervision ended"
    );
}
