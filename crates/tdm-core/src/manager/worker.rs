//! Executor loop: take a slot, take a job, start its transfer, hand it to a monitor.

use super::{monitor, Shared};
use crate::descriptor;
use crate::engine::{is_remote_url, EngineError, Locator, StartedTransfer};
use crate::job_db::{unix_timestamp, Job, JobId, JobState};
use crate::registry::JobControl;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;

pub(super) async fn run_worker(worker: usize, shared: Arc<Shared>, stop: CancellationToken) {
    tracing::debug!(worker, "executor started");
    loop {
        let permit = tokio::select! {
            _ = stop.cancelled() => break,
            permit = Arc::clone(&shared.slots).acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };
        let job_id = tokio::select! {
            _ = stop.cancelled() => break,
            next = shared.queue.recv() => match next {
                Some(id) => id,
                None => break,
            },
        };
        process_job(&shared, worker, job_id, permit).await;
    }
    tracing::debug!(worker, "executor stopped");
}

/// Locator for a claimed job. The error is the text stored on the failed job.
pub(super) async fn resolve_locator(job: &Job, descriptor_dir: &Path) -> Result<Locator, String> {
    if let Some(magnet) = job.magnet_url.as_deref().filter(|m| !m.trim().is_empty()) {
        return Ok(Locator::Magnet(magnet.to_string()));
    }
    match job.descriptor_url.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(url) if is_remote_url(url) => Ok(Locator::DescriptorUrl(url.to_string())),
        Some(name) => match descriptor::load(descriptor_dir, name).await {
            Ok(bytes) => Ok(Locator::DescriptorBytes(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(format!("descriptor file not found: {}", name))
            }
            Err(e) => Err(format!("read descriptor {}: {}", name, e)),
        },
        None => Err("no magnet link or descriptor provided".to_string()),
    }
}

async fn process_job(shared: &Arc<Shared>, worker: usize, job_id: JobId, permit: OwnedSemaphorePermit) {
    let job = match shared.db.get_job(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::debug!(worker, job_id, "job removed before start");
            return;
        }
        Err(e) => {
            tracing::warn!(worker, job_id, error = %e, "could not load job");
            return;
        }
    };
    if job.state != JobState::Queued {
        tracing::debug!(worker, job_id, state = %job.state, "job no longer queued; skipping");
        return;
    }
    match shared.db.claim_queued_job(job_id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(worker, job_id, "job claimed elsewhere; skipping");
            return;
        }
        Err(e) => {
            tracing::warn!(worker, job_id, error = %e, "could not claim job");
            return;
        }
    }
    let mut job = job;
    job.state = JobState::Running;
    job.error = None;
    job.started_at = Some(unix_timestamp());
    tracing::info!(worker, job_id, "job started");

    let locator = match resolve_locator(&job, &shared.descriptor_dir).await {
        Ok(l) => l,
        Err(msg) => return fail_job(shared, job, msg).await,
    };

    // The engine enforces the metadata bound and unloads what it added on
    // expiry; this only catches an engine that never answers.
    let metadata = shared.cfg.metadata_timeout();
    let backstop = metadata + shared.cfg.engine.request_timeout();
    let started = match tokio::time::timeout(backstop, shared.engine.start(&locator)).await {
        Ok(Ok(started)) => started,
        Ok(Err(e)) => {
            if e.is_timeout() {
                tracing::info!(worker, job_id = job.id, "engine gave up waiting for metadata");
            }
            return fail_job(shared, job, e.to_string()).await;
        }
        Err(_) => {
            let e = EngineError::MetadataTimeout(metadata.as_secs());
            return fail_job(shared, job, e.to_string()).await;
        }
    };
    attach_started(shared, worker, job, started, permit).await;
}

async fn fail_job(shared: &Shared, mut job: Job, msg: String) {
    tracing::warn!(job_id = job.id, error = %msg, "job failed to start");
    if let Err(e) = shared.db.set_failed(job.id, &msg).await {
        tracing::warn!(job_id = job.id, error = %e, "could not record failure");
    }
    job.state = JobState::Failed;
    job.error = Some(msg);
    job.download_rate = 0;
    job.upload_rate = 0;
    job.updated_at = unix_timestamp();
    shared.notify(&job, None);
}

/// Register the started transfer and spawn its monitor, unless the job was
/// paused or cancelled while the engine was starting it.
async fn attach_started(
    shared: &Arc<Shared>,
    worker: usize,
    mut job: Job,
    started: StartedTransfer,
    permit: OwnedSemaphorePermit,
) {
    let StartedTransfer {
        transfer_id,
        info_hash,
        updates,
    } = started;
    job.transfer_id = Some(transfer_id.clone());
    if info_hash.is_some() {
        job.info_hash = info_hash;
    }

    let control = match shared.registry.register(job.id, &transfer_id, Some(permit)) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(worker, job_id = job.id, error = %e, "cannot register started transfer; abandoning it");
            if let Err(e) = shared.engine.cancel(&transfer_id).await {
                tracing::warn!(job_id = job.id, transfer_id = %transfer_id, error = %e, "engine cancel failed");
            }
            return;
        }
    };

    {
        let _writes = control.lock_writes().await;
        if control.is_cancelled() {
            // The cancel path owns the row and the engine transfer from here.
            return;
        }
        let current = match shared.db.get_job(job.id).await {
            Ok(row) => row.map(|r| r.state),
            Err(e) => {
                tracing::warn!(job_id = job.id, error = %e, "could not re-read job after start");
                Some(JobState::Running)
            }
        };
        match current {
            None | Some(JobState::Cancelled) => {
                abandon(shared, &control, "job cancelled or removed during start").await;
                return;
            }
            Some(JobState::Paused) => {
                if let Err(e) = shared.engine.pause(&transfer_id).await {
                    tracing::warn!(job_id = job.id, transfer_id = %transfer_id, error = %e, "engine pause failed");
                }
                control.set_paused(true);
                control.release_slot();
                job.state = JobState::Paused;
            }
            _ => {}
        }
        job.updated_at = unix_timestamp();
        match shared.db.save_job(&job).await {
            Ok(true) => {}
            Ok(false) => {
                abandon(shared, &control, "job removed during start").await;
                return;
            }
            Err(e) => tracing::warn!(job_id = job.id, error = %e, "could not persist started transfer"),
        }
    }

    tracing::info!(worker, job_id = job.id, transfer_id = %transfer_id, "transfer running");
    shared.notify(&job, None);
    shared
        .tasks
        .spawn(monitor::supervise(Arc::clone(shared), job, control, updates));
}

async fn abandon(shared: &Shared, control: &Arc<JobControl>, reason: &str) {
    tracing::info!(job_id = control.job_id(), transfer_id = %control.transfer_id(), "{}; unloading transfer", reason);
    shared.registry.remove_if_current(control);
    control.cancel();
    control.release_slot();
    if let Err(e) = shared.engine.cancel(control.transfer_id()).await {
        tracing::warn!(job_id = control.job_id(), error = %e, "engine cancel failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_db::JobState;

    fn row(magnet: Option<&str>, descriptor: Option<&str>) -> Job {
        Job {
            id: 1,
            user_id: "u".into(),
            target_id: "t".into(),
            magnet_url: magnet.map(str::to_string),
            descriptor_url: descriptor.map(str::to_string),
            transfer_id: None,
            info_hash: None,
            state: JobState::Running,
            progress: 0.0,
            downloaded_bytes: 0,
            total_bytes: 0,
            download_rate: 0,
            upload_rate: 0,
            peers: 0,
            seeds: 0,
            eta_secs: None,
            error: None,
            started_at: None,
            completed_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn magnet_wins_over_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let job = row(Some("magnet:?xt=urn:btih:aa"), Some("https://x/y.torrent"));
        assert_eq!(
            resolve_locator(&job, dir.path()).await.unwrap(),
            Locator::Magnet("magnet:?xt=urn:btih:aa".into())
        );
    }

    #[tokio::test]
    async fn remote_descriptor_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let job = row(None, Some("https://x/y.torrent"));
        assert_eq!(
            resolve_locator(&job, dir.path()).await.unwrap(),
            Locator::DescriptorUrl("https://x/y.torrent".into())
        );
    }

    #[tokio::test]
    async fn cached_descriptor_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        descriptor::store(dir.path(), "t-y.torrent", b"d4:infoe").await.unwrap();
        let job = row(None, Some("t-y.torrent"));
        assert_eq!(
            resolve_locator(&job, dir.path()).await.unwrap(),
            Locator::DescriptorBytes(b"d4:infoe".to_vec())
        );
    }

    #[tokio::test]
    async fn missing_cached_descriptor_message() {
        let dir = tempfile::tempdir().unwrap();
        let job = row(None, Some("gone.torrent"));
        assert_eq!(
            resolve_locator(&job, dir.path()).await.unwrap_err(),
            "descriptor file not found: gone.torrent"
        );
        let empty = row(None, None);
        assert!(resolve_locator(&empty, dir.path()).await.is_err());
    }
}
