//! Shared harness for the orchestration integration tests.

#![allow(dead_code)]

pub mod fake_engine;

use fake_engine::FakeEngine;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tdm_core::broadcast::ChannelGateway;
use tdm_core::config::{EngineConfig, TdmConfig};
use tdm_core::job_db::{Job, JobDb, JobId, JobState};
use tdm_core::DownloadManager;
use tempfile::TempDir;

pub const WAIT: Duration = Duration::from_secs(5);

pub struct Harness {
    pub manager: DownloadManager,
    pub engine: Arc<FakeEngine>,
    pub gateway: Arc<ChannelGateway>,
    pub db: JobDb,
    pub dir: TempDir,
}

pub fn config(dir: &Path, workers: usize) -> TdmConfig {
    TdmConfig {
        workers,
        queue_capacity: 16,
        metadata_timeout_secs: 1,
        status_interval_secs: 1,
        update_buffer: 16,
        descriptor_dir: Some(dir.join("descriptors")),
        engine: EngineConfig {
            request_timeout_secs: 1,
            ..EngineConfig::default()
        },
        ..TdmConfig::default()
    }
}

/// Coordinator over a fresh SQLite file and a fake engine. Not started.
pub async fn harness(workers: usize) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = JobDb::open_at(dir.path().join("jobs.db")).await.unwrap();
    harness_with(dir, db, FakeEngine::new(), |d: &Path| config(d, workers))
}

pub fn harness_with(
    dir: TempDir,
    db: JobDb,
    engine: Arc<FakeEngine>,
    cfg: impl FnOnce(&Path) -> TdmConfig,
) -> Harness {
    let gateway = Arc::new(ChannelGateway::new(256));
    let manager = DownloadManager::new(
        cfg(dir.path()),
        db.clone(),
        engine.clone(),
        gateway.clone(),
    )
    .unwrap();
    Harness {
        manager,
        engine,
        gateway,
        db,
        dir,
    }
}

/// Poll the store until `id` reaches `state`.
pub async fn wait_state(db: &JobDb, id: JobId, state: JobState) -> Job {
    wait_job(db, id, |j| j.state == state)
        .await
        .unwrap_or_else(|| panic!("job {} never reached {}", id, state))
}

/// Poll the store until `pred` holds for job `id`; None on timeout.
pub async fn wait_job(db: &JobDb, id: JobId, pred: impl Fn(&Job) -> bool) -> Option<Job> {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if let Some(job) = db.get_job(id).await.unwrap() {
            if pred(&job) {
                return Some(job);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until `cond` holds; panics with `what` on timeout.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
