//! Download coordinator.
//!
//! Owns the admission queue, the executor pool, the registry of supervised
//! jobs, one progress monitor per active transfer, the startup recovery scan
//! and the periodic status line. Callers submit work and control jobs through
//! [`DownloadManager`]; every state change is persisted in the job store.

mod admission;
mod control;
mod guard;
mod monitor;
mod recovery;
mod status;
mod worker;

use crate::broadcast::{BroadcastGateway, ProgressNotice};
use crate::config::TdmConfig;
use crate::engine::TransferEngine;
use crate::error::CoreError;
use crate::job_db::{Job, JobDb, JobId};
use crate::queue::AdmissionQueue;
use crate::registry::JobRegistry;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub use admission::{DownloadRequest, UploadedDescriptor};
pub use recovery::RecoveryReport;

/// State shared by every task the coordinator spawns.
pub(crate) struct Shared {
    pub(crate) db: JobDb,
    pub(crate) engine: Arc<dyn TransferEngine>,
    pub(crate) gateway: Arc<dyn BroadcastGateway>,
    pub(crate) registry: JobRegistry,
    pub(crate) queue: AdmissionQueue,
    /// One permit per executor; a running transfer keeps its permit.
    pub(crate) slots: Arc<Semaphore>,
    pub(crate) cfg: TdmConfig,
    pub(crate) descriptor_dir: PathBuf,
    pub(crate) tasks: TaskTracker,
}

impl Shared {
    pub(crate) fn notify(&self, job: &Job, name: Option<&str>) {
        self.gateway
            .push(&job.user_id, ProgressNotice::from_job(job, name));
    }
}

pub struct DownloadManager {
    shared: Arc<Shared>,
    stop: CancellationToken,
    started: AtomicBool,
}

impl DownloadManager {
    /// Build a coordinator. Nothing runs until [`DownloadManager::start`].
    pub fn new(
        cfg: TdmConfig,
        db: JobDb,
        engine: Arc<dyn TransferEngine>,
        gateway: Arc<dyn BroadcastGateway>,
    ) -> Result<Self> {
        let descriptor_dir = cfg.descriptor_dir()?;
        let workers = cfg.workers.max(1);
        let shared = Shared {
            db,
            engine,
            gateway,
            registry: JobRegistry::new(),
            queue: AdmissionQueue::new(cfg.queue_capacity),
            slots: Arc::new(Semaphore::new(workers)),
            cfg,
            descriptor_dir,
            tasks: TaskTracker::new(),
        };
        Ok(Self {
            shared: Arc::new(shared),
            stop: CancellationToken::new(),
            started: AtomicBool::new(false),
        })
    }

    /// Spawn the executors, the status reporter and the recovery scan.
    /// The returned handle resolves to the recovery report.
    pub fn start(&self) -> JoinHandle<RecoveryReport> {
        let shared = &self.shared;
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("download manager already started");
            return shared.tasks.spawn(async { RecoveryReport::default() });
        }
        let workers = shared.cfg.workers.max(1);
        for worker in 0..workers {
            shared.tasks.spawn(worker::run_worker(
                worker,
                Arc::clone(shared),
                self.stop.clone(),
            ));
        }
        shared
            .tasks
            .spawn(status::report_status(Arc::clone(shared), self.stop.clone()));
        tracing::info!(
            workers,
            queue_capacity = shared.queue.capacity(),
            "download manager started"
        );
        shared.tasks.spawn(recovery::recover(Arc::clone(shared)))
    }

    /// Stop every task and wait for them. Job rows keep their states so the
    /// next start can recover in-flight transfers.
    pub async fn stop(&self) {
        self.stop.cancel();
        self.shared.queue.close();
        for control in self.shared.registry.drain() {
            control.cancel();
            control.release_slot();
        }
        self.shared.tasks.close();
        self.shared.tasks.wait().await;
        tracing::info!("download manager stopped");
    }

    /// Validate and persist a request, then offer it to the executors.
    pub async fn submit(&self, request: DownloadRequest) -> Result<JobId, CoreError> {
        admission::submit(&self.shared, request).await
    }

    pub async fn pause(&self, id: JobId) -> Result<(), CoreError> {
        control::pause(&self.shared, id).await
    }

    pub async fn resume(&self, id: JobId) -> Result<(), CoreError> {
        control::resume(&self.shared, id).await
    }

    pub async fn cancel(&self, id: JobId) -> Result<(), CoreError> {
        control::cancel(&self.shared, id).await
    }

    pub async fn get(&self, id: JobId) -> Result<Job, CoreError> {
        self.shared
            .db
            .get_job(id)
            .await?
            .ok_or(CoreError::NotFound(id))
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Result<Vec<Job>, CoreError> {
        Ok(self.shared.db.list_jobs().await?)
    }

    /// Ids of jobs currently supervised by a monitor.
    pub fn active_jobs(&self) -> Vec<JobId> {
        self.shared.registry.job_ids()
    }

    pub fn is_active(&self, id: JobId) -> bool {
        self.shared.registry.contains(id)
    }

    pub fn queued_len(&self) -> usize {
        self.shared.queue.len()
    }
}
