//! Registry of supervised jobs: job id -> control handle, plus the reverse
//! transfer id -> job id index.
//!
//! Each entry is created when a transfer starts (or is re-attached) and
//! removed when its monitor ends or the job is cancelled. The maps are only
//! held for insert/lookup/remove, never across engine or store calls.

use crate::error::CoreError;
use crate::job_db::JobId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{MutexGuard, OwnedSemaphorePermit};
use tokio_util::sync::CancellationToken;

/// Per-job handle shared by the registry, the monitor and control operations.
#[derive(Debug)]
pub struct JobControl {
    job_id: JobId,
    transfer_id: String,
    generation: u64,
    cancel: CancellationToken,
    paused: AtomicBool,
    /// Serializes progress writes against pause/resume/cancel writes.
    writes: tokio::sync::Mutex<()>,
    /// Executor slot held while the transfer actively runs.
    slot: Mutex<Option<OwnedSemaphorePermit>>,
}

impl JobControl {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn transfer_id(&self) -> &str {
        &self.transfer_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Signal the monitor to stop without writing anything further.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().await
    }

    pub fn holds_slot(&self) -> bool {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Give the executor slot back (no-op if none is held).
    pub fn release_slot(&self) {
        let permit = self.slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        if permit.is_some() {
            tracing::trace!(job_id = self.job_id, "executor slot released");
        }
    }

    /// Hold `permit` unless a slot is already held (the extra permit is returned on drop).
    pub fn hold_slot(&self, permit: OwnedSemaphorePermit) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(permit);
        }
    }
}

#[derive(Default)]
struct Maps {
    jobs: HashMap<JobId, Arc<JobControl>>,
    transfers: HashMap<String, JobId>,
}

#[derive(Default)]
pub struct JobRegistry {
    maps: RwLock<Maps>,
    next_generation: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a supervised job. At most one entry per job: a second
    /// registration is [`CoreError::AlreadyActive`].
    pub fn register(
        &self,
        job_id: JobId,
        transfer_id: &str,
        slot: Option<OwnedSemaphorePermit>,
    ) -> Result<Arc<JobControl>, CoreError> {
        let mut maps = self.maps.write().unwrap_or_else(|e| e.into_inner());
        if maps.jobs.contains_key(&job_id) {
            return Err(CoreError::AlreadyActive(job_id));
        }
        let control = Arc::new(JobControl {
            job_id,
            transfer_id: transfer_id.to_string(),
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            cancel: CancellationToken::new(),
            paused: AtomicBool::new(false),
            writes: tokio::sync::Mutex::new(()),
            slot: Mutex::new(slot),
        });
        maps.jobs.insert(job_id, Arc::clone(&control));
        maps.transfers.insert(transfer_id.to_string(), job_id);
        Ok(control)
    }

    pub fn get(&self, job_id: JobId) -> Option<Arc<JobControl>> {
        self.maps
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .jobs
            .get(&job_id)
            .cloned()
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        self.get(job_id).is_some()
    }

    pub fn job_for_transfer(&self, transfer_id: &str) -> Option<JobId> {
        self.maps
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .transfers
            .get(transfer_id)
            .copied()
    }

    /// True while `control` is the live registration of its job.
    pub fn is_current(&self, control: &JobControl) -> bool {
        self.maps
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .jobs
            .get(&control.job_id)
            .is_some_and(|c| c.generation == control.generation)
    }

    /// Remove whatever entry `job_id` has.
    pub fn remove(&self, job_id: JobId) -> Option<Arc<JobControl>> {
        let mut maps = self.maps.write().unwrap_or_else(|e| e.into_inner());
        let control = maps.jobs.remove(&job_id)?;
        if maps.transfers.get(control.transfer_id()) == Some(&job_id) {
            maps.transfers.remove(control.transfer_id());
        }
        Some(control)
    }

    /// Remove the entry only if it is still `control`'s registration. A monitor
    /// that outlived its entry (job cancelled, then re-registered) must not
    /// remove the newer one.
    pub fn remove_if_current(&self, control: &JobControl) -> bool {
        let mut maps = self.maps.write().unwrap_or_else(|e| e.into_inner());
        let current = maps
            .jobs
            .get(&control.job_id)
            .is_some_and(|c| c.generation == control.generation);
        if !current {
            return false;
        }
        maps.jobs.remove(&control.job_id);
        if maps.transfers.get(control.transfer_id()) == Some(&control.job_id) {
            maps.transfers.remove(control.transfer_id());
        }
        true
    }

    /// Empty the registry, returning every entry (used on shutdown).
    pub fn drain(&self) -> Vec<Arc<JobControl>> {
        let mut maps = self.maps.write().unwrap_or_else(|e| e.into_inner());
        maps.transfers.clear();
        maps.jobs.drain().map(|(_, c)| c).collect()
    }

    /// Ids of supervised jobs, ascending.
    pub fn job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self
            .maps
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .jobs
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.maps.read().unwrap_or_else(|e| e.into_inner()).jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
