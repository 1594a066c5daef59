//! Scripted in-memory transfer engine.
//!
//! Every accepted start gets transfer id `tN` and stable hash `hashN`. Tests
//! drive progress by pushing samples into a transfer's stream.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tdm_core::engine::{
    update_channel, EngineError, LoadedTransfer, Locator, ProgressUpdate, StartedTransfer,
    TransferEngine, TransferStatus, UpdateSink, UpdateSource,
};

#[derive(Default)]
struct Script {
    sinks: HashMap<String, UpdateSink>,
    loaded: Vec<LoadedTransfer>,
    started: Vec<Locator>,
    attached: Vec<String>,
    paused: Vec<String>,
    resumed: Vec<String>,
    cancelled: Vec<String>,
    reject_next: Option<EngineError>,
    stall_metadata: Option<Duration>,
}

#[derive(Default)]
pub struct FakeEngine {
    script: Mutex<Script>,
    next_id: AtomicU64,
    hang_starts: AtomicBool,
    fail_list: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn reject_next_start(&self, err: EngineError) {
        self.script().reject_next = Some(err);
    }

    /// Starts never return (the caller's timeout must fire).
    pub fn hang_starts(&self) {
        self.hang_starts.store(true, Ordering::SeqCst);
    }

    /// Starts load the transfer, wait `bound` for metadata that never comes,
    /// then unload it and report a metadata timeout.
    pub fn stall_metadata(&self, bound: Duration) {
        self.script().stall_metadata = Some(bound);
    }

    /// Transfers the engine currently has loaded.
    pub fn loaded_count(&self) -> usize {
        self.script().loaded.len()
    }

    pub fn fail_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    /// Pretend the engine re-loaded a transfer from its own state.
    pub fn preload(&self, transfer_id: &str, info_hash: &str) {
        self.script().loaded.push(LoadedTransfer {
            transfer_id: transfer_id.to_string(),
            info_hash: info_hash.to_string(),
        });
    }

    pub fn started(&self) -> Vec<Locator> {
        self.script().started.clone()
    }

    pub fn started_count(&self) -> usize {
        self.script().started.len()
    }

    pub fn attached(&self) -> Vec<String> {
        self.script().attached.clone()
    }

    pub fn paused(&self) -> Vec<String> {
        self.script().paused.clone()
    }

    pub fn resumed(&self) -> Vec<String> {
        self.script().resumed.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.script().cancelled.clone()
    }

    /// Deliver a sample on `transfer_id`'s stream. False if nobody listens.
    pub async fn push(&self, transfer_id: &str, update: ProgressUpdate) -> bool {
        let sink = self.script().sinks.get(transfer_id).cloned();
        match sink {
            Some(sink) => sink.push(update).await,
            None => false,
        }
    }

    pub async fn progress(&self, transfer_id: &str, done: u64, total: u64) -> bool {
        self.push(transfer_id, sample(done, total, TransferStatus::Downloading))
            .await
    }

    pub async fn complete(&self, transfer_id: &str, total: u64) -> bool {
        self.push(transfer_id, sample(total, total, TransferStatus::Completed))
            .await
    }

    /// Close `transfer_id`'s stream without a final sample.
    pub fn close(&self, transfer_id: &str) {
        self.script().sinks.remove(transfer_id);
    }

    fn open_stream(&self, transfer_id: &str) -> UpdateSource {
        let (sink, source) = update_channel(64);
        self.script().sinks.insert(transfer_id.to_string(), sink);
        source
    }
}

pub fn sample(done: u64, total: u64, status: TransferStatus) -> ProgressUpdate {
    ProgressUpdate {
        name: Some("payload.bin".to_string()),
        total_bytes: total,
        downloaded_bytes: done,
        download_rate: 1024,
        upload_rate: 16,
        progress: ProgressUpdate::percent(done, total),
        status,
        eta_secs: Some(30),
        peers: 5,
        seeds: 2,
        ..ProgressUpdate::default()
    }
}

#[async_trait]
impl TransferEngine for FakeEngine {
    async fn start(&self, locator: &Locator) -> Result<StartedTransfer, EngineError> {
        if self.hang_starts.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let rejected = self.script().reject_next.take();
        if let Some(err) = rejected {
            return Err(err);
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let transfer_id = format!("t{}", n);
        let stall = self.script().stall_metadata;
        if let Some(bound) = stall {
            self.preload(&transfer_id, &format!("hash{}", n));
            tokio::time::sleep(bound).await;
            self.script().loaded.retain(|t| t.transfer_id != transfer_id);
            return Err(EngineError::MetadataTimeout(bound.as_secs()));
        }
        self.script().started.push(locator.clone());
        let updates = self.open_stream(&transfer_id);
        Ok(StartedTransfer {
            transfer_id,
            info_hash: Some(format!("hash{}", n)),
            updates,
        })
    }

    async fn pause(&self, transfer_id: &str) -> Result<(), EngineError> {
        self.script().paused.push(transfer_id.to_string());
        Ok(())
    }

    async fn resume(&self, transfer_id: &str) -> Result<(), EngineError> {
        self.script().resumed.push(transfer_id.to_string());
        Ok(())
    }

    async fn cancel(&self, transfer_id: &str) -> Result<(), EngineError> {
        let mut script = self.script();
        script.cancelled.push(transfer_id.to_string());
        script.sinks.remove(transfer_id);
        Ok(())
    }

    async fn list_loaded(&self) -> Result<Vec<LoadedTransfer>, EngineError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("daemon down".to_string()));
        }
        Ok(self.script().loaded.clone())
    }

    async fn attach(&self, transfer_id: &str) -> Result<UpdateSource, EngineError> {
        let known = self
            .script()
            .loaded
            .iter()
            .any(|t| t.transfer_id == transfer_id);
        if !known {
            return Err(EngineError::UnknownTransfer(transfer_id.to_string()));
        }
        self.script().attached.push(transfer_id.to_string());
        Ok(self.open_stream(transfer_id))
    }
}
