//! Transfer engine boundary.
//!
//! The peer-to-peer engine is an external component. The core talks to it only
//! through [`TransferEngine`], so the concrete engine (the Transmission RPC
//! adapter in [`transmission`], or a scripted engine in tests) can be swapped.

mod error;
mod locator;
pub mod transmission;
mod update;

use async_trait::async_trait;

pub use error::EngineError;
pub use locator::{is_remote_url, Locator};
pub use update::{update_channel, ProgressUpdate, TransferStatus, UpdateSink, UpdateSource};

/// Engine-assigned identifier of one loaded transfer.
pub type TransferId = String;

/// A transfer the engine accepted, with its stream of progress samples.
#[derive(Debug)]
pub struct StartedTransfer {
    pub transfer_id: TransferId,
    /// Stable content hash, if the engine knows it at start time.
    pub info_hash: Option<String>,
    pub updates: UpdateSource,
}

/// A transfer the engine already holds (e.g. re-loaded from its own on-disk state).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTransfer {
    pub transfer_id: TransferId,
    pub info_hash: String,
}

/// Capability set the orchestration core needs from a transfer engine.
///
/// `start` must not wait for transfer metadata longer than the engine's
/// configured bound; expiry is reported as [`EngineError::MetadataTimeout`].
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Load a new transfer and begin fetching it.
    async fn start(&self, locator: &Locator) -> Result<StartedTransfer, EngineError>;

    /// Stop requesting pieces for a transfer; it stays loaded.
    async fn pause(&self, transfer_id: &str) -> Result<(), EngineError>;

    async fn resume(&self, transfer_id: &str) -> Result<(), EngineError>;

    /// Abandon a transfer and unload it. Downloaded data is left on disk.
    async fn cancel(&self, transfer_id: &str) -> Result<(), EngineError>;

    /// Transfers currently loaded in the engine, with their stable hashes.
    async fn list_loaded(&self) -> Result<Vec<LoadedTransfer>, EngineError>;

    /// Open a fresh progress stream for an already-loaded transfer without restarting it.
    async fn attach(&self, transfer_id: &str) -> Result<UpdateSource, EngineError>;
}
