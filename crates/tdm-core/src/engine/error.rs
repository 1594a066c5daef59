//! Engine adapter errors.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine refused the transfer (bad locator, unparsable descriptor, ...).
    #[error("engine rejected transfer: {0}")]
    Rejected(String),
    /// Metadata for a new transfer did not arrive in time.
    #[error("engine metadata not available within {0} seconds")]
    MetadataTimeout(u64),
    #[error("transfer {0} is not loaded in the engine")]
    UnknownTransfer(String),
    /// The engine could not be reached or answered garbage.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::MetadataTimeout(_))
    }
}
