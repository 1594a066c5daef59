pub mod broadcast;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod job_db;
pub mod logging;
pub mod manager;
pub mod queue;
pub mod registry;

pub use error::CoreError;
pub use manager::{DownloadManager, DownloadRequest, RecoveryReport, UploadedDescriptor};
