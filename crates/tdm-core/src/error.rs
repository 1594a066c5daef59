//! Errors surfaced by the orchestration API.

use crate::engine::EngineError;
use crate::job_db::{JobId, JobState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("cannot {action} job {id}: it is {state}")]
    InvalidState {
        id: JobId,
        state: JobState,
        action: &'static str,
    },
    /// A monitor already supervises this job.
    #[error("job {0} is already being supervised")]
    AlreadyActive(JobId),
    #[error("admission queue is full")]
    QueueSaturated,
    #[error("download manager is stopped")]
    Stopped,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("descriptor cache: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
