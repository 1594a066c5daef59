//! Types used by the job database.

use std::fmt;

/// Job identifier (SQLite rowid).
pub type JobId = i64;

/// Lifecycle state stored as a lowercase string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Paused => "paused",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => JobState::Queued,
            "running" => JobState::Running,
            "paused" => JobState::Paused,
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            "cancelled" => JobState::Cancelled,
            _ => JobState::Failed,
        }
    }

    /// Completed, Failed and Cancelled never transition on their own.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields known at admission time.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: String,
    pub target_id: String,
    pub magnet_url: Option<String>,
    /// Either an `http(s)://` descriptor URL or the file name of a descriptor
    /// cached in the descriptor directory.
    pub descriptor_url: Option<String>,
}

/// Full job row.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub user_id: String,
    pub target_id: String,
    pub magnet_url: Option<String>,
    pub descriptor_url: Option<String>,
    /// Engine-assigned transfer identifier, set once the engine accepts the job.
    pub transfer_id: Option<String>,
    /// Stable content hash reported by the engine; used to re-attach after restart.
    pub info_hash: Option<String>,
    pub state: JobState,
    /// Percent complete in [0, 100].
    pub progress: f64,
    pub downloaded_bytes: i64,
    pub total_bytes: i64,
    /// Bytes per second.
    pub download_rate: i64,
    /// Bytes per second.
    pub upload_rate: i64,
    pub peers: i64,
    pub seeds: i64,
    /// Seconds remaining, if the engine can estimate it.
    pub eta_secs: Option<i64>,
    /// Set only while the job is Failed.
    pub error: Option<String>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}
