//! Per-user progress fan-out.
//!
//! The core pushes a [`ProgressNotice`] after every persisted progress write.
//! Delivery is best effort: a push never blocks, never fails, and a user with
//! no listener simply misses the notice. Transports (WebSocket, SSE, ...) sit
//! behind [`BroadcastGateway`].

use crate::job_db::{Job, JobId};
use serde::Serialize;
use tokio::sync::broadcast;

/// What a subscriber sees about one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressNotice {
    pub job_id: JobId,
    pub target_id: String,
    pub info_hash: Option<String>,
    pub name: Option<String>,
    pub status: String,
    pub progress: f64,
    pub downloaded_bytes: i64,
    pub total_bytes: i64,
    pub download_rate: i64,
    pub upload_rate: i64,
    pub eta_secs: Option<i64>,
    pub peers: i64,
    pub seeds: i64,
    pub error: Option<String>,
    pub updated_at: i64,
}

impl ProgressNotice {
    pub fn from_job(job: &Job, name: Option<&str>) -> Self {
        Self {
            job_id: job.id,
            target_id: job.target_id.clone(),
            info_hash: job.info_hash.clone(),
            name: name.map(str::to_string),
            status: job.state.as_str().to_string(),
            progress: job.progress,
            downloaded_bytes: job.downloaded_bytes,
            total_bytes: job.total_bytes,
            download_rate: job.download_rate,
            upload_rate: job.upload_rate,
            eta_secs: job.eta_secs,
            peers: job.peers,
            seeds: job.seeds,
            error: job.error.clone(),
            updated_at: job.updated_at,
        }
    }
}

/// Outbound push transport keyed by user id.
pub trait BroadcastGateway: Send + Sync {
    /// Deliver `notice` to every live subscriber of `user_id`. Must not block.
    fn push(&self, user_id: &str, notice: ProgressNotice);
}

/// Gateway that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullGateway;

impl BroadcastGateway for NullGateway {
    fn push(&self, _user_id: &str, _notice: ProgressNotice) {}
}

/// A notice tagged with its recipient.
#[derive(Debug, Clone)]
pub struct UserNotice {
    pub user_id: String,
    pub notice: ProgressNotice,
}

/// In-process gateway over a tokio broadcast channel. Slow subscribers lose
/// the oldest notices instead of stalling the sender.
#[derive(Debug, Clone)]
pub struct ChannelGateway {
    tx: broadcast::Sender<UserNotice>,
}

impl ChannelGateway {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Every notice for every user.
    pub fn subscribe_all(&self) -> broadcast::Receiver<UserNotice> {
        self.tx.subscribe()
    }

    /// Notices addressed to `user_id` only.
    pub fn subscribe(&self, user_id: &str) -> UserSubscription {
        UserSubscription {
            user_id: user_id.to_string(),
            rx: self.tx.subscribe(),
        }
    }
}

impl BroadcastGateway for ChannelGateway {
    fn push(&self, user_id: &str, notice: ProgressNotice) {
        // Err only means nobody is listening.
        let _ = self.tx.send(UserNotice {
            user_id: user_id.to_string(),
            notice,
        });
    }
}

pub struct UserSubscription {
    user_id: String,
    rx: broadcast::Receiver<UserNotice>,
}

impl UserSubscription {
    /// Next notice for this user; None once the gateway is gone.
    pub async fn recv(&mut self) -> Option<ProgressNotice> {
        loop {
            match self.rx.recv().await {
                Ok(n) if n.user_id == self.user_id => return Some(n.notice),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(user = %self.user_id, skipped, "progress subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
