//! Engine → monitor progress stream.
//!
//! A bounded channel: the engine side may drop samples when the buffer is full,
//! but final samples are always delivered. Dropping the sink closes the stream,
//! which the monitor reads as "no more updates".

use tokio::sync::mpsc;

/// Coarse transfer status as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferStatus {
    /// Waiting for metadata, peers, or a verification pass.
    #[default]
    Waiting,
    Downloading,
    Paused,
    Completed,
    Failed,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Waiting => "waiting",
            TransferStatus::Downloading => "downloading",
            TransferStatus::Paused => "paused",
            TransferStatus::Completed => "completed",
            TransferStatus::Failed => "failed",
        }
    }

    /// No further samples follow a final one.
    pub fn is_final(self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed)
    }
}

/// One complete snapshot of a transfer. Each sample supersedes the previous one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressUpdate {
    pub info_hash: Option<String>,
    pub name: Option<String>,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    /// Bytes per second.
    pub download_rate: u64,
    /// Bytes per second.
    pub upload_rate: u64,
    /// Percent complete in [0, 100].
    pub progress: f64,
    pub status: TransferStatus,
    pub eta_secs: Option<u64>,
    pub peers: u32,
    pub seeds: u32,
    /// Engine-side error text, if any.
    pub error: Option<String>,
}

impl ProgressUpdate {
    /// Percent of `total` covered by `done`, clamped to [0, 100]. Zero-size is 0%.
    pub fn percent(done: u64, total: u64) -> f64 {
        if total == 0 {
            return 0.0;
        }
        (done as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Engine-side half of a progress stream.
#[derive(Debug, Clone)]
pub struct UpdateSink {
    tx: mpsc::Sender<ProgressUpdate>,
}

/// Monitor-side half of a progress stream.
#[derive(Debug)]
pub struct UpdateSource {
    rx: mpsc::Receiver<ProgressUpdate>,
}

/// Create a bounded progress stream holding up to `capacity` samples.
pub fn update_channel(capacity: usize) -> (UpdateSink, UpdateSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (UpdateSink { tx }, UpdateSource { rx })
}

impl UpdateSink {
    /// Offer a sample without waiting. Returns false if it was dropped
    /// (buffer full or monitor gone).
    pub fn try_push(&self, update: ProgressUpdate) -> bool {
        self.tx.try_send(update).is_ok()
    }

    /// Deliver a sample, waiting for buffer space. Returns false if the monitor is gone.
    pub async fn push(&self, update: ProgressUpdate) -> bool {
        self.tx.send(update).await.is_ok()
    }

    /// True once the monitor side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl UpdateSource {
    /// Next sample, or None when the engine closed the stream.
    pub async fn recv(&mut self) -> Option<ProgressUpdate> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_handles_zero_and_overflow() {
        assert_eq!(ProgressUpdate::percent(5, 0), 0.0);
        assert_eq!(ProgressUpdate::percent(50, 200), 25.0);
        assert_eq!(ProgressUpdate::percent(300, 200), 100.0);
    }

    #[tokio::test]
    async fn full_buffer_drops_until_drained() {
        let (sink, mut source) = update_channel(1);
        assert!(sink.try_push(ProgressUpdate::default()));
        assert!(!sink.try_push(ProgressUpdate::default()));
        assert!(source.recv().await.is_some());
        assert!(sink.try_push(ProgressUpdate::default()));
    }

    #[tokio::test]
    async fn dropping_sink_closes_source() {
        let (sink, mut source) = update_channel(4);
        assert!(sink.push(ProgressUpdate {
            status: TransferStatus::Completed,
            ..ProgressUpdate::default()
        })
        .await);
        drop(sink);
        assert_eq!(
            source.recv().await.map(|u| u.status),
            Some(TransferStatus::Completed)
        );
        assert!(source.recv().await.is_none());
    }

    #[tokio::test]
    async fn sink_sees_closed_monitor() {
        let (sink, source) = update_channel(4);
        assert!(!sink.is_closed());
        drop(source);
        assert!(sink.is_closed());
        assert!(!sink.try_push(ProgressUpdate::default()));
    }
}
