//! Bounded admission queue of job ids, shared by all executors.

use crate::error::CoreError;
use crate::job_db::JobId;
use async_channel::{Receiver, Sender, TrySendError};

#[derive(Debug, Clone)]
pub struct AdmissionQueue {
    tx: Sender<JobId>,
    rx: Receiver<JobId>,
}

impl AdmissionQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// Offer a job without waiting. A full queue is [`CoreError::QueueSaturated`];
    /// the caller decides whether that matters (the job row stays queued either way).
    pub fn try_enqueue(&self, id: JobId) -> Result<(), CoreError> {
        match self.tx.try_send(id) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(CoreError::QueueSaturated),
            Err(TrySendError::Closed(_)) => Err(CoreError::Stopped),
        }
    }

    /// Next job id in arrival order; None once the queue is closed and drained.
    pub async fn recv(&self) -> Option<JobId> {
        self.rx.recv().await.ok()
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }

    pub fn close(&self) {
        self.tx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_order() {
        let q = AdmissionQueue::new(4);
        q.try_enqueue(3).unwrap();
        q.try_enqueue(1).unwrap();
        q.try_enqueue(2).unwrap();
        assert_eq!(q.len(), 3);
        assert_eq!(q.recv().await, Some(3));
        assert_eq!(q.recv().await, Some(1));
        assert_eq!(q.recv().await, Some(2));
        assert!(q.is_empty());
    }

    #[test]
    fn saturation_is_reported() {
        let q = AdmissionQueue::new(2);
        q.try_enqueue(1).unwrap();
        q.try_enqueue(2).unwrap();
        assert!(matches!(q.try_enqueue(3), Err(CoreError::QueueSaturated)));
        assert_eq!(q.capacity(), 2);
    }

    #[tokio::test]
    async fn closed_queue_drains_then_ends() {
        let q = AdmissionQueue::new(2);
        q.try_enqueue(5).unwrap();
        q.close();
        assert!(matches!(q.try_enqueue(6), Err(CoreError::Stopped)));
        assert_eq!(q.recv().await, Some(5));
        assert_eq!(q.recv().await, None);
    }
}
