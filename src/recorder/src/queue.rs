//! Bounded, non-blocking record queue (§4.8).
//!
//! Enqueue is always non-blocking from the prober's perspective: a full
//! queue drops the record and increments a counter rather than applying
//! back-pressure, preserving prober timing over record completeness.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// Matches the original's `RECORD_QUEUE_MAXSIZE`.
pub const RECORD_QUEUE_MAXSIZE: usize = 50_000;

pub struct RecordQueue<T> {
    sender: mpsc::Sender<T>,
    dropped: Arc<AtomicU64>,
}

impl<T: Send + 'static> RecordQueue<T> {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<T>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                sender,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            receiver,
        )
    }

    /// Non-blocking enqueue; on a full queue, increments `dropped` and
    /// returns the record back to the caller.
    pub fn try_enqueue(&self, record: T) -> Result<(), T> {
        match self.sender.try_send(record) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(record)
            }
            Err(mpsc::error::TrySendError::Closed(record)) => Err(record),
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        self.dropped.clone()
    }
}

impl<T> Clone for RecordQueue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            dropped: self.dropped.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        let (queue, mut rx) = RecordQueue::<u32>::bounded(1);
        assert!(queue.try_enqueue(1).is_ok());
        assert!(queue.try_enqueue(2).is_err());
        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(rx.recv().await, Some(1));
    }
}
