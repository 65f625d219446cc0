//! Fixed-capacity FIFO buffer with non-blocking enqueue and dequeue.
//!
//! Backed by a `crossbeam-channel` channel that the queue owns both ends of: a
//! `bounded(limit)` channel when a limit is given, `unbounded()` otherwise. Items a
//! single producer enqueues come out in the order they went in; concurrent producers
//! interleave but every accepted item is dequeued exactly once.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

use crate::core::DeliveryError;

/// Thread-safe FIFO queue that drops new items once `limit` is reached.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    limit: Option<usize>,
    dropped: AtomicU64,
}

impl<T> BoundedQueue<T> {
    /// Create a queue without a capacity limit.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            limit: None,
            dropped: AtomicU64::new(0),
        }
    }

    /// Create a queue holding at most `limit` items.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::InvalidArgument` if `limit` is zero.
    pub fn with_limit(limit: usize) -> Result<Self, DeliveryError> {
        if limit == 0 {
            return Err(DeliveryError::InvalidArgument(
                "queue limit must be greater than 0".into(),
            ));
        }
        let (tx, rx) = bounded(limit);
        Ok(Self {
            tx,
            rx,
            limit: Some(limit),
            dropped: AtomicU64::new(0),
        })
    }

    /// Create a queue from an optional limit (`None` means unbounded).
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::InvalidArgument` if the limit is `Some(0)`.
    pub fn from_limit(limit: Option<usize>) -> Result<Self, DeliveryError> {
        limit.map_or_else(|| Ok(Self::new()), Self::with_limit)
    }

    /// Append `item`. Returns `false` and drops the item if the queue is full.
    pub fn try_enqueue(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            // The queue holds its own receiver, so only `Full` can occur here.
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Remove the oldest item, or `None` if the queue is empty.
    pub fn try_dequeue(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Discard every queued item and return how many were removed.
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Number of items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Configured capacity, `None` when unbounded.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Items rejected because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Default for BoundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
