//! Core delivery primitives: timer, queues, envelopes and batching.

pub mod ack_queue;
pub mod backoff;
pub mod batching;
pub mod bounded_queue;
pub mod envelope;
pub mod error;
pub mod timer;

pub use ack_queue::{AckQueue, AckQueueStats, READ_ALL_POLL_INTERVAL};
pub use backoff::BatchStatus;
pub use batching::{BatchSink, BatcherStats, FnSink, PeriodicBatcher};
pub use bounded_queue::BoundedQueue;
pub use envelope::{Envelope, EventId, EventProperties, RawEnvelope};
pub use error::{AppResult, DeliveryError};
pub use timer::{ScheduledTimer, TimerState};
