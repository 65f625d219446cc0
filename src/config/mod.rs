//! Configuration models for queues, batchers and backoff.

pub mod delivery;

pub use delivery::{AckQueueConfig, BackoffConfig, BatchConfig, DeliveryConfig};
