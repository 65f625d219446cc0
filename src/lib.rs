//! # Prometheus Delivery
//!
//! In-process event delivery primitives: an at-least-once queue with explicit
//! acknowledgement, a periodic batching engine for sinks, and the single-shot timer
//! both are built on.
//!
//! ## Core Problem Solved
//!
//! Producers want to hand work off and move on; consumers want to process it at their
//! own pace without losing anything when they crash mid-way or fall behind:
//!
//! - **Lost Work**: A dequeued event that is never acknowledged returns to the queue
//!   once its deadline passes
//! - **Chatty Sinks**: Log and metric sinks receive bounded batches on a schedule
//!   instead of one call per item
//! - **Failing Sinks**: Exponential backoff, then bounded dropping, keeps a dead sink
//!   from growing memory forever
//! - **Overlapping Ticks**: Timer callbacks never run concurrently with themselves
//!
//! ## Components
//!
//! - [`core::ScheduledTimer`]: re-armable single-shot timer with non-overlapping callbacks
//! - [`core::BoundedQueue`]: thread-safe FIFO that drops on overflow
//! - [`core::AckQueue`]: ack-tracked queue with deadline-based requeue
//! - [`core::PeriodicBatcher`]: timer-driven batching over a [`core::BatchSink`]
//! - [`event::EventBus`]: publish to handlers or enqueue for later dispatch
//!
//! ## Ack-Tracked Queue
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use prometheus_delivery::config::AckQueueConfig;
//! use prometheus_delivery::core::AckQueue;
//!
//! let queue = AckQueue::new(
//!     AckQueueConfig::new()
//!         .with_ack_timeout(Duration::from_secs(30))
//!         .with_auto_requeue(Duration::from_secs(5)),
//! )?;
//!
//! queue.enqueue(OrderCreated { order_id: 7 }, None)?;
//! if let Some(envelope) = queue.dequeue::<OrderCreated>() {
//!     process(envelope.data())?;
//!     queue.ack(&envelope.event_id());
//! }
//! ```
//!
//! ## Periodic Batching
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use prometheus_delivery::config::BatchConfig;
//! use prometheus_delivery::core::{FnSink, PeriodicBatcher};
//!
//! let batcher = PeriodicBatcher::new(
//!     BatchConfig::new(500, Duration::from_secs(2)),
//!     FnSink(|lines: &[String]| ship(lines)),
//! )?;
//! batcher.emit("request served".to_string())?;
//! batcher.dispose(); // final flush
//! ```
//!
//! For complete examples, see the integration tests under `tests/`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core delivery primitives.
pub mod core;
/// Configuration models for queues, batchers and backoff.
pub mod config;
/// Builders to construct delivery components from configuration.
pub mod builders;
/// Event bus and handler abstractions.
pub mod event;
/// Infrastructure adapters.
pub mod infra;
/// Worker threads and runtimes for async sinks.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::core::{
    AckQueue, AppResult, BatchSink, BoundedQueue, DeliveryError, Envelope, EventId,
    EventProperties, PeriodicBatcher, ScheduledTimer,
};
pub use crate::event::{EventBus, EventHandler, HandlerResolver};
pub use crate::infra::InMemoryHandlerRegistry;
