//! Builders to construct queues, buses and batchers from configuration.

use std::sync::Arc;

use crate::config::DeliveryConfig;
use crate::core::{AckQueue, BatchSink, DeliveryError, PeriodicBatcher};
use crate::event::{EventBus, HandlerResolver};

fn checked(cfg: &DeliveryConfig) -> Result<(), DeliveryError> {
    cfg.validate()
        .map_err(|e| DeliveryError::InvalidConfig(format!("config invalid: {e}")))
}

/// Build the ack-tracked queue described by `cfg.queue`.
///
/// # Errors
///
/// Returns `DeliveryError::InvalidConfig` if any part of `cfg` is invalid.
pub fn build_ack_queue(cfg: &DeliveryConfig) -> Result<Arc<AckQueue>, DeliveryError> {
    checked(cfg)?;
    Ok(Arc::new(AckQueue::new(cfg.queue.clone())?))
}

/// Build an event bus over a fresh ack-tracked queue.
///
/// # Errors
///
/// Returns `DeliveryError::InvalidConfig` if any part of `cfg` is invalid.
pub fn build_event_bus<R>(cfg: &DeliveryConfig, resolver: R) -> Result<EventBus<R>, DeliveryError>
where
    R: HandlerResolver,
{
    let queue = build_ack_queue(cfg)?;
    Ok(EventBus::new(resolver, queue))
}

/// Build a periodic batcher described by `cfg.batching` around `sink`.
///
/// # Errors
///
/// Returns `DeliveryError::InvalidConfig` if any part of `cfg` is invalid.
pub fn build_batcher<T, S>(
    cfg: &DeliveryConfig,
    sink: S,
) -> Result<PeriodicBatcher<T, S>, DeliveryError>
where
    T: Send + Sync + 'static,
    S: BatchSink<T>,
{
    checked(cfg)?;
    PeriodicBatcher::new(cfg.batching.clone(), sink)
}
