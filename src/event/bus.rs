//! Event bus: publish to handlers directly or through the ack-tracked queue.

use std::any::Any;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::core::{AckQueue, DeliveryError, Envelope, EventId, EventProperties};
use crate::event::handler::HandlerResolver;

/// Outcome of running the handlers for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that were resolved and invoked.
    pub handlers: usize,
    /// Handlers that returned an error.
    pub failed: usize,
}

impl DispatchReport {
    /// Whether at least one handler ran.
    #[must_use]
    pub const fn handled(&self) -> bool {
        self.handlers > 0
    }

    /// Whether every handler that ran succeeded.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Front door for producers and consumers of events.
pub struct EventBus<R> {
    resolver: R,
    queue: Arc<AckQueue>,
}

impl<R: HandlerResolver> EventBus<R> {
    /// Bus over `resolver`, enqueueing into `queue`.
    pub const fn new(resolver: R, queue: Arc<AckQueue>) -> Self {
        Self { resolver, queue }
    }

    /// Handler resolver.
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Backing queue, for consumers that dequeue and ack.
    pub const fn queue(&self) -> &Arc<AckQueue> {
        &self.queue
    }

    /// Run every handler registered for `E` concurrently and wait for all of them.
    ///
    /// Returns `false` when no handler is registered. Handler failures are logged
    /// and do not change the result.
    pub async fn publish<E>(&self, event: E, properties: Option<EventProperties>) -> bool
    where
        E: Any + Send + Sync,
    {
        let properties = EventProperties::for_event::<E>(properties);
        let report = self.run_handlers(&event, &properties).await;
        report.handled()
    }

    /// Wrap `event` in an envelope and store it in the ack-tracked queue.
    ///
    /// # Errors
    ///
    /// Same as [`AckQueue::enqueue`].
    pub fn enqueue<E>(
        &self,
        event: E,
        properties: Option<EventProperties>,
    ) -> Result<Option<EventId>, DeliveryError>
    where
        E: Any + Send + Sync,
    {
        self.queue.enqueue(event, properties)
    }

    /// Run the handlers for an envelope taken from the queue.
    ///
    /// Does not acknowledge; the caller decides based on the report.
    pub async fn dispatch<E>(&self, envelope: &Envelope<E>) -> DispatchReport
    where
        E: Any + Send + Sync,
    {
        self.run_handlers(envelope.data(), envelope.properties())
            .await
    }

    async fn run_handlers<E>(&self, event: &E, properties: &EventProperties) -> DispatchReport
    where
        E: Any + Send + Sync,
    {
        let handlers = self.resolver.resolve::<E>();
        if handlers.is_empty() {
            debug!(
                event_id = %properties.event_id,
                event_type = ?properties.event_type,
                "no handlers registered"
            );
            return DispatchReport::default();
        }

        let outcomes = join_all(
            handlers
                .iter()
                .map(|handler| handler.handle(event, properties)),
        )
        .await;

        let mut failed = 0;
        for err in outcomes.into_iter().filter_map(Result::err) {
            failed += 1;
            warn!(
                event_id = %properties.event_id,
                event_type = ?properties.event_type,
                error = %err,
                "event handler failed"
            );
        }

        DispatchReport {
            handlers: handlers.len(),
            failed,
        }
    }
}
