//! Event handler traits.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{AppResult, EventProperties};

/// Processes events of type `E`.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_delivery::core::{AppResult, EventProperties};
/// use prometheus_delivery::event::EventHandler;
///
/// struct OrderCreated { order_id: u64 }
/// struct AuditHandler;
///
/// #[async_trait]
/// impl EventHandler<OrderCreated> for AuditHandler {
///     async fn handle(&self, event: &OrderCreated, props: &EventProperties) -> AppResult<()> {
///         tracing::info!(order_id = event.order_id, event_id = %props.event_id, "order created");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler<E>: Send + Sync + 'static
where
    E: Send + Sync + 'static,
{
    /// Handle one event. An `Err` is logged by the bus and does not affect other handlers.
    async fn handle(&self, event: &E, properties: &EventProperties) -> AppResult<()>;
}

/// Wraps a closure as an [`EventHandler`].
pub struct FnEventHandler<E, F> {
    f: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnEventHandler<E, F>
where
    E: Send + Sync + 'static,
    F: Fn(&E, &EventProperties) -> AppResult<()> + Send + Sync + 'static,
{
    /// Wrap `f`.
    pub const fn new(f: F) -> Self {
        Self {
            f,
            _event: PhantomData,
        }
    }

    /// Wrap `f` and erase it into a shareable handler.
    pub fn shared(f: F) -> Arc<dyn EventHandler<E>> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<E, F> EventHandler<E> for FnEventHandler<E, F>
where
    E: Send + Sync + 'static,
    F: Fn(&E, &EventProperties) -> AppResult<()> + Send + Sync + 'static,
{
    async fn handle(&self, event: &E, properties: &EventProperties) -> AppResult<()> {
        (self.f)(event, properties)
    }
}

/// Supplies the handlers registered for an event type.
pub trait HandlerResolver: Send + Sync + 'static {
    /// Handlers for events of type `E`, possibly none.
    fn resolve<E>(&self) -> Vec<Arc<dyn EventHandler<E>>>
    where
        E: Send + Sync + 'static;
}

impl<R: HandlerResolver> HandlerResolver for Arc<R> {
    fn resolve<E>(&self) -> Vec<Arc<dyn EventHandler<E>>>
    where
        E: Send + Sync + 'static,
    {
        (**self).resolve::<E>()
    }
}
