//! In-memory handler registry keyed by event type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::core::{AppResult, EventProperties};
use crate::event::{EventHandler, FnEventHandler, HandlerResolver};

type HandlerList<E> = Vec<Arc<dyn EventHandler<E>>>;

/// Subscription table for development, tests, and single-process deployments.
#[derive(Default)]
pub struct InMemoryHandlerRegistry {
    handlers: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl InMemoryHandlerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of type `E`.
    pub fn subscribe<E>(&self, handler: Arc<dyn EventHandler<E>>)
    where
        E: Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write();
        let entry = handlers
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(HandlerList::<E>::new()));
        if let Some(list) = entry.downcast_mut::<HandlerList<E>>() {
            list.push(handler);
            debug!(
                event_type = std::any::type_name::<E>(),
                handlers = list.len(),
                "handler subscribed"
            );
        }
    }

    /// Register a closure for events of type `E`.
    pub fn subscribe_fn<E, F>(&self, f: F)
    where
        E: Send + Sync + 'static,
        F: Fn(&E, &EventProperties) -> AppResult<()> + Send + Sync + 'static,
    {
        self.subscribe(FnEventHandler::shared(f));
    }

    /// Remove every handler for `E`. Returns how many were removed.
    pub fn unsubscribe_all<E>(&self) -> usize
    where
        E: Send + Sync + 'static,
    {
        self.handlers
            .write()
            .remove(&TypeId::of::<E>())
            .and_then(|entry| entry.downcast::<HandlerList<E>>().ok())
            .map_or(0, |list| list.len())
    }

    /// Number of handlers registered for `E`.
    #[must_use]
    pub fn handler_count<E>(&self) -> usize
    where
        E: Send + Sync + 'static,
    {
        self.handlers
            .read()
            .get(&TypeId::of::<E>())
            .and_then(|entry| entry.downcast_ref::<HandlerList<E>>())
            .map_or(0, Vec::len)
    }
}

impl HandlerResolver for InMemoryHandlerRegistry {
    fn resolve<E>(&self) -> Vec<Arc<dyn EventHandler<E>>>
    where
        E: Send + Sync + 'static,
    {
        self.handlers
            .read()
            .get(&TypeId::of::<E>())
            .and_then(|entry| entry.downcast_ref::<HandlerList<E>>())
            .cloned()
            .unwrap_or_default()
    }
}
