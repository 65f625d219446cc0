//! Event identity, properties and envelopes.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::clock::now_ms;

/// Unique identifier assigned to every event at publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EventId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Metadata travelling with an event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventProperties {
    /// Unique event identifier.
    pub event_id: EventId,
    /// Creation time in milliseconds since epoch.
    pub event_at_ms: u128,
    /// Optional distributed trace identifier.
    #[serde(default)]
    pub trace_id: Option<String>,
    /// Optional name of the publishing component.
    #[serde(default)]
    pub event_source: Option<String>,
    /// Payload type name; filled in at publish time when absent.
    #[serde(default)]
    pub event_type: Option<String>,
    /// Free-form headers.
    #[serde(default)]
    pub headers: HashMap<String, serde_json::Value>,
}

impl EventProperties {
    /// Properties with a fresh id stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            event_id: EventId::new(),
            event_at_ms: now_ms(),
            trace_id: None,
            event_source: None,
            event_type: None,
            headers: HashMap::new(),
        }
    }

    /// Set the trace identifier.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Set the event source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.event_source = Some(source.into());
        self
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Complete caller-supplied properties (or create new ones) for a payload of type `E`.
    pub(crate) fn for_event<E: ?Sized>(properties: Option<Self>) -> Self {
        let mut properties = properties.unwrap_or_default();
        if properties.event_at_ms == 0 {
            properties.event_at_ms = now_ms();
        }
        if properties.event_type.is_none() {
            properties.event_type = Some(type_name::<E>().to_string());
        }
        properties
    }
}

impl Default for EventProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed event payload together with its properties.
#[derive(Debug)]
pub struct Envelope<E> {
    properties: EventProperties,
    data: Arc<E>,
}

impl<E> Envelope<E> {
    /// Event properties.
    #[must_use]
    pub const fn properties(&self) -> &EventProperties {
        &self.properties
    }

    /// Event identifier, used for acknowledgement.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.properties.event_id
    }

    /// Payload.
    #[must_use]
    pub fn data(&self) -> &E {
        &self.data
    }

    /// Shared handle to the payload.
    #[must_use]
    pub fn data_arc(&self) -> Arc<E> {
        Arc::clone(&self.data)
    }
}

impl<E> Clone for Envelope<E> {
    fn clone(&self) -> Self {
        Self {
            properties: self.properties.clone(),
            data: Arc::clone(&self.data),
        }
    }
}

/// Type-erased envelope as stored by the queue.
#[derive(Clone)]
pub struct RawEnvelope {
    properties: EventProperties,
    data: Arc<dyn Any + Send + Sync>,
}

impl RawEnvelope {
    pub(crate) fn new<E>(data: E, properties: EventProperties) -> Self
    where
        E: Any + Send + Sync,
    {
        Self {
            properties,
            data: Arc::new(data),
        }
    }

    /// Event properties.
    #[must_use]
    pub const fn properties(&self) -> &EventProperties {
        &self.properties
    }

    /// Event identifier, used for acknowledgement.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.properties.event_id
    }

    /// Whether the payload is an `E`.
    #[must_use]
    pub fn is<E: Any>(&self) -> bool {
        (*self.data).type_id() == TypeId::of::<E>()
    }

    /// Convert into a typed envelope, handing `self` back if the payload is not an `E`.
    ///
    /// # Errors
    ///
    /// Returns the original envelope when the payload type does not match.
    pub fn downcast<E>(self) -> Result<Envelope<E>, Self>
    where
        E: Any + Send + Sync,
    {
        match Arc::clone(&self.data).downcast::<E>() {
            Ok(data) => Ok(Envelope {
                properties: self.properties,
                data,
            }),
            Err(_) => Err(self),
        }
    }
}

impl fmt::Debug for RawEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEnvelope")
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}
