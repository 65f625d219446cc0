//! Error types for delivery components.

use thiserror::Error;

/// Errors produced by timers, queues, batchers and the event bus.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// An argument was outside the accepted range (interval, limit, size).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The component has been disposed and no longer accepts work.
    #[error("object disposed: {0}")]
    Disposed(&'static str),
    /// Thread, runtime or other internal failure with context.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Application-facing result used by sinks and handlers.
pub type AppResult<T> = Result<T, anyhow::Error>;
