//! Dedicated worker threads and runtimes.
//!
//! Batch sinks may be async, but ticks run on plain timer threads. Each batcher owns a
//! single-threaded tokio runtime that its timer thread drives with `block_on`. Final
//! flushes run on a fresh worker thread so the disposing caller's own executor (if
//! any) never has to drive, or nest inside, the batcher's runtime.

use std::thread;

use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::core::DeliveryError;

/// Build the single-threaded runtime used to drive async sinks.
///
/// # Errors
///
/// Returns `DeliveryError::Internal` if the runtime cannot be created.
pub fn worker_runtime() -> Result<Runtime, DeliveryError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DeliveryError::Internal(format!("failed to build worker runtime: {e}")))
}

/// Run `work` on a new named thread and block until it returns.
///
/// The closure starts with no ambient runtime context, so it may call
/// `Runtime::block_on` even when the caller is itself inside an async task.
///
/// # Errors
///
/// Returns `DeliveryError::Internal` if the thread cannot be spawned or `work` panics.
pub fn run_on_worker<F, R>(name: &str, work: F) -> Result<R, DeliveryError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(work)
        .map_err(|e| DeliveryError::Internal(format!("failed to spawn {name}: {e}")))?;
    debug!(worker = name, "worker thread started");

    handle
        .join()
        .map_err(|_| DeliveryError::Internal(format!("{name} panicked")))
}
