//! Telemetry helpers for structured logging.

/// Install a default env-filtered fmt subscriber unless one is already set.
///
/// Timers, batchers and queues log through `tracing`; callers that bring their own
/// subscriber can skip this.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
