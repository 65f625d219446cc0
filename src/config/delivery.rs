//! Queue, batching and backoff configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Ack-tracked queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AckQueueConfig {
    /// Run a background loop that requeues expired in-flight messages.
    pub auto_requeue: bool,
    /// Milliseconds a dequeued message may stay unacknowledged.
    pub ack_timeout_ms: u64,
    /// Interval of the background requeue loop in milliseconds.
    pub requeue_period_ms: u64,
    /// Maximum number of available messages, `None` for unbounded.
    pub queue_limit: Option<usize>,
}

impl Default for AckQueueConfig {
    fn default() -> Self {
        Self {
            auto_requeue: false,
            ack_timeout_ms: 60_000,
            requeue_period_ms: 30_000,
            queue_limit: None,
        }
    }
}

impl AckQueueConfig {
    /// Defaults: manual requeue, one minute ack timeout, unbounded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the acknowledgement timeout.
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout_ms = duration_to_ms(timeout);
        self
    }

    /// Enable the background requeue loop firing every `period`.
    #[must_use]
    pub fn with_auto_requeue(mut self, period: Duration) -> Self {
        self.auto_requeue = true;
        self.requeue_period_ms = duration_to_ms(period);
        self
    }

    /// Cap the number of available messages.
    #[must_use]
    pub const fn with_queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = Some(limit);
        self
    }

    /// Acknowledgement timeout as a `Duration`.
    #[must_use]
    pub const fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Requeue loop interval as a `Duration`.
    #[must_use]
    pub const fn requeue_period(&self) -> Duration {
        Duration::from_millis(self.requeue_period_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.ack_timeout_ms == 0 {
            return Err("ack_timeout_ms must be greater than 0".into());
        }
        if self.auto_requeue && self.requeue_period_ms == 0 {
            return Err("requeue_period_ms must be greater than 0 when auto_requeue is on".into());
        }
        if self.queue_limit == Some(0) {
            return Err("queue_limit must be greater than 0".into());
        }
        Ok(())
    }
}

/// Backoff and drop thresholds applied after failed batch flushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Floor for the backed-off interval in milliseconds.
    pub minimum_backoff_ms: u64,
    /// Ceiling for the backed-off interval in milliseconds.
    pub maximum_backoff_ms: u64,
    /// Consecutive failures after which the staged batch is discarded.
    pub failures_before_dropping_batch: u32,
    /// Consecutive failures after which the whole queue is discarded.
    pub failures_before_dropping_queue: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            minimum_backoff_ms: 5_000,
            maximum_backoff_ms: 600_000,
            failures_before_dropping_batch: 8,
            failures_before_dropping_queue: 10,
        }
    }
}

impl BackoffConfig {
    /// Minimum backoff as a `Duration`.
    #[must_use]
    pub const fn minimum_backoff(&self) -> Duration {
        Duration::from_millis(self.minimum_backoff_ms)
    }

    /// Maximum backoff as a `Duration`.
    #[must_use]
    pub const fn maximum_backoff(&self) -> Duration {
        Duration::from_millis(self.maximum_backoff_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.minimum_backoff_ms > self.maximum_backoff_ms {
            return Err("minimum_backoff_ms must not exceed maximum_backoff_ms".into());
        }
        if self.failures_before_dropping_batch == 0 {
            return Err("failures_before_dropping_batch must be greater than 0".into());
        }
        if self.failures_before_dropping_queue < self.failures_before_dropping_batch {
            return Err(
                "failures_before_dropping_queue must be at least failures_before_dropping_batch"
                    .into(),
            );
        }
        Ok(())
    }
}

/// Periodic batching configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum items per flushed batch.
    pub batch_size_limit: usize,
    /// Base flush interval in milliseconds.
    pub period_ms: u64,
    /// Maximum queued items, `None` for unbounded.
    pub queue_limit: Option<usize>,
    /// Failure backoff policy.
    pub backoff: BackoffConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size_limit: 1000,
            period_ms: 2_000,
            queue_limit: None,
            backoff: BackoffConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Create a config with the given batch size and period.
    #[must_use]
    pub fn new(batch_size_limit: usize, period: Duration) -> Self {
        Self {
            batch_size_limit,
            period_ms: duration_to_ms(period),
            ..Self::default()
        }
    }

    /// Cap the number of queued items.
    #[must_use]
    pub const fn with_queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = Some(limit);
        self
    }

    /// Replace the backoff policy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Base flush interval as a `Duration`.
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size_limit == 0 {
            return Err("batch_size_limit must be greater than 0".into());
        }
        if self.period_ms == 0 {
            return Err("period_ms must be greater than 0".into());
        }
        if self.queue_limit == Some(0) {
            return Err("queue_limit must be greater than 0".into());
        }
        self.backoff
            .validate()
            .map_err(|e| format!("backoff invalid: {e}"))
    }
}

/// Root configuration for the delivery core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Ack-tracked queue settings.
    pub queue: AckQueueConfig,
    /// Periodic batching settings.
    pub batching: BatchConfig,
}

impl DeliveryConfig {
    /// Validate both sections.
    ///
    /// # Errors
    ///
    /// Returns a description prefixed with the failing section.
    pub fn validate(&self) -> Result<(), String> {
        self.queue
            .validate()
            .map_err(|e| format!("queue invalid: {e}"))?;
        self.batching
            .validate()
            .map_err(|e| format!("batching invalid: {e}"))
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `DELIVERY_*` environment variables over the defaults.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `DELIVERY_AUTO_REQUEUE` | `queue.auto_requeue` |
    /// | `DELIVERY_ACK_TIMEOUT_MS` | `queue.ack_timeout_ms` |
    /// | `DELIVERY_REQUEUE_PERIOD_MS` | `queue.requeue_period_ms` |
    /// | `DELIVERY_QUEUE_LIMIT` | `queue.queue_limit` |
    /// | `DELIVERY_BATCH_SIZE_LIMIT` | `batching.batch_size_limit` |
    /// | `DELIVERY_BATCH_PERIOD_MS` | `batching.period_ms` |
    /// | `DELIVERY_BATCH_QUEUE_LIMIT` | `batching.queue_limit` |
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or a validation message.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Some(v) = env_var("DELIVERY_AUTO_REQUEUE")? {
            cfg.queue.auto_requeue = v;
        }
        if let Some(v) = env_var("DELIVERY_ACK_TIMEOUT_MS")? {
            cfg.queue.ack_timeout_ms = v;
        }
        if let Some(v) = env_var("DELIVERY_REQUEUE_PERIOD_MS")? {
            cfg.queue.requeue_period_ms = v;
        }
        if let Some(v) = env_var("DELIVERY_QUEUE_LIMIT")? {
            cfg.queue.queue_limit = Some(v);
        }
        if let Some(v) = env_var("DELIVERY_BATCH_SIZE_LIMIT")? {
            cfg.batching.batch_size_limit = v;
        }
        if let Some(v) = env_var("DELIVERY_BATCH_PERIOD_MS")? {
            cfg.batching.period_ms = v;
        }
        if let Some(v) = env_var("DELIVERY_BATCH_QUEUE_LIMIT")? {
            cfg.batching.queue_limit = Some(v);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_var<T>(key: &str) -> Result<Option<T>, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{key}: {e}")),
        Err(_) => Ok(None),
    }
}

fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
