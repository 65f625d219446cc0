//! Periodic batching: buffer items and flush them to a sink in bounded batches.
//!
//! Producers call [`PeriodicBatcher::emit`], which only touches a [`BoundedQueue`].
//! A [`ScheduledTimer`] drives the tick: drain up to `batch_size_limit` items into
//! the staged batch, hand it to the sink, and re-arm the timer with the interval the
//! [`BatchStatus`] tracker computes. A full batch triggers another drain right away
//! instead of waiting for the next period.
//!
//! A failed flush keeps the staged batch for the next attempt and backs off. Once the
//! failure streak reaches the configured thresholds the staged batch, and later the
//! whole queue, are discarded so a dead sink cannot grow memory without bound.
//!
//! Sinks may be sync or async. The batcher owns a single-threaded tokio runtime that
//! the timer thread uses to drive `emit_batch_async`. The terminal flush on dispose
//! runs on a dedicated worker thread, so disposing from inside an async task is safe.
//! A sink that disposes its own batcher gets the final flush from the current tick.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use crate::config::BatchConfig;
use crate::core::backoff::BatchStatus;
use crate::core::bounded_queue::BoundedQueue;
use crate::core::timer::ScheduledTimer;
use crate::core::{AppResult, DeliveryError};
use crate::runtime::{run_on_worker, worker_runtime};

/// Destination for flushed batches.
///
/// Implement either [`BatchSink::emit_batch`] or [`BatchSink::emit_batch_async`],
/// not both; the async form delegates to the sync one by default. An `Err` (or a
/// panic) counts as a failed flush and feeds the backoff policy.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_delivery::core::{AppResult, BatchSink};
///
/// struct LogShipper { client: reqwest::Client }
///
/// #[async_trait]
/// impl BatchSink<String> for LogShipper {
///     async fn emit_batch_async(&self, batch: &[String]) -> AppResult<()> {
///         self.client.post("http://collector/logs").json(batch).send().await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait BatchSink<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    /// Flush a batch synchronously.
    fn emit_batch(&self, batch: &[T]) -> AppResult<()> {
        let _ = batch;
        Ok(())
    }

    /// Flush a batch asynchronously. Defaults to [`BatchSink::emit_batch`].
    async fn emit_batch_async(&self, batch: &[T]) -> AppResult<()> {
        self.emit_batch(batch)
    }

    /// Whether a dequeued item belongs in the batch. Excluded items are discarded.
    fn can_include(&self, item: &T) -> bool {
        let _ = item;
        true
    }

    /// Called on a tick that found nothing to flush.
    fn on_empty_batch(&self) {}

    /// Async form of [`BatchSink::on_empty_batch`], which it calls by default.
    async fn on_empty_batch_async(&self) {
        self.on_empty_batch();
    }
}

/// Adapts a closure into a synchronous [`BatchSink`].
pub struct FnSink<F>(pub F);

impl<T, F> BatchSink<T> for FnSink<F>
where
    T: Send + Sync + 'static,
    F: Fn(&[T]) -> AppResult<()> + Send + Sync + 'static,
{
    fn emit_batch(&self, batch: &[T]) -> AppResult<()> {
        (self.0)(batch)
    }
}

/// Snapshot of batcher counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatcherStats {
    /// Items waiting in the queue.
    pub queued: usize,
    /// Items staged in the pending batch.
    pub staged: usize,
    /// Items accepted by `emit`.
    pub emitted: u64,
    /// Items rejected because the queue was full.
    pub dropped_on_overflow: u64,
    /// Items discarded by `can_include`.
    pub filtered: u64,
    /// Successful flushes.
    pub batches_flushed: u64,
    /// Items delivered by successful flushes.
    pub items_flushed: u64,
    /// Flush attempts that failed.
    pub failed_flushes: u64,
    /// Items discarded by the failure thresholds.
    pub dropped_on_failure: u64,
    /// Current failure streak.
    pub consecutive_failures: u32,
}

#[derive(Debug, Default)]
struct BatchCounters {
    emitted: AtomicU64,
    filtered: AtomicU64,
    batches_flushed: AtomicU64,
    items_flushed: AtomicU64,
    failed_flushes: AtomicU64,
    dropped_on_failure: AtomicU64,
    consecutive_failures: AtomicU32,
    staged: AtomicUsize,
}

struct Lifecycle {
    started: bool,
    unloading: bool,
}

struct Staging<T> {
    waiting: Vec<T>,
    status: BatchStatus,
}

struct BatcherInner<T, S>
where
    T: Send + Sync + 'static,
    S: BatchSink<T>,
{
    sink: S,
    queue: BoundedQueue<T>,
    batch_size_limit: usize,
    lifecycle: Mutex<Lifecycle>,
    started: AtomicBool,
    unloading: AtomicBool,
    staging: Mutex<Staging<T>>,
    runtime: Mutex<Option<Runtime>>,
    timer: OnceLock<ScheduledTimer>,
    /// Set when `dispose` ran on the timer thread; the current tick does the final flush.
    deferred_flush: AtomicBool,
    counters: BatchCounters,
}

/// Timer-driven batching front end for a [`BatchSink`].
///
/// Dropping the batcher disposes it, which performs one final flush.
pub struct PeriodicBatcher<T, S>
where
    T: Send + Sync + 'static,
    S: BatchSink<T>,
{
    inner: Arc<BatcherInner<T, S>>,
}

impl<T, S> PeriodicBatcher<T, S>
where
    T: Send + Sync + 'static,
    S: BatchSink<T>,
{
    /// Create a batcher. Nothing is scheduled until the first `emit`.
    ///
    /// # Errors
    ///
    /// - `DeliveryError::InvalidConfig` if the configuration fails validation
    /// - `DeliveryError::Internal` if the timer thread or runtime cannot be created
    pub fn new(config: BatchConfig, sink: S) -> Result<Self, DeliveryError> {
        config.validate().map_err(DeliveryError::InvalidConfig)?;

        let queue = BoundedQueue::from_limit(config.queue_limit)?;
        let runtime = worker_runtime()?;

        let inner = Arc::new(BatcherInner {
            sink,
            queue,
            batch_size_limit: config.batch_size_limit,
            lifecycle: Mutex::new(Lifecycle {
                started: false,
                unloading: false,
            }),
            started: AtomicBool::new(false),
            unloading: AtomicBool::new(false),
            staging: Mutex::new(Staging {
                waiting: Vec::with_capacity(config.batch_size_limit.min(1024)),
                status: BatchStatus::new(config.period(), config.backoff.clone()),
            }),
            runtime: Mutex::new(Some(runtime)),
            timer: OnceLock::new(),
            deferred_flush: AtomicBool::new(false),
            counters: BatchCounters::default(),
        });

        let weak: Weak<BatcherInner<T, S>> = Arc::downgrade(&inner);
        let timer = ScheduledTimer::new("periodic-batcher", move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_tick();
            }
        })?;
        let _ = inner.timer.set(timer);

        info!(
            batch_size_limit = config.batch_size_limit,
            period_ms = config.period_ms,
            queue_limit = ?config.queue_limit,
            "PeriodicBatcher initialized"
        );

        Ok(Self { inner })
    }

    /// Queue an item for the next batch.
    ///
    /// The first emit schedules an immediate tick so the first batch goes out as soon
    /// as possible; later emits ride the running timer. Returns `false` when the queue
    /// was full and the item was dropped.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Disposed` once the batcher has been disposed.
    pub fn emit(&self, item: T) -> Result<bool, DeliveryError> {
        let inner = &self.inner;
        if inner.unloading.load(Ordering::Acquire) {
            return Err(DeliveryError::Disposed("PeriodicBatcher"));
        }

        if !inner.started.load(Ordering::Acquire) {
            let mut lifecycle = inner.lifecycle.lock();
            if lifecycle.unloading {
                return Err(DeliveryError::Disposed("PeriodicBatcher"));
            }
            if !lifecycle.started {
                let accepted = inner.enqueue(item);
                lifecycle.started = true;
                inner.started.store(true, Ordering::Release);
                if let Some(timer) = inner.timer.get() {
                    timer.start(Duration::ZERO)?;
                }
                return Ok(accepted);
            }
        }

        Ok(inner.enqueue(item))
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> BatcherStats {
        let c = &self.inner.counters;
        BatcherStats {
            queued: self.inner.queue.len(),
            staged: c.staged.load(Ordering::Relaxed),
            emitted: c.emitted.load(Ordering::Relaxed),
            dropped_on_overflow: self.inner.queue.dropped(),
            filtered: c.filtered.load(Ordering::Relaxed),
            batches_flushed: c.batches_flushed.load(Ordering::Relaxed),
            items_flushed: c.items_flushed.load(Ordering::Relaxed),
            failed_flushes: c.failed_flushes.load(Ordering::Relaxed),
            dropped_on_failure: c.dropped_on_failure.load(Ordering::Relaxed),
            consecutive_failures: c.consecutive_failures.load(Ordering::Relaxed),
        }
    }

    /// The sink this batcher flushes to.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.inner.sink
    }

    /// Stop the timer and flush whatever is staged or queued one last time.
    ///
    /// Blocks until the final flush completes; its errors are logged, not returned.
    /// When called from sink code running inside a tick, returns at once and the
    /// final flush runs as soon as that tick's sink call returns. Idempotent.
    pub fn dispose(&self) {
        BatcherInner::close_and_flush(&self.inner);
    }
}

impl<T, S> Drop for PeriodicBatcher<T, S>
where
    T: Send + Sync + 'static,
    S: BatchSink<T>,
{
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T, S> BatcherInner<T, S>
where
    T: Send + Sync + 'static,
    S: BatchSink<T>,
{
    fn enqueue(&self, item: T) -> bool {
        if self.queue.try_enqueue(item) {
            self.counters.emitted.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            debug!(limit = ?self.queue.limit(), "batch queue full, dropping item");
            false
        }
    }

    fn on_tick(&self) {
        {
            let runtime = self.runtime.lock();
            let Some(rt) = runtime.as_ref() else {
                return;
            };
            self.run_cycle(rt);
        }

        if self.deferred_flush.swap(false, Ordering::AcqRel) {
            self.final_flush_on_timer_thread();
            return;
        }

        let next = self.staging.lock().status.next_interval();
        let lifecycle = self.lifecycle.lock();
        if lifecycle.unloading {
            return;
        }
        if let Some(timer) = self.timer.get() {
            if let Err(e) = timer.start(next) {
                warn!(error = %e, "failed to reschedule batch timer");
            }
        }
    }

    /// One tick's worth of work: flush, then apply the drop thresholds.
    fn run_cycle(&self, rt: &Runtime) {
        let mut staging = self.staging.lock();

        // Any panic from sink code (filter, hooks, flush) is a failed tick, never a dead loop.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.flush_pending(&mut staging, rt)
        }))
        .unwrap_or_else(|_| Err(anyhow!("batch sink panicked")));

        if let Err(e) = outcome {
            staging.status.mark_failure();
            self.counters.failed_flushes.fetch_add(1, Ordering::Relaxed);
            error!(
                error = %e,
                failures = staging.status.failures(),
                staged = staging.waiting.len(),
                next_interval_ms = staging.status.next_interval().as_millis(),
                "failed to emit periodic batch"
            );
        }

        if staging.status.should_drop_batch() && !staging.waiting.is_empty() {
            let dropped = staging.waiting.len();
            staging.waiting.clear();
            self.counters
                .dropped_on_failure
                .fetch_add(dropped as u64, Ordering::Relaxed);
            warn!(dropped, "dropping staged batch after repeated failures");
        }

        if staging.status.should_drop_queue() {
            let dropped = self.queue.clear();
            if dropped > 0 {
                self.counters
                    .dropped_on_failure
                    .fetch_add(dropped as u64, Ordering::Relaxed);
                warn!(dropped, "dropping queued items after repeated failures");
            }
        }

        self.counters
            .staged
            .store(staging.waiting.len(), Ordering::Relaxed);
        self.counters
            .consecutive_failures
            .store(staging.status.failures(), Ordering::Relaxed);
    }

    fn flush_pending(&self, staging: &mut Staging<T>, rt: &Runtime) -> AppResult<()> {
        loop {
            while staging.waiting.len() < self.batch_size_limit {
                let Some(item) = self.queue.try_dequeue() else {
                    break;
                };
                if self.sink.can_include(&item) {
                    staging.waiting.push(item);
                } else {
                    self.counters.filtered.fetch_add(1, Ordering::Relaxed);
                }
            }

            if staging.waiting.is_empty() {
                rt.block_on(self.sink.on_empty_batch_async());
                return Ok(());
            }

            rt.block_on(self.sink.emit_batch_async(&staging.waiting))?;

            let flushed = staging.waiting.len();
            let batch_was_full = flushed >= self.batch_size_limit;
            staging.waiting.clear();
            staging.status.mark_success();

            self.counters.batches_flushed.fetch_add(1, Ordering::Relaxed);
            self.counters
                .items_flushed
                .fetch_add(flushed as u64, Ordering::Relaxed);
            debug!(items = flushed, batch_was_full, "periodic batch emitted");

            if !batch_was_full {
                return Ok(());
            }
        }
    }

    fn close_and_flush(this: &Arc<Self>) {
        let was_started = {
            let mut lifecycle = this.lifecycle.lock();
            if lifecycle.unloading {
                return;
            }
            lifecycle.unloading = true;
            this.unloading.store(true, Ordering::Release);
            lifecycle.started
        };

        if let Some(timer) = this.timer.get() {
            timer.dispose();
            if timer.is_timer_thread() {
                // Called from sink code inside a tick: that tick holds the runtime and
                // runs the final flush once the sink returns.
                this.deferred_flush.store(true, Ordering::Release);
                debug!("dispose requested from a tick, final flush deferred");
                return;
            }
        }

        let Some(runtime) = this.runtime.lock().take() else {
            return;
        };
        if !was_started {
            runtime.shutdown_background();
            info!("PeriodicBatcher disposed before first emit");
            return;
        }

        let inner = Arc::clone(this);
        let flushed = run_on_worker("batcher-final-flush", move || {
            inner.run_cycle(&runtime);
            drop(runtime);
        });
        if let Err(e) = flushed {
            error!(error = %e, "final batch flush did not complete");
        }
        info!("PeriodicBatcher disposed");
    }

    fn final_flush_on_timer_thread(&self) {
        let Some(runtime) = self.runtime.lock().take() else {
            return;
        };
        self.run_cycle(&runtime);
        drop(runtime);
        info!("PeriodicBatcher disposed from its own tick");
    }
}

impl<T, S> Drop for BatcherInner<T, S>
where
    T: Send + Sync + 'static,
    S: BatchSink<T>,
{
    fn drop(&mut self) {
        // Never block here: the last reference may be released inside an async task.
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}
