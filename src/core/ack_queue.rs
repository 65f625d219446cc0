//! Acknowledgement-tracked in-memory queue with timeout-based redelivery.
//!
//! Messages move `available -> in-flight` on dequeue and leave the queue only when
//! acknowledged. In-flight messages whose deadline (`dequeued_at + ack_timeout`) has
//! passed go back to the tail of the available buffer on `requeue_unacked`, which
//! can be called on demand or driven by a background [`ScheduledTimer`].
//!
//! Delivery is at-least-once: an ack that arrives after its record already expired
//! refers to an id that is no longer in flight and is ignored, so the message is
//! delivered again. Consumers must be idempotent.

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use futures::stream::{self, Stream};
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::AckQueueConfig;
use crate::core::envelope::{Envelope, EventId, EventProperties, RawEnvelope};
use crate::core::timer::ScheduledTimer;
use crate::core::DeliveryError;

/// How often [`AckQueue::read_all`] re-checks an empty queue.
pub const READ_ALL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Snapshot of queue occupancy and lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AckQueueStats {
    /// Messages waiting to be dequeued.
    pub available: usize,
    /// Messages dequeued and not yet acknowledged.
    pub in_flight: usize,
    /// Messages accepted by `enqueue`.
    pub enqueued: u64,
    /// Messages rejected because the available buffer was full.
    pub dropped: u64,
    /// Successful acknowledgements.
    pub acked: u64,
    /// Expired in-flight messages returned to the available buffer.
    pub requeued: u64,
}

#[derive(Debug, Default)]
struct AckCounters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    acked: AtomicU64,
    requeued: AtomicU64,
}

struct InFlightRecord {
    envelope: RawEnvelope,
    dequeued_at: Instant,
    deadline: Instant,
}

#[derive(Default)]
struct AckState {
    available: VecDeque<RawEnvelope>,
    in_flight: HashMap<EventId, InFlightRecord>,
    /// Ids present in either `available` or `in_flight`.
    present: HashSet<EventId>,
}

struct AckInner {
    config: AckQueueConfig,
    state: Mutex<AckState>,
    counters: AckCounters,
    requeue_timer: OnceLock<ScheduledTimer>,
    disposed: AtomicBool,
}

/// At-least-once queue of typed events.
///
/// Share it between producers and consumers behind an `Arc`. Dropping the queue
/// disposes the background requeue loop.
pub struct AckQueue {
    inner: Arc<AckInner>,
}

impl AckQueue {
    /// Create a queue; starts the requeue loop when `auto_requeue` is set.
    ///
    /// # Errors
    ///
    /// - `DeliveryError::InvalidConfig` if the configuration fails validation
    /// - `DeliveryError::Internal` if the requeue timer thread cannot be spawned
    pub fn new(config: AckQueueConfig) -> Result<Self, DeliveryError> {
        config.validate().map_err(DeliveryError::InvalidConfig)?;

        let inner = Arc::new(AckInner {
            config,
            state: Mutex::new(AckState::default()),
            counters: AckCounters::default(),
            requeue_timer: OnceLock::new(),
            disposed: AtomicBool::new(false),
        });

        if inner.config.auto_requeue {
            let weak: Weak<AckInner> = Arc::downgrade(&inner);
            let timer = ScheduledTimer::new("ack-requeue", move || {
                if let Some(inner) = weak.upgrade() {
                    inner.requeue_unacked();
                    inner.schedule_requeue();
                }
            })?;
            let _ = inner.requeue_timer.set(timer);
            inner.schedule_requeue();
        }

        info!(
            auto_requeue = inner.config.auto_requeue,
            ack_timeout_ms = inner.config.ack_timeout_ms,
            queue_limit = ?inner.config.queue_limit,
            "AckQueue initialized"
        );

        Ok(Self { inner })
    }

    /// Wrap `event` in an envelope and append it to the available buffer.
    ///
    /// Missing properties are generated (fresh id, current time, type name).
    /// Returns `Ok(None)` when the buffer is full and the event was dropped.
    ///
    /// # Errors
    ///
    /// - `DeliveryError::Disposed` if the queue has been disposed
    /// - `DeliveryError::InvalidArgument` if the supplied id is already queued or in flight
    pub fn enqueue<E>(
        &self,
        event: E,
        properties: Option<EventProperties>,
    ) -> Result<Option<EventId>, DeliveryError>
    where
        E: Any + Send + Sync,
    {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(DeliveryError::Disposed("AckQueue"));
        }

        let properties = EventProperties::for_event::<E>(properties);
        let event_id = properties.event_id;

        let mut state = self.inner.state.lock();
        if state.present.contains(&event_id) {
            return Err(DeliveryError::InvalidArgument(format!(
                "event {event_id} is already tracked by this queue"
            )));
        }
        if let Some(limit) = self.inner.config.queue_limit {
            if state.available.len() >= limit {
                drop(state);
                self.inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(event_id = %event_id, limit, "ack queue full, dropping event");
                return Ok(None);
            }
        }
        state.present.insert(event_id);
        state.available.push_back(RawEnvelope::new(event, properties));
        drop(state);

        self.inner.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        debug!(event_id = %event_id, "event enqueued");
        Ok(Some(event_id))
    }

    /// Take the oldest available event whose payload is an `E` and mark it in flight.
    ///
    /// Returns `None` when no such event is available.
    pub fn dequeue<E>(&self) -> Option<Envelope<E>>
    where
        E: Any + Send + Sync,
    {
        let mut state = self.inner.state.lock();
        let idx = state.available.iter().position(RawEnvelope::is::<E>)?;
        let raw = state.available.remove(idx)?;
        match raw.clone().downcast::<E>() {
            Ok(typed) => {
                self.inner.track(&mut state, raw);
                Some(typed)
            }
            Err(raw) => {
                state.available.insert(idx, raw);
                None
            }
        }
    }

    /// Take the oldest available event of any type and mark it in flight.
    pub fn dequeue_any(&self) -> Option<RawEnvelope> {
        let mut state = self.inner.state.lock();
        let raw = state.available.pop_front()?;
        self.inner.track(&mut state, raw.clone());
        Some(raw)
    }

    /// Acknowledge an in-flight event, removing it permanently.
    ///
    /// Returns `false` (and does nothing) if the id is not in flight: already acked,
    /// expired and requeued, or never seen.
    pub fn ack(&self, event_id: &EventId) -> bool {
        let mut state = self.inner.state.lock();
        if state.in_flight.remove(event_id).is_none() {
            drop(state);
            debug!(event_id = %event_id, "ack for unknown event ignored");
            return false;
        }
        state.present.remove(event_id);
        drop(state);

        self.inner.counters.acked.fetch_add(1, Ordering::Relaxed);
        debug!(event_id = %event_id, "event acknowledged");
        true
    }

    /// Move every expired in-flight event back to the tail of the available buffer.
    ///
    /// Works regardless of `auto_requeue`. Returns the number of events requeued.
    pub fn requeue_unacked(&self) -> usize {
        self.inner.requeue_unacked()
    }

    /// Deadline of an in-flight event, `None` if it is not in flight.
    #[must_use]
    pub fn in_flight_deadline(&self, event_id: &EventId) -> Option<Instant> {
        self.inner
            .state
            .lock()
            .in_flight
            .get(event_id)
            .map(|record| record.deadline)
    }

    /// Async form of [`AckQueue::enqueue`].
    ///
    /// # Errors
    ///
    /// Same as [`AckQueue::enqueue`].
    pub async fn enqueue_async<E>(
        &self,
        event: E,
        properties: Option<EventProperties>,
    ) -> Result<Option<EventId>, DeliveryError>
    where
        E: Any + Send + Sync,
    {
        self.enqueue(event, properties)
    }

    /// Async form of [`AckQueue::dequeue`].
    pub async fn dequeue_async<E>(&self) -> Option<Envelope<E>>
    where
        E: Any + Send + Sync,
    {
        self.dequeue::<E>()
    }

    /// Async form of [`AckQueue::ack`].
    pub async fn ack_async(&self, event_id: &EventId) -> bool {
        self.ack(event_id)
    }

    /// Stream every event as it becomes available, marking each one in flight.
    ///
    /// Polls the available buffer every [`READ_ALL_POLL_INTERVAL`] while it is empty.
    /// The stream ends once `cancel` resolves; it keeps running across `dispose`, since
    /// events already queued can still be drained. Consumers ack as usual.
    pub fn read_all<'a, C>(&'a self, cancel: C) -> impl Stream<Item = RawEnvelope> + Send + 'a
    where
        C: Future<Output = ()> + Send + 'a,
    {
        stream::unfold((self, Box::pin(cancel)), |(queue, mut cancel)| async move {
            loop {
                if (&mut cancel).now_or_never().is_some() {
                    debug!("read_all cancelled");
                    return None;
                }
                if let Some(envelope) = queue.dequeue_any() {
                    return Some((envelope, (queue, cancel)));
                }
                tokio::select! {
                    () = &mut cancel => {
                        debug!("read_all cancelled");
                        return None;
                    }
                    () = tokio::time::sleep(READ_ALL_POLL_INTERVAL) => {}
                }
            }
        })
    }

    /// Current occupancy and counters.
    #[must_use]
    pub fn stats(&self) -> AckQueueStats {
        let (available, in_flight) = {
            let state = self.inner.state.lock();
            (state.available.len(), state.in_flight.len())
        };
        let counters = &self.inner.counters;
        AckQueueStats {
            available,
            in_flight,
            enqueued: counters.enqueued.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
            acked: counters.acked.load(Ordering::Relaxed),
            requeued: counters.requeued.load(Ordering::Relaxed),
        }
    }

    /// Queue configuration.
    #[must_use]
    pub fn config(&self) -> &AckQueueConfig {
        &self.inner.config
    }

    /// Stop the requeue loop and refuse further enqueues.
    ///
    /// Blocks until a running requeue pass finishes. Already queued and in-flight
    /// events can still be dequeued, acknowledged and requeued manually.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(timer) = self.inner.requeue_timer.get() {
            timer.dispose();
        }
        info!("AckQueue disposed");
    }
}

impl Drop for AckQueue {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl AckInner {
    fn track(&self, state: &mut AckState, envelope: RawEnvelope) {
        let dequeued_at = Instant::now();
        let deadline = dequeued_at + self.config.ack_timeout();
        let event_id = envelope.event_id();
        state.in_flight.insert(
            event_id,
            InFlightRecord {
                envelope,
                dequeued_at,
                deadline,
            },
        );
        debug!(event_id = %event_id, "event dequeued, awaiting ack");
    }

    fn requeue_unacked(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();

        let mut expired: Vec<(Instant, EventId)> = state
            .in_flight
            .iter()
            .filter(|(_, record)| record.deadline <= now)
            .map(|(id, record)| (record.deadline, *id))
            .collect();
        // Oldest deadline first so redelivery keeps the original relative order.
        expired.sort_unstable();

        for (_, event_id) in &expired {
            if let Some(record) = state.in_flight.remove(event_id) {
                debug!(
                    event_id = %event_id,
                    held_ms = now.duration_since(record.dequeued_at).as_millis(),
                    "ack timeout elapsed, requeueing"
                );
                state.available.push_back(record.envelope);
            }
        }
        drop(state);

        let count = expired.len();
        if count > 0 {
            self.counters
                .requeued
                .fetch_add(count as u64, Ordering::Relaxed);
            info!(count, "requeued unacknowledged events");
        }
        count
    }

    fn schedule_requeue(&self) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        if let Some(timer) = self.requeue_timer.get() {
            if let Err(e) = timer.start(self.config.requeue_period()) {
                debug!(error = %e, "requeue loop not rescheduled");
            }
        }
    }
}
