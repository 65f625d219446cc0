//! Single-shot, restartable timer whose callback never overlaps itself.
//!
//! Each timer owns one named OS thread. The thread sleeps on a `Condvar` until the
//! armed deadline passes, flips the state to `Running`, releases the lock and invokes
//! the callback. A `start` issued while the callback runs (including from inside the
//! callback) only records the next deadline; the thread picks it up once the current
//! invocation returns, so firings are serialized and none are lost.
//!
//! ```text
//! Idle --start--> Armed --deadline--> Running --callback returns--> Armed | Idle
//!   \______________\_____________________\________dispose________> Disposed
//! ```
//!
//! `dispose` called from any other thread blocks until a running callback finishes and
//! then joins the timer thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, warn};

use crate::core::DeliveryError;

/// Observable lifecycle of a [`ScheduledTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not armed; no callback running.
    Idle,
    /// A deadline is set and the callback is not running.
    Armed,
    /// The callback is executing.
    Running,
    /// Disposed; no further firings.
    Disposed,
}

struct TimerInner {
    state: TimerState,
    /// Next firing. May be set while `Running` when the callback re-arms.
    due: Option<Instant>,
    /// Set as soon as disposal begins, before a running callback has finished.
    disposing: bool,
}

struct TimerShared {
    inner: Mutex<TimerInner>,
    cvar: Condvar,
}

/// Restartable one-shot timer with a non-reentrant callback.
pub struct ScheduledTimer {
    name: String,
    shared: Arc<TimerShared>,
    thread_id: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledTimer {
    /// Create an idle timer that invokes `callback` each time it fires.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Internal` if the timer thread cannot be spawned.
    pub fn new<F>(name: impl Into<String>, callback: F) -> Result<Self, DeliveryError>
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let shared = Arc::new(TimerShared {
            inner: Mutex::new(TimerInner {
                state: TimerState::Idle,
                due: None,
                disposing: false,
            }),
            cvar: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(format!("timer-{name}"))
            .spawn(move || run_timer_loop(&thread_name, &thread_shared, callback))
            .map_err(|e| DeliveryError::Internal(format!("failed to spawn timer thread: {e}")))?;

        debug!(timer = %name, "timer created");

        Ok(Self {
            name,
            shared,
            thread_id: handle.thread().id(),
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Arm (or re-arm) the timer to fire once after `interval`.
    ///
    /// A zero interval fires as soon as the timer thread is scheduled.
    ///
    /// # Errors
    ///
    /// - `DeliveryError::InvalidArgument` if `interval` overflows the monotonic clock
    /// - `DeliveryError::Disposed` if the timer has been disposed
    pub fn start(&self, interval: Duration) -> Result<(), DeliveryError> {
        let due = Instant::now().checked_add(interval).ok_or_else(|| {
            DeliveryError::InvalidArgument(format!("timer interval {interval:?} is out of range"))
        })?;

        let mut inner = self.shared.inner.lock();
        if inner.disposing {
            return Err(DeliveryError::Disposed("ScheduledTimer"));
        }
        inner.due = Some(due);
        if inner.state == TimerState::Idle {
            inner.state = TimerState::Armed;
        }
        drop(inner);
        self.shared.cvar.notify_all();
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TimerState {
        self.shared.inner.lock().state
    }

    /// Whether the caller is running on this timer's thread, i.e. inside its callback.
    #[must_use]
    pub fn is_timer_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Timer name used for its thread and log fields.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancel future firings, wait for an in-flight callback and stop the timer thread.
    ///
    /// Idempotent. When called from inside the callback it cannot wait for itself:
    /// the timer is marked disposed and the thread exits once the callback returns.
    pub fn dispose(&self) {
        let on_timer_thread = self.is_timer_thread();
        {
            let mut inner = self.shared.inner.lock();
            if inner.disposing {
                return;
            }
            inner.disposing = true;
            inner.due = None;
            self.shared.cvar.notify_all();

            if !on_timer_thread {
                while inner.state == TimerState::Running {
                    self.shared.cvar.wait(&mut inner);
                }
                inner.state = TimerState::Disposed;
            }
        }

        if on_timer_thread {
            debug!(timer = %self.name, "timer disposed from its own callback");
            return;
        }

        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                warn!(timer = %self.name, "timer thread panicked");
            }
        }
        debug!(timer = %self.name, "timer disposed");
    }
}

impl Drop for ScheduledTimer {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn run_timer_loop<F>(name: &str, shared: &TimerShared, mut callback: F)
where
    F: FnMut(),
{
    let mut inner = shared.inner.lock();
    loop {
        if inner.disposing {
            break;
        }
        let Some(due) = inner.due else {
            shared.cvar.wait(&mut inner);
            continue;
        };
        if Instant::now() < due {
            // Re-check on wake: `start` may have moved the deadline.
            shared.cvar.wait_until(&mut inner, due);
            continue;
        }

        inner.due = None;
        inner.state = TimerState::Running;
        let outcome = MutexGuard::unlocked(&mut inner, || {
            panic::catch_unwind(AssertUnwindSafe(|| callback()))
        });
        if outcome.is_err() {
            error!(timer = %name, "timer callback panicked");
        }

        inner.state = if inner.disposing {
            TimerState::Disposed
        } else if inner.due.is_some() {
            TimerState::Armed
        } else {
            TimerState::Idle
        };
        shared.cvar.notify_all();
    }
    inner.state = TimerState::Disposed;
    shared.cvar.notify_all();
}
