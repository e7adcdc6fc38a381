//! Blocking adapter over callback-style asynchronous operations.
//!
//! # Deadlock
//!
//! The executor running the operation must not be the execution context the
//! caller blocks. Bridging a callback back onto the very context that is
//! waiting for it can never complete. When the executor can tell
//! ([`Executor::is_current`]) the call is refused with
//! [`Error::WouldDeadlock`]; otherwise avoiding it is the caller's job.

use core::{fmt::Debug, mem, time::Duration};
use std::time::Instant;

use crate::{error::*, executor::Executor, utils::*};

/// Default deadline of a [`SyncBridge`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

enum Slot<T> {
    Waiting,
    Ready(T),
    /// The caller stopped waiting; a late value is discarded.
    Abandoned,
    /// The completion handle was dropped without a value.
    Dropped,
}

struct FrameShared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

/// The waiting half of a single bridged call, owned by the caller's frame.
pub(crate) struct CallFrame<T> {
    shared: Arc<FrameShared<T>>,
}

/// One-shot callback handed to a bridged operation.
///
/// Call [`complete`](Self::complete) exactly once. Dropping it without a value
/// makes the waiting call give up as if it had timed out.
#[must_use = "the bridged call only returns once the completion is used"]
pub struct Completion<T> {
    shared: Option<Arc<FrameShared<T>>>,
}

impl<T> CallFrame<T> {
    pub(crate) fn new() -> (Self, Completion<T>) {
        let shared = Arc::new(FrameShared {
            slot: Mutex::new(Slot::Waiting),
            ready: Condvar::new(),
        });
        (
            Self {
                shared: shared.clone(),
            },
            Completion {
                shared: Some(shared),
            },
        )
    }

    /// Blocks until the value arrives, the completion is dropped, or
    /// `deadline` passes. Only the first case yields a value.
    pub(crate) fn wait(&self, deadline: Option<Instant>) -> Option<T> {
        let mut slot = lock(&self.shared.slot);
        loop {
            match mem::replace(&mut *slot, Slot::Waiting) {
                Slot::Ready(value) => return Some(value),
                Slot::Waiting => {}
                gone => {
                    *slot = gone;
                    return None;
                }
            }
            slot = match deadline {
                None => wait(&self.shared.ready, slot),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        *slot = Slot::Abandoned;
                        return None;
                    }
                    wait_timeout(&self.shared.ready, slot, remaining)
                }
            };
        }
    }
}

impl<T> Drop for CallFrame<T> {
    fn drop(&mut self) {
        let mut slot = lock(&self.shared.slot);
        if matches!(*slot, Slot::Waiting) {
            *slot = Slot::Abandoned;
        }
    }
}

impl<T> Completion<T> {
    /// Delivers the result to the waiting caller.
    ///
    /// If the caller has already given up, `value` is dropped.
    pub fn complete(mut self, value: T) {
        if let Some(shared) = self.shared.take() {
            Self::fill(&shared, Slot::Ready(value));
        }
    }

    fn fill(shared: &FrameShared<T>, outcome: Slot<T>) {
        let mut slot = lock(&shared.slot);
        match *slot {
            Slot::Waiting => {
                *slot = outcome;
                drop(slot);
                shared.ready.notify_one();
            }
            _ => {
                drop(slot);
                if matches!(outcome, Slot::Ready(_)) {
                    tracing::warn!("late completion discarded");
                }
            }
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            Self::fill(&shared, Slot::Dropped);
        }
    }
}

impl<T> Debug for Completion<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.shared.is_some())
            .finish()
    }
}

/// Runs `op` on `executor` and blocks until it calls back or `timeout`
/// elapses.
///
/// A completion arriving after the deadline is discarded and cannot leak
/// into a later call.
///
/// ```rust
/// # use compact_dispatch::{call_sync, ThreadExecutor};
/// # use std::time::Duration;
/// let answer = call_sync(&ThreadExecutor::new(), Duration::from_secs(5), |done| {
///     done.complete("done");
/// });
/// assert_eq!(answer, Ok("done"));
/// ```
pub fn call_sync<T, E, F>(executor: &E, timeout: Duration, op: F) -> Result<T>
where
    T: Send + 'static,
    E: Executor + ?Sized,
    F: FnOnce(Completion<T>) + Send + 'static,
{
    if executor.is_current() {
        return Err(Error::WouldDeadlock);
    }
    let deadline = Instant::now().checked_add(timeout);
    let (frame, completion) = CallFrame::new();
    executor.execute(Box::new(move || op(completion)));
    frame.wait(deadline).ok_or_else(|| {
        tracing::warn!(?timeout, "bridged call gave up waiting");
        Error::Timeout(timeout)
    })
}

/// An executor paired with a default deadline for [`call_sync`].
#[derive(Clone, Debug)]
pub struct SyncBridge<E> {
    executor: E,
    timeout: Duration,
}

impl<E: Executor> SyncBridge<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn call<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Completion<T>) + Send + 'static,
    {
        call_sync(&self.executor, self.timeout, op)
    }
}
