use core::{
    fmt::Debug,
    mem,
    pin::Pin,
    task::{Context, Poll, Waker},
    time::Duration,
};
use std::time::Instant;

use derive_more::Deref;

use crate::{
    error::*,
    executor::{Executor, Job},
    utils::*,
};

/// A join barrier over a dynamic set of members.
///
/// Every [`enter`](Self::enter) must be matched by exactly one
/// [`leave`](Self::leave). When the live count drops from one to zero, the
/// group fires a single *zero-transition* event observed by blocked
/// [`wait`](Self::wait)ers, pending [`notify`](Self::notify) registrations and
/// pending [`wait_async`](Self::wait_async) futures alike.
///
/// Cloning a `TaskGroup` yields another handle to the same group. The order
/// in which waiters and listeners are woken at a zero-transition is
/// implementation-defined.
///
/// ```rust
/// # use compact_dispatch::{Inline, TaskGroup, ThreadExecutor};
/// # use std::sync::mpsc;
/// let group = TaskGroup::new();
/// for i in 0..3 {
///     group.spawn(ThreadExecutor::new(), move || {
///         std::thread::sleep(std::time::Duration::from_millis(i));
///     });
/// }
/// let (tx, rx) = mpsc::channel();
/// group.notify(Inline, move || tx.send("done").unwrap());
/// group.wait();
/// assert_eq!(rx.recv().unwrap(), "done");
/// ```
#[derive(Clone)]
pub struct TaskGroup(Arc<GroupInner>);

struct GroupInner {
    state: Mutex<GroupState>,
    zero: Condvar,
}

#[derive(Default)]
struct GroupState {
    live: usize,
    epoch: u64,
    listeners: Vec<Job>,
    wakers: Vec<(u64, Waker)>,
    next_waker_id: u64,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self(Arc::new(GroupInner {
            state: Mutex::new(GroupState::default()),
            zero: Condvar::new(),
        }))
    }

    /// Registers one more outstanding member.
    pub fn enter(&self) {
        let mut state = lock(&self.0.state);
        state.live = match state.live.checked_add(1) {
            Some(live) => live,
            None => {
                drop(state);
                panic!("task group member count overflow");
            }
        };
    }

    /// Reports that one member has finished.
    ///
    /// # Panics
    ///
    /// Panics when there is no outstanding member, i.e. the call has no
    /// matching [`enter`](Self::enter).
    #[track_caller]
    pub fn leave(&self) {
        let (listeners, wakers) = {
            let mut state = lock(&self.0.state);
            if state.live == 0 {
                drop(state);
                panic!("TaskGroup::leave called without a matching enter");
            }
            state.live -= 1;
            if state.live != 0 {
                return;
            }
            state.epoch = state.epoch.wrapping_add(1);
            tracing::trace!(
                epoch = state.epoch,
                listeners = state.listeners.len(),
                "task group drained"
            );
            (
                mem::take(&mut state.listeners),
                mem::take(&mut state.wakers),
            )
        };
        self.0.zero.notify_all();
        for (_, waker) in wakers {
            waker.wake();
        }
        for listener in listeners {
            run_contained(listener, "task group listener");
        }
    }

    /// Enters the group and returns a token that leaves it when dropped.
    pub fn token(&self) -> GroupToken {
        self.enter();
        GroupToken(self.clone())
    }

    /// Enters the group and runs `work` on `executor`, leaving once `work`
    /// returns or unwinds.
    pub fn spawn<E, F>(&self, executor: E, work: F)
    where
        E: Executor,
        F: FnOnce() + Send + 'static,
    {
        let token = self.token();
        executor.execute(Box::new(move || {
            let _token = token;
            work();
        }));
    }

    /// Number of members that have entered and not yet left.
    pub fn live(&self) -> usize {
        lock(&self.0.state).live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live() == 0
    }

    /// Blocks until the group is empty.
    ///
    /// Returns immediately if it already is. Otherwise returns after the next
    /// zero-transition, even if new members enter before this thread wakes.
    pub fn wait(&self) {
        let mut state = lock(&self.0.state);
        if state.live == 0 {
            return;
        }
        let epoch = state.epoch;
        while state.epoch == epoch {
            state = wait(&self.0.zero, state);
        }
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    ///
    /// A member that never leaves wedges the group; this is the only way to
    /// detect that from the outside.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<()> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return Ok(());
        };
        let mut state = lock(&self.0.state);
        if state.live == 0 {
            return Ok(());
        }
        let epoch = state.epoch;
        while state.epoch == epoch {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(timeout));
            }
            state = wait_timeout(&self.0.zero, state, remaining);
        }
        Ok(())
    }

    /// Runs `callback` on `executor` at the next zero-transition.
    ///
    /// If the group is already empty, `callback` is submitted right away.
    /// Each registration fires exactly once and is then consumed; later
    /// enter/leave cycles do not fire it again. A panicking callback is
    /// logged and does not keep other registrations from firing.
    pub fn notify<E, F>(&self, executor: E, callback: F)
    where
        E: Executor + 'static,
        F: FnOnce() + Send + 'static,
    {
        let job: Job = Box::new(move || executor.execute(Box::new(callback)));
        let mut state = lock(&self.0.state);
        if state.live == 0 {
            drop(state);
            run_contained(job, "task group listener");
        } else {
            state.listeners.push(job);
        }
    }

    /// Returns a future resolving once the group is empty.
    ///
    /// The future is tied to the zero-transition epoch current at this call.
    /// It resolves on its first poll if the group is empty by then, or if a
    /// zero-transition happened since it was created. Otherwise it resolves
    /// at the next zero-transition, the same as calling [`wait`](Self::wait)
    /// at the time of the first poll.
    ///
    /// # Cancellation safety
    ///
    /// The future is cancellation safe, and it is safe to poll again after
    /// completion.
    ///
    /// ```rust
    /// # use compact_dispatch::TaskGroup;
    /// # futures_executor::block_on(async {
    /// let group = TaskGroup::new();
    /// let token = group.token();
    /// std::thread::spawn(move || token.release());
    /// group.wait_async().await;
    /// assert!(group.is_empty());
    /// # });
    /// ```
    pub fn wait_async(&self) -> GroupWait {
        let epoch = lock(&self.0.state).epoch;
        GroupWait {
            group: self.clone(),
            epoch,
            waker_id: None,
            done: false,
        }
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for TaskGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = lock(&self.0.state);
        f.debug_struct("TaskGroup")
            .field("live", &state.live)
            .field("epoch", &state.epoch)
            .finish()
    }
}

/// Membership of a [`TaskGroup`]; leaves the group when dropped.
///
/// Cloning a token enters the group once more.
#[must_use]
#[derive(Debug, Deref)]
pub struct GroupToken(TaskGroup);

impl GroupToken {
    /// Leaves the group.
    ///
    /// This is equivalent to dropping the token.
    #[inline]
    pub fn release(self) {
        drop(self);
    }

    #[inline]
    pub fn scope<T, F: FnOnce(GroupToken) -> T>(self, func: F) -> T {
        func(self)
    }
}

impl Clone for GroupToken {
    fn clone(&self) -> Self {
        self.0.token()
    }
}

impl Drop for GroupToken {
    #[inline]
    fn drop(&mut self) {
        self.0.leave();
    }
}

/// Future returned by [`TaskGroup::wait_async`].
#[must_use]
pub struct GroupWait {
    group: TaskGroup,
    epoch: u64,
    waker_id: Option<u64>,
    done: bool,
}

impl GroupWait {
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done
    }
}

impl Future for GroupWait {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.done {
            return Poll::Ready(());
        }
        let this = &mut *self;
        let mut state = lock(&this.group.0.state);
        if state.live == 0 || state.epoch != this.epoch {
            if let Some(id) = this.waker_id.take() {
                state.wakers.retain(|(slot, _)| *slot != id);
            }
            drop(state);
            this.done = true;
            return Poll::Ready(());
        }

        let waker = cx.waker();
        match this.waker_id {
            Some(id) => {
                if let Some((_, old)) = state.wakers.iter_mut().find(|(slot, _)| *slot == id) {
                    if !old.will_wake(waker) {
                        *old = waker.clone();
                    }
                } else {
                    state.wakers.push((id, waker.clone()));
                }
            }
            None => {
                let id = state.next_waker_id;
                state.next_waker_id = id.wrapping_add(1);
                state.wakers.push((id, waker.clone()));
                this.waker_id = Some(id);
            }
        }
        Poll::Pending
    }
}

impl Drop for GroupWait {
    fn drop(&mut self) {
        if let Some(id) = self.waker_id.take() {
            lock(&self.group.0.state)
                .wakers
                .retain(|(slot, _)| *slot != id);
        }
    }
}

#[cfg(feature = "futures-core")]
impl futures_core::FusedFuture for GroupWait {
    #[inline]
    fn is_terminated(&self) -> bool {
        self.done
    }
}

impl Debug for GroupWait {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GroupWait")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
