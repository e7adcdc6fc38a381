//! Small, executor-agnostic coordination primitives for threads.
//!
//! | Primitive            | Guarantees                                              |
//! | -------------------- | ------------------------------------------------------- |
//! | [`GuardedStack`]     | every access serialized by one lock, copies out          |
//! | [`PermitPool`]       | at most `capacity` concurrent holders, blocks otherwise  |
//! | [`CancellableTask`]  | cooperative cancellation, listener fires exactly once    |
//! | [`TaskGroup`]        | join barrier with blocking `wait` and one-shot `notify` |
//! | [`call_sync`]        | callback operation turned into a blocking call + timeout |
//!
//! Work runs on whatever an [`Executor`] provides: [`ThreadExecutor`],
//! [`SerialQueue`], [`Inline`] or your own scheduler.
//!
//! # Usage
//!
//! ## [`TaskGroup`]
//!
//! ```rust
//! # use compact_dispatch::{Inline, TaskGroup};
//! # use std::{sync::mpsc, thread, time::Duration};
//! let group = TaskGroup::new();
//! for delay in [1, 2, 3] {
//!     group.enter();
//!     let member = group.clone();
//!     thread::spawn(move || {
//!         thread::sleep(Duration::from_millis(delay));
//!         member.leave();
//!     });
//! }
//! let (tx, rx) = mpsc::channel();
//! let observed = group.clone();
//! group.notify(Inline, move || tx.send(observed.live()).unwrap());
//! assert_eq!(rx.recv().unwrap(), 0);
//! ```
//!
//! ## [`PermitPool`]
//!
//! ```rust
//! # use compact_dispatch::{PermitPool, TaskGroup, ThreadExecutor};
//! # use std::sync::Arc;
//! let pool = Arc::new(PermitPool::new(5));
//! let group = TaskGroup::new();
//! for _ in 0..10 {
//!     let pool = pool.clone();
//!     group.spawn(ThreadExecutor::new(), move || {
//!         let _permit = pool.acquire();
//!         assert!(pool.issued() <= 5);
//!     });
//! }
//! group.wait();
//! assert_eq!(pool.issued(), 0);
//! ```
//!
//! ## [`CancellableTask`]
//!
//! ```rust
//! # use compact_dispatch::{CancellableTask, TaskOutcome, ThreadExecutor};
//! let task = CancellableTask::new(|token| {
//!     for _step in 1..6 {
//!         token.checkpoint()?;
//!         std::thread::sleep(std::time::Duration::from_millis(10));
//!     }
//!     Ok(())
//! });
//! task.start(ThreadExecutor::new()).unwrap();
//! task.cancel();
//! assert_ne!(task.wait(), TaskOutcome::Panicked);
//! ```
//!
//! # Lock discipline
//!
//! Each primitive owns exactly one lock and never holds it while running a
//! user callback, a listener or an executor submission. No two of these
//! locks are ever nested, so they cannot be acquired in conflicting orders.
//! The one exception is [`GuardedStack::with_mut`], whose closure runs under
//! the stack's lock and must not touch other primitives.

mod bridge;
mod error;
mod executor;
mod ext;
mod group;
mod limiter;
mod stack;
mod task;
mod utils;

pub use crate::{
    bridge::{Completion, DEFAULT_TIMEOUT, SyncBridge, call_sync},
    error::{Cancelled, Error, Result},
    executor::{Executor, Inline, Job, SerialQueue, ThreadExecutor, concurrent_perform},
    ext::{GroupTokenExt, ReleaseOnReady},
    group::{GroupToken, GroupWait, TaskGroup},
    limiter::{OwnedPermit, Permit, PermitPool},
    stack::GuardedStack,
    task::{CancelToken, CancellableTask, TaskOutcome, TaskPhase},
};
