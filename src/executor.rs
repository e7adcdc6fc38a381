//! Execution contexts on which tasks, listeners and bridged operations run.
//!
//! The primitives only need two things from a host scheduler: "run this job
//! somewhere" and, optionally, "is the current thread one of yours". Those are
//! the two methods of [`Executor`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
        mpsc,
    },
    thread::{self, ThreadId},
};

use derive_more::Debug;

use crate::{bridge::CallFrame, utils::run_contained};

/// A unit of work handed to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A handle that runs jobs on some execution context.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);

    /// Returns `true` when the calling thread is an execution context owned by
    /// this executor, i.e. blocking here would block the executor itself.
    fn is_current(&self) -> bool {
        false
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    #[inline]
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }

    #[inline]
    fn is_current(&self) -> bool {
        (**self).is_current()
    }
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    #[inline]
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }

    #[inline]
    fn is_current(&self) -> bool {
        (**self).is_current()
    }
}

/// Runs every job on a fresh OS thread.
#[derive(Clone, Copy, Debug)]
pub struct ThreadExecutor {
    prefix: &'static str,
}

impl ThreadExecutor {
    pub const fn new() -> Self {
        Self::named("dispatch-worker")
    }

    /// Worker threads are named `{prefix}-{n}`.
    pub const fn named(prefix: &'static str) -> Self {
        Self { prefix }
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) {
        static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
        let name = format!(
            "{}-{}",
            self.prefix,
            NEXT_ID.fetch_add(1, Ordering::Relaxed)
        );
        if let Err(err) = thread::Builder::new().name(name).spawn(job) {
            panic!("failed to spawn worker thread: {err}");
        }
    }
}

/// Runs every job immediately on the calling thread.
///
/// Useful for listeners that should fire on whichever context triggered them,
/// e.g. the member performing the last [`TaskGroup::leave`](crate::TaskGroup::leave).
#[derive(Clone, Copy, Debug, Default)]
pub struct Inline;

impl Executor for Inline {
    #[inline]
    fn execute(&self, job: Job) {
        job()
    }
}

/// A labelled queue backed by a single worker thread.
///
/// Jobs run one at a time, in submission order. The worker exits once every
/// clone of the queue has been dropped and the backlog is drained.
#[derive(Clone, Debug)]
#[debug("SerialQueue({label:?})")]
pub struct SerialQueue {
    label: Arc<str>,
    worker: ThreadId,
    sender: mpsc::Sender<Job>,
}

impl SerialQueue {
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        let label = label.into();
        let (sender, receiver) = mpsc::channel::<Job>();
        let spawned = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                for job in receiver {
                    run_contained(job, "job on serial queue");
                }
            });
        let worker = match spawned {
            Ok(handle) => handle.thread().id(),
            Err(err) => panic!("failed to spawn serial queue {label:?}: {err}"),
        };
        tracing::debug!(label = %label, "serial queue started");
        Self {
            label,
            worker,
            sender,
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs `work` on the queue and returns its result.
    ///
    /// When called from the queue's own worker the closure runs inline, so
    /// this never blocks the queue on itself.
    pub fn sync<T, F>(&self, work: F) -> T
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.is_current() {
            return work();
        }
        let (frame, completion) = CallFrame::new();
        self.execute(Box::new(move || completion.complete(work())));
        match frame.wait(None) {
            Some(value) => value,
            None => panic!("job on serial queue {:?} panicked", self.label),
        }
    }
}

impl Executor for SerialQueue {
    fn execute(&self, job: Job) {
        if self.sender.send(job).is_err() {
            panic!("serial queue {:?} worker has exited", self.label);
        }
    }

    #[inline]
    fn is_current(&self) -> bool {
        thread::current().id() == self.worker
    }
}

/// Runs `f(i)` for every `i` in `0..iterations` across all available cores
/// and returns once every invocation has finished.
///
/// Panics from `f` are propagated to the caller after all workers stop.
pub fn concurrent_perform<F>(iterations: usize, f: F)
where
    F: Fn(usize) + Sync,
{
    let workers = thread::available_parallelism()
        .map_or(1, |n| n.get())
        .min(iterations);
    let next = AtomicUsize::new(0);
    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    if index >= iterations {
                        break;
                    }
                    f(index);
                }
            });
        }
    });
}
