use core::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};

use crate::{
    error::*,
    executor::Executor,
    utils::*,
};

/// Lifecycle of a [`CancellableTask`].
///
/// `Created → Running → {Completed, Cancelled} → Notified`. The last step
/// only happens once a listener has been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskPhase {
    Created,
    Running,
    Completed,
    Cancelled,
    Notified,
}

impl TaskPhase {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Notified)
    }
}

/// How a task body ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskOutcome {
    /// The body returned `Ok(())`.
    Completed,
    /// The body observed a cancellation request and stopped early.
    Cancelled,
    /// The body panicked. The task still ends in [`TaskPhase::Cancelled`].
    Panicked,
}

/// Cooperative cancellation flag handed to a task body.
#[derive(Clone, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(atomic::Acquire)
    }

    /// Returns `Err(Cancelled)` once cancellation has been requested.
    ///
    /// Meant to be called with `?` at every step boundary of a task body.
    #[inline]
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

type Body = Box<dyn FnOnce(&CancelToken) -> Result<(), Cancelled> + Send>;
type Listener = Box<dyn FnOnce(TaskOutcome) + Send>;

/// A unit of work that can be asked to stop between steps.
///
/// Cancellation is advisory: [`cancel`](Self::cancel) only raises a flag that
/// the body polls through its [`CancelToken`]. In-progress steps are never
/// interrupted. A single listener registered with [`notify`](Self::notify)
/// fires exactly once, after the task has reached a terminal phase.
///
/// Cloning yields another handle to the same task.
///
/// ```rust
/// # use compact_dispatch::{CancellableTask, TaskOutcome};
/// let task = CancellableTask::from_steps(1..6, |_| {});
/// task.cancel();
/// assert_eq!(task.perform(), Ok(TaskOutcome::Cancelled));
/// ```
#[derive(Clone)]
pub struct CancellableTask(Arc<TaskInner>);

struct TaskInner {
    token: CancelToken,
    state: Mutex<TaskState>,
    finished: Condvar,
}

struct TaskState {
    phase: TaskPhase,
    outcome: Option<TaskOutcome>,
    body: Option<Body>,
    listener: Option<Listener>,
}

impl CancellableTask {
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce(&CancelToken) -> Result<(), Cancelled> + Send + 'static,
    {
        Self(Arc::new(TaskInner {
            token: CancelToken::new(),
            state: Mutex::new(TaskState {
                phase: TaskPhase::Created,
                outcome: None,
                body: Some(Box::new(body)),
                listener: None,
            }),
            finished: Condvar::new(),
        }))
    }

    /// Builds a task running `step` once per item, checking for cancellation
    /// before each one.
    pub fn from_steps<I, F>(steps: I, mut step: F) -> Self
    where
        I: IntoIterator + Send + 'static,
        F: FnMut(I::Item) + Send + 'static,
    {
        Self::new(move |token| {
            for item in steps {
                token.checkpoint()?;
                step(item);
            }
            Ok(())
        })
    }

    /// Starts the body on `executor`.
    ///
    /// Returns [`Error::AlreadyStarted`] if the task was started before.
    pub fn start<E: Executor>(&self, executor: E) -> Result<()> {
        let body = self.begin()?;
        let task = self.clone();
        executor.execute(Box::new(move || {
            task.run(body);
        }));
        Ok(())
    }

    /// Runs the body on the calling thread and returns its outcome.
    pub fn perform(&self) -> Result<TaskOutcome> {
        let body = self.begin()?;
        Ok(self.run(body))
    }

    /// Requests cancellation. A no-op once the task is terminal.
    pub fn cancel(&self) {
        let state = lock(&self.0.state);
        if state.phase.is_terminal() {
            return;
        }
        self.0.token.0.store(true, atomic::Release);
        tracing::debug!(phase = ?state.phase, "task cancellation requested");
    }

    /// Registers the listener, which runs on `executor` once the task is
    /// terminal. If it already is, the listener is submitted right away.
    ///
    /// Returns [`Error::ListenerRegistered`] if a listener was already
    /// registered.
    pub fn notify<E, F>(&self, executor: E, listener: F) -> Result<()>
    where
        E: Executor + 'static,
        F: FnOnce(TaskOutcome) + Send + 'static,
    {
        let listener: Listener =
            Box::new(move |outcome| executor.execute(Box::new(move || listener(outcome))));
        let mut state = lock(&self.0.state);
        if state.listener.is_some() || state.phase == TaskPhase::Notified {
            return Err(Error::ListenerRegistered);
        }
        match state.outcome {
            Some(outcome) => {
                state.phase = TaskPhase::Notified;
                drop(state);
                run_contained(move || listener(outcome), "task listener");
            }
            None => state.listener = Some(listener),
        }
        Ok(())
    }

    /// Blocks until the task is terminal.
    pub fn wait(&self) -> TaskOutcome {
        let mut state = lock(&self.0.state);
        loop {
            if let Some(outcome) = state.outcome {
                return outcome;
            }
            state = wait(&self.0.finished, state);
        }
    }

    pub fn phase(&self) -> TaskPhase {
        lock(&self.0.state).phase
    }

    pub fn outcome(&self) -> Option<TaskOutcome> {
        lock(&self.0.state).outcome
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.token.is_cancelled()
    }

    fn begin(&self) -> Result<Body> {
        let mut state = lock(&self.0.state);
        if state.phase != TaskPhase::Created {
            return Err(Error::AlreadyStarted);
        }
        let Some(body) = state.body.take() else {
            return Err(Error::AlreadyStarted);
        };
        state.phase = TaskPhase::Running;
        tracing::trace!("task started");
        Ok(body)
    }

    fn run(&self, body: Body) -> TaskOutcome {
        let token = &self.0.token;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| body(token))) {
            Ok(Ok(())) => TaskOutcome::Completed,
            Ok(Err(Cancelled)) => TaskOutcome::Cancelled,
            Err(payload) => {
                tracing::error!(panic = panic_message(&*payload), "task body panicked");
                TaskOutcome::Panicked
            }
        };
        self.finish(outcome);
        outcome
    }

    fn finish(&self, outcome: TaskOutcome) {
        let listener = {
            let mut state = lock(&self.0.state);
            state.phase = match outcome {
                TaskOutcome::Completed => TaskPhase::Completed,
                TaskOutcome::Cancelled | TaskOutcome::Panicked => TaskPhase::Cancelled,
            };
            state.outcome = Some(outcome);
            tracing::debug!(?outcome, "task finished");
            let listener = state.listener.take();
            if listener.is_some() {
                state.phase = TaskPhase::Notified;
            }
            listener
        };
        self.0.finished.notify_all();
        if let Some(listener) = listener {
            run_contained(move || listener(outcome), "task listener");
        }
    }
}

impl Debug for CancellableTask {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = lock(&self.0.state);
        f.debug_struct("CancellableTask")
            .field("phase", &state.phase)
            .field("cancelled", &self.0.token.is_cancelled())
            .finish()
    }
}
