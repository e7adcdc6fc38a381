use core::time::Duration;

use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failures surfaced by the coordination primitives.
///
/// `Timeout` is expected in normal operation and recoverable. The other
/// variants are usage errors and should be fixed at the call site.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("deadline of {0:?} elapsed")]
    Timeout(Duration),
    #[error("task has already been started")]
    AlreadyStarted,
    #[error("task already has a completion listener")]
    ListenerRegistered,
    #[error("blocking on the executor that must run the operation would deadlock")]
    WouldDeadlock,
}

/// Marker returned by [`CancelToken::checkpoint`](crate::CancelToken::checkpoint)
/// once cancellation has been requested.
#[derive(Debug, Error, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[error("task cancelled")]
pub struct Cancelled;
