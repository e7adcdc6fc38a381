#[cfg(not(loom))]
pub use std::sync::{
    Arc, Condvar, Mutex, MutexGuard,
    atomic::{self as _atomic, AtomicBool},
};

#[cfg(loom)]
pub use loom::sync::{
    Arc, Condvar, Mutex, MutexGuard,
    atomic::{self as _atomic, AtomicBool},
};

pub mod atomic {
    pub use super::_atomic::Ordering::*;
}

/// Locks `mutex`, treating poisoning as a broken invariant.
///
/// A poisoned lock means a panic escaped while shared state was half
/// updated; nothing guarded by it can be trusted afterwards.
#[inline]
#[track_caller]
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("exclusion lock poisoned"),
    }
}

#[inline]
#[track_caller]
pub fn wait<'a, T>(cond: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    match cond.wait(guard) {
        Ok(guard) => guard,
        Err(_) => panic!("exclusion lock poisoned"),
    }
}

#[inline]
#[track_caller]
pub fn wait_timeout<'a, T>(
    cond: &Condvar,
    guard: MutexGuard<'a, T>,
    dur: std::time::Duration,
) -> MutexGuard<'a, T> {
    match cond.wait_timeout(guard, dur) {
        Ok((guard, _)) => guard,
        Err(_) => panic!("exclusion lock poisoned"),
    }
}

/// Text of a caught panic payload, for logging.
pub fn panic_message(payload: &(dyn core::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// Runs a user callback, logging a panic instead of unwinding into the
/// caller.
pub fn run_contained<F: FnOnce()>(f: F, what: &'static str) {
    if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        tracing::error!(panic = panic_message(&*payload), "{what} panicked");
    }
}
