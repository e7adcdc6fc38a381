use core::{fmt::Debug, time::Duration};
use std::time::Instant;

use crate::{error::*, utils::*};

/// A counting permit pool admitting at most `capacity` concurrent holders.
///
/// [`acquire`](Self::acquire) blocks instead of failing once every permit is
/// out. Permits are RAII guards: dropping one releases it, so the release also
/// happens when the guarded work panics.
///
/// Releasing a permit wakes exactly one blocked acquirer. The order in which
/// blocked acquirers are admitted is unspecified and is **not** FIFO.
///
/// ```rust
/// # use compact_dispatch::PermitPool;
/// let pool = PermitPool::new(2);
/// let a = pool.acquire();
/// let b = pool.acquire();
/// assert!(pool.try_acquire().is_none());
/// a.release();
/// assert_eq!(pool.available(), 1);
/// # drop(b);
/// ```
pub struct PermitPool {
    capacity: usize,
    issued: Mutex<usize>,
    released: Condvar,
}

/// A permit borrowed from a [`PermitPool`].
#[must_use = "the permit is released as soon as it is dropped"]
pub struct Permit<'a> {
    pool: &'a PermitPool,
}

/// A permit holding a shared reference to its [`PermitPool`], suitable for
/// moving into a spawned task.
#[must_use = "the permit is released as soon as it is dropped"]
pub struct OwnedPermit {
    pool: Arc<PermitPool>,
}

impl PermitPool {
    /// Creates a pool with `capacity` permits.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero: such a pool could never admit anyone.
    #[track_caller]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "permit pool capacity must be at least 1");
        Self {
            capacity,
            issued: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of permits currently held.
    pub fn issued(&self) -> usize {
        *lock(&self.issued)
    }

    pub fn available(&self) -> usize {
        self.capacity - self.issued()
    }

    /// Blocks until a permit is free and takes it.
    pub fn acquire(&self) -> Permit<'_> {
        self.acquire_raw();
        Permit { pool: self }
    }

    /// Takes a permit if one is free right now.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut issued = lock(&self.issued);
        if *issued < self.capacity {
            *issued += 1;
            Some(Permit { pool: self })
        } else {
            None
        }
    }

    /// Like [`acquire`](Self::acquire), giving up after `timeout`.
    ///
    /// On timeout the issued count is left untouched.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<Permit<'_>> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Ok(self.acquire());
        };
        let mut issued = lock(&self.issued);
        while *issued >= self.capacity {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::debug!(?timeout, "permit acquisition timed out");
                return Err(Error::Timeout(timeout));
            }
            issued = wait_timeout(&self.released, issued, remaining);
        }
        *issued += 1;
        Ok(Permit { pool: self })
    }

    /// Blocks until a permit is free and returns one that keeps the pool alive.
    pub fn acquire_owned(self: &Arc<Self>) -> OwnedPermit {
        self.acquire_raw();
        OwnedPermit {
            pool: self.clone(),
        }
    }

    /// Runs `f` while holding a permit.
    pub fn run<T, F: FnOnce() -> T>(&self, f: F) -> T {
        let _permit = self.acquire();
        f()
    }

    fn acquire_raw(&self) {
        let mut issued = lock(&self.issued);
        if *issued >= self.capacity {
            tracing::trace!(capacity = self.capacity, "waiting for a permit");
        }
        while *issued >= self.capacity {
            issued = wait(&self.released, issued);
        }
        *issued += 1;
    }

    fn release_raw(&self) {
        let mut issued = lock(&self.issued);
        debug_assert!(*issued > 0, "permit released more than once");
        *issued -= 1;
        drop(issued);
        self.released.notify_one();
    }
}

impl Debug for PermitPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PermitPool")
            .field("capacity", &self.capacity)
            .field("issued", &self.issued())
            .finish()
    }
}

impl Permit<'_> {
    /// Returns the permit to the pool.
    ///
    /// This is equivalent to dropping the permit.
    #[inline]
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Permit<'_> {
    #[inline]
    fn drop(&mut self) {
        self.pool.release_raw();
    }
}

impl Debug for Permit<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Permit")
            .field("capacity", &self.pool.capacity)
            .finish_non_exhaustive()
    }
}

impl OwnedPermit {
    /// Returns the permit to the pool.
    ///
    /// This is equivalent to dropping the permit.
    #[inline]
    pub fn release(self) {
        drop(self);
    }

    #[inline]
    pub fn pool(&self) -> &Arc<PermitPool> {
        &self.pool
    }
}

impl Drop for OwnedPermit {
    #[inline]
    fn drop(&mut self) {
        self.pool.release_raw();
    }
}

impl Debug for OwnedPermit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OwnedPermit")
            .field("pool", &self.pool)
            .finish()
    }
}
