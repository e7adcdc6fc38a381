use core::fmt::Debug;

use crate::utils::*;

/// A stack whose every access goes through one exclusive lock.
///
/// Operations are linearizable in lock-acquisition order. Reads hand out
/// copies, never references into the guarded storage.
///
/// ```rust
/// # use compact_dispatch::GuardedStack;
/// let items = GuardedStack::new();
/// items.append(1);
/// items.append(2);
/// items.append(5);
/// items.append(3);
/// assert_eq!(items.remove_last(), Some(3));
/// assert_eq!(items.remove_last(), Some(5));
/// items.append(3);
/// assert_eq!(items.snapshot(), [1, 2, 3]);
/// ```
pub struct GuardedStack<T> {
    elements: Mutex<Vec<T>>,
}

impl<T> GuardedStack<T> {
    pub fn new() -> Self {
        Self::from(Vec::new())
    }

    /// Pushes `value` on top of the stack.
    pub fn append(&self, value: T) {
        lock(&self.elements).push(value);
    }

    /// Pops the top value, or returns `None` when there is nothing to remove.
    pub fn remove_last(&self) -> Option<T> {
        lock(&self.elements).pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        lock(&self.elements).len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        lock(&self.elements).is_empty()
    }

    /// Runs `f` with exclusive access to the backing storage.
    ///
    /// This is the only way to combine a read and a write into one atomic
    /// step, e.g. pushing `last + 1`. `f` runs with the lock held and must
    /// not block on other primitives.
    ///
    /// ```rust
    /// # use compact_dispatch::GuardedStack;
    /// let counter = GuardedStack::new();
    /// for _ in 0..3 {
    ///     counter.with_mut(|v| {
    ///         let next = v.last().copied().unwrap_or(0) + 1;
    ///         v.push(next);
    ///     });
    /// }
    /// assert_eq!(counter.snapshot(), [1, 2, 3]);
    /// ```
    pub fn with_mut<R, F: FnOnce(&mut Vec<T>) -> R>(&self, f: F) -> R {
        let mut elements = lock(&self.elements);
        f(&mut elements)
    }

    pub fn into_inner(self) -> Vec<T> {
        match self.elements.into_inner() {
            Ok(elements) => elements,
            Err(_) => panic!("exclusion lock poisoned"),
        }
    }
}

impl<T: Clone> GuardedStack<T> {
    /// Copies the whole sequence out under the lock.
    pub fn snapshot(&self) -> Vec<T> {
        lock(&self.elements).clone()
    }

    pub fn last(&self) -> Option<T> {
        lock(&self.elements).last().cloned()
    }
}

impl<T> Debug for GuardedStack<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GuardedStack")
            .field("len", &self.len())
            .finish()
    }
}

impl<T> Default for GuardedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for GuardedStack<T> {
    fn from(elements: Vec<T>) -> Self {
        Self {
            elements: Mutex::new(elements),
        }
    }
}

impl<T> FromIterator<T> for GuardedStack<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}
