//! Timestamped sets: the building block under an LWW element set

use crate::error::Result;
use crate::score::Timestamp;

/// Outcome of [`TimedSet::raise_if_newer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Raise {
    /// The value was new, or its stored timestamp was strictly older
    Updated,
    /// The stored timestamp was equal or newer and was kept
    Unchanged,
}

impl Raise {
    pub fn is_updated(self) -> bool {
        matches!(self, Raise::Updated)
    }
}

/// A set where every value carries the greatest timestamp it was ever raised to.
///
/// Entries are never removed through this trait. For any value the stored
/// timestamp only moves forward, whatever order concurrent callers arrive in.
pub trait TimedSet<V>: Send + Sync {
    /// Store `at` for `value` unless an equal or newer timestamp is already there.
    ///
    /// Must be atomic against concurrent raises of the same value: two racing
    /// calls always leave the larger timestamp behind. Which caller observes
    /// `Updated` is not specified.
    fn raise_if_newer(&self, value: &V, at: Timestamp) -> Result<Raise>;

    /// Stored timestamp for `value`, or `None` if it was never raised
    fn lookup(&self, value: &V) -> Result<Option<Timestamp>>;

    /// Visit every (value, timestamp) pair.
    ///
    /// Order is backend-defined. The traversal is not an atomic snapshot with
    /// respect to concurrent writers. An error returned by `visitor` stops the
    /// traversal and is handed back to the caller.
    fn for_each(&self, visitor: &mut dyn FnMut(V, Timestamp) -> Result<()>) -> Result<()>;

    /// Number of stored values
    fn len(&self) -> Result<usize> {
        let mut count = 0;
        self.for_each(&mut |_, _| {
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl<V, T: TimedSet<V> + ?Sized> TimedSet<V> for Box<T> {
    fn raise_if_newer(&self, value: &V, at: Timestamp) -> Result<Raise> {
        (**self).raise_if_newer(value, at)
    }

    fn lookup(&self, value: &V) -> Result<Option<Timestamp>> {
        (**self).lookup(value)
    }

    fn for_each(&self, visitor: &mut dyn FnMut(V, Timestamp) -> Result<()>) -> Result<()> {
        (**self).for_each(visitor)
    }

    fn len(&self) -> Result<usize> {
        (**self).len()
    }
}

impl<V, T: TimedSet<V> + ?Sized> TimedSet<V> for std::sync::Arc<T> {
    fn raise_if_newer(&self, value: &V, at: Timestamp) -> Result<Raise> {
        (**self).raise_if_newer(value, at)
    }

    fn lookup(&self, value: &V) -> Result<Option<Timestamp>> {
        (**self).lookup(value)
    }

    fn for_each(&self, visitor: &mut dyn FnMut(V, Timestamp) -> Result<()>) -> Result<()> {
        (**self).for_each(visitor)
    }

    fn len(&self) -> Result<usize> {
        (**self).len()
    }
}
