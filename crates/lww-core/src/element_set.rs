//! Last-Writer-Wins element set
//!
//! Membership is derived from two timed sets. A value is present when it has
//! an addition and no removal strictly later than that addition, so an add
//! and a remove carrying the same timestamp leave the value present.

use crate::error::Result;
use crate::memory::MemoryTimedSet;
use crate::score::Timestamp;
use crate::timed_set::{Raise, TimedSet};
use std::hash::Hash;
use std::marker::PhantomData;
use tracing::trace;

/// Entry counts of both halves of an element set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetStats {
    pub additions: usize,
    pub removals: usize,
}

/// LWW element set over any pair of timed sets
pub struct ElementSet<V, S = MemoryTimedSet<V>> {
    additions: S,
    removals: S,
    _value: PhantomData<fn() -> V>,
}

impl<V> ElementSet<V, MemoryTimedSet<V>>
where
    V: Eq + Hash + Clone + Send + Sync,
{
    /// Create an empty in-memory element set
    pub fn new() -> Self {
        Self::from_parts(MemoryTimedSet::new(), MemoryTimedSet::new())
    }
}

impl<V> Default for ElementSet<V, MemoryTimedSet<V>>
where
    V: Eq + Hash + Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, S: TimedSet<V>> ElementSet<V, S> {
    /// Assemble an element set from its additions and removals.
    ///
    /// The two sets must not share storage, and must not be shared with any
    /// other element set.
    pub fn from_parts(additions: S, removals: S) -> Self {
        Self {
            additions,
            removals,
            _value: PhantomData,
        }
    }

    /// Record that `value` was added at `at`
    pub fn add(&self, value: &V, at: Timestamp) -> Result<Raise> {
        let raised = self.additions.raise_if_newer(value, at)?;
        trace!(updated = raised.is_updated(), "add");
        Ok(raised)
    }

    /// Record that `value` was removed at `at`
    pub fn remove(&self, value: &V, at: Timestamp) -> Result<Raise> {
        let raised = self.removals.raise_if_newer(value, at)?;
        trace!(updated = raised.is_updated(), "remove");
        Ok(raised)
    }

    /// Whether `value` is currently in the set
    pub fn exists(&self, value: &V) -> Result<bool> {
        match self.additions.lookup(value)? {
            Some(added_at) => self.survives(value, added_at),
            None => Ok(false),
        }
    }

    /// All values currently in the set, in backend traversal order
    pub fn get(&self) -> Result<Vec<V>> {
        let mut present = Vec::new();
        self.additions.for_each(&mut |value, added_at| {
            if self.survives(&value, added_at)? {
                present.push(value);
            }
            Ok(())
        })?;
        Ok(present)
    }

    /// Fold another replica into this one.
    ///
    /// Every addition and removal of `other` is raised into the matching half
    /// of `self`, so merging is commutative, associative and idempotent.
    pub fn merge<S2: TimedSet<V>>(&self, other: &ElementSet<V, S2>) -> Result<()> {
        other.additions.for_each(&mut |value, at| {
            self.additions.raise_if_newer(&value, at).map(|_| ())
        })?;
        other.removals.for_each(&mut |value, at| {
            self.removals.raise_if_newer(&value, at).map(|_| ())
        })
    }

    pub fn stats(&self) -> Result<SetStats> {
        Ok(SetStats {
            additions: self.additions.len()?,
            removals: self.removals.len()?,
        })
    }

    pub fn additions(&self) -> &S {
        &self.additions
    }

    pub fn removals(&self) -> &S {
        &self.removals
    }

    /// An addition survives unless a removal is strictly later
    fn survives(&self, value: &V, added_at: Timestamp) -> Result<bool> {
        Ok(match self.removals.lookup(value)? {
            Some(removed_at) => added_at >= removed_at,
            None => true,
        })
    }
}

impl<V, S: std::fmt::Debug> std::fmt::Debug for ElementSet<V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementSet")
            .field("additions", &self.additions)
            .field("removals", &self.removals)
            .finish()
    }
}
