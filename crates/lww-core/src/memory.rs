//! In-memory timed set

use crate::error::Result;
use crate::score::Timestamp;
use crate::timed_set::{Raise, TimedSet};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;

/// In-memory timed set
///
/// A hash map behind one reader/writer lock. Raises take the write lock and
/// re-read the stored timestamp under it; lookups and traversals share the
/// read lock. Timestamps keep full precision. Never fails.
pub struct MemoryTimedSet<V> {
    elements: RwLock<HashMap<V, Timestamp>>,
}

impl<V> MemoryTimedSet<V> {
    pub fn new() -> Self {
        Self {
            elements: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> Default for MemoryTimedSet<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for MemoryTimedSet<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTimedSet")
            .field("len", &self.elements.read().len())
            .finish()
    }
}

impl<V> TimedSet<V> for MemoryTimedSet<V>
where
    V: Eq + Hash + Clone + Send + Sync,
{
    fn raise_if_newer(&self, value: &V, at: Timestamp) -> Result<Raise> {
        let mut elements = self.elements.write();

        match elements.get_mut(value) {
            Some(current) if at > *current => {
                *current = at;
                Ok(Raise::Updated)
            }
            Some(_) => Ok(Raise::Unchanged),
            None => {
                elements.insert(value.clone(), at);
                Ok(Raise::Updated)
            }
        }
    }

    fn lookup(&self, value: &V) -> Result<Option<Timestamp>> {
        Ok(self.elements.read().get(value).copied())
    }

    fn for_each(&self, visitor: &mut dyn FnMut(V, Timestamp) -> Result<()>) -> Result<()> {
        // Copy out under the read lock; visitors may write to this set.
        let snapshot: Vec<(V, Timestamp)> = self
            .elements
            .read()
            .iter()
            .map(|(value, at)| (value.clone(), *at))
            .collect();

        for (value, at) in snapshot {
            visitor(value, at)?;
        }
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.elements.read().len())
    }
}
