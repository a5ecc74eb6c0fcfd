//! Mapper cache keyed by comparator equivalence.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace, warn};

use crate::key::{CanonicalKey, KeyComparator, MapperKey};

/// Compiled values by mapper key, one per equivalence class.
///
/// Entries are never evicted. Concurrent first use may build twice; the
/// first published instance wins in [`MapperCache::get_or_build`]. A lock
/// poisoned by a panicking builder is recovered: entries are only ever
/// inserted whole.
pub struct MapperCache<V> {
    comparator: Arc<dyn KeyComparator>,
    entries: RwLock<HashMap<CanonicalKey, Arc<V>>>,
}

impl<V> fmt::Debug for MapperCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperCache")
            .field("comparator", &self.comparator)
            .field("len", &self.len())
            .finish()
    }
}

impl<V> MapperCache<V> {
    pub fn new(comparator: Arc<dyn KeyComparator>) -> Self {
        Self {
            comparator,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn comparator(&self) -> &Arc<dyn KeyComparator> {
        &self.comparator
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<CanonicalKey, Arc<V>>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("mapper cache lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<CanonicalKey, Arc<V>>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("mapper cache lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    pub fn get(&self, key: &MapperKey) -> Option<Arc<V>> {
        let canonical = self.comparator.canonical(key);
        self.read_entries().get(&canonical).cloned()
    }

    /// Stores `value`, replacing any entry for an equivalent key.
    pub fn put(&self, key: &MapperKey, value: Arc<V>) {
        let canonical = self.comparator.canonical(key);
        self.write_entries().insert(canonical, value);
    }

    /// Returns the cached value or builds one outside the lock.
    pub fn get_or_build<E, F>(&self, key: &MapperKey, build: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let canonical = self.comparator.canonical(key);
        if let Some(hit) = self.read_entries().get(&canonical).cloned() {
            trace!(%key, "mapper cache hit");
            return Ok(hit);
        }
        debug!(%key, "mapper cache miss");
        let built = Arc::new(build()?);
        Ok(match self.write_entries().entry(canonical) {
            Entry::Occupied(existing) => Arc::clone(existing.get()),
            Entry::Vacant(slot) => Arc::clone(slot.insert(built)),
        })
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
