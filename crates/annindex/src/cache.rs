//! The bounded Index LRU: the process-wide cache of loaded `IndexManager`s.
//!
//! Grounded in `vdb-concurrency::BoundedLru` (a single cache-level mutex for
//! map mutations) plus a per-manager `parking_lot::RwLock` so concurrent
//! searches against the same Index never block each other while a writer
//! holds the map lock only long enough to insert/evict.

use std::sync::Arc;

use parking_lot::RwLock;
use vdb_concurrency::BoundedLru;
use vdb_core::{InternalId, Result};

use crate::manager::IndexManager;

/// Bounded cache of loaded indexes, keyed by the catalog's internal Index id.
pub struct IndexLru {
    inner: BoundedLru<InternalId, RwLock<IndexManager>>,
}

impl IndexLru {
    /// Create a cache holding at most `capacity` loaded indexes.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: BoundedLru::new(capacity),
        }
    }

    /// Fetch the manager for `index_id`, constructing it with `build` (a
    /// closure performing `IndexManager::build` + `load`/`restore_from_catalog`)
    /// on a cache miss.
    pub fn get_or_load(
        &self,
        index_id: InternalId,
        build: impl FnOnce() -> Result<IndexManager>,
    ) -> Result<Arc<RwLock<IndexManager>>> {
        self.inner
            .get_or_try_insert_with(index_id, || build().map(RwLock::new))
    }

    /// Evict `index_id`'s manager, e.g. after the owning Index is deleted.
    pub fn remove(&self, index_id: InternalId) {
        self.inner.remove(&index_id);
    }

    /// Drop every resident manager (used on snapshot restore, since the
    /// catalog and on-disk index files underneath them may have changed).
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Persist every resident manager's current graph to disk (used before
    /// a snapshot, so the backup captures the latest in-memory state).
    pub fn flush_all(&self) -> Result<()> {
        for manager in self.inner.values() {
            manager.read().save()?;
        }
        Ok(())
    }

    /// Number of resident managers.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// `true` when no managers are resident.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
