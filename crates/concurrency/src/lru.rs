//! A small bounded LRU cache of `Arc<V>` keyed by an opaque id.
//!
//! Generic over both key and value so it serves as the Index LRU's map
//! without this crate knowing anything about `IndexManager`; that type lives
//! in `vdb-annindex`, which would otherwise create a dependency cycle. The
//! map mutation path is serialised by a single `parking_lot::Mutex`
//! (one cache-level mutex for map mutations); values themselves carry their
//! own interior locking.
//!
//! Grounded in the common `dashmap` + `parking_lot` combination for shared,
//! lazily-populated caches.

use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

struct Inner<K, V> {
    capacity: usize,
    entries: std::collections::HashMap<K, Arc<V>>,
    /// Most-recently-used at the back.
    order: VecDeque<K>,
}

/// A bounded, MRU-ordered cache. `get_or_insert_with` is the only mutating
/// entry point other than `remove`/`clear`, so eviction is always driven by
/// an actual lookup.
pub struct BoundedLru<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> BoundedLru<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache holding at most `capacity` entries (capacity `0` is
    /// treated as `1` so the structure always makes progress).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity: capacity.max(1),
                entries: std::collections::HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Return the cached value for `key`, or construct one with `build`,
    /// insert it at MRU position, evicting the LRU entry if at capacity.
    ///
    /// `build` may fail (e.g. a catalog read while constructing a new
    /// manager); on failure nothing is inserted.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: K,
        build: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        let mut inner = self.inner.lock();
        if let Some(v) = inner.entries.get(&key).cloned() {
            touch(&mut inner.order, &key);
            return Ok(v);
        }
        drop(inner);
        let value = Arc::new(build()?);
        let mut inner = self.inner.lock();
        // Another thread may have raced us; prefer the existing entry so we
        // never hold two managers for the same key.
        if let Some(existing) = inner.entries.get(&key).cloned() {
            touch(&mut inner.order, &key);
            return Ok(existing);
        }
        if inner.entries.len() >= inner.capacity {
            if let Some(evict_key) = inner.order.pop_front() {
                inner.entries.remove(&evict_key);
                tracing::debug!("index LRU evicted an entry at capacity");
            }
        }
        inner.entries.insert(key.clone(), value.clone());
        inner.order.push_back(key);
        Ok(value)
    }

    /// Remove a single entry (used when its owning Index/Space is deleted).
    pub fn remove(&self, key: &K) {
        let mut inner = self.inner.lock();
        inner.entries.remove(key);
        inner.order.retain(|k| k != key);
    }

    /// Drop every entry (used on snapshot restore).
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Every resident value, in no particular order (used to flush all
    /// loaded indexes before a snapshot).
    pub fn values(&self) -> Vec<Arc<V>> {
        self.inner.lock().entries.values().cloned().collect()
    }

    /// Current number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// `true` when no entries are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn touch<K: Eq + Clone>(order: &mut VecDeque<K>, key: &K) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        order.remove(pos);
    }
    order.push_back(key.clone());
}
