//! Process-wide caches shared by every service: the Id-cache (name/unique-id
//! resolution) and a generic bounded LRU used to build the Index LRU in
//! `vdb-annindex` without a dependency cycle.

pub mod idcache;
pub mod lru;

pub use idcache::{CachedToken, IdCache, VersionLookup};
pub use lru::BoundedLru;
