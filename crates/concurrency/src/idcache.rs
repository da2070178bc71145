//! Process-wide lookup accelerator: name/unique-id → internal id.
//!
//! Backed by `dashmap::DashMap` for lock-free concurrent reads, matching the
//! common pattern of reaching for `dashmap` wherever a shared, high-read
//! cache is needed. Missing entries are the caller's
//! responsibility to populate (a catalog read) and memoise via
//! [`IdCache::put_space`] etc.; this crate never reads the catalog itself, to
//! keep it free of a dependency on `vdb-catalog`.

use std::sync::Arc;

use dashmap::DashMap;
use vdb_core::InternalId;

/// Resolved `(space_name, version_unique_id)` coordinates.
#[derive(Debug, Clone, Copy)]
pub struct VersionLookup {
    /// Internal id of the resolved Version row.
    pub version_id: InternalId,
    /// Internal id of that Version's default Index, if it has one.
    pub default_index_id: Option<InternalId>,
}

/// A cached bearer token's permission bits and expiry, keyed by the raw JWT
/// string. Deliberately independent of `vdb-catalog::Token` so this crate has
/// no dependency on the catalog schema.
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// Space the token is scoped to.
    pub space_id: Option<InternalId>,
    /// Permission bits, keyed by resource name (`"system"`, `"space"`, …).
    pub perms: std::collections::HashMap<String, i32>,
    /// Unix seconds after which the token must be rejected.
    pub expire_utc: i64,
}

/// The process-wide id-cache singleton.
#[derive(Default)]
pub struct IdCache {
    space_by_name: DashMap<String, InternalId>,
    version_by_space_uid: DashMap<(InternalId, i64), VersionLookup>,
    index_reverse: DashMap<InternalId, (Arc<str>, i64)>,
    token_by_string: DashMap<String, CachedToken>,
}

impl IdCache {
    /// Construct an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a Space's internal id by name.
    pub fn get_space(&self, name: &str) -> Option<InternalId> {
        self.space_by_name.get(name).map(|v| *v)
    }

    /// Memoise a Space name → internal id mapping.
    pub fn put_space(&self, name: &str, space_id: InternalId) {
        self.space_by_name.insert(name.to_string(), space_id);
    }

    /// Look up a Version (and its default Index) by `(space_id,
    /// version_unique_id)`. The sentinel `version_unique_id = 0` is resolved
    /// by the catalog layer before reaching this cache; the cache only ever
    /// stores concrete unique ids.
    pub fn get_version(&self, space_id: InternalId, version_unique_id: i64) -> Option<VersionLookup> {
        self.version_by_space_uid
            .get(&(space_id, version_unique_id))
            .map(|v| *v)
    }

    /// Memoise a `(space_id, version_unique_id) -> VersionLookup` mapping,
    /// and its reverse `index_id -> (space_name, version_unique_id)` entry
    /// when a default index is present.
    pub fn put_version(
        &self,
        space_id: InternalId,
        version_unique_id: i64,
        space_name: &str,
        lookup: VersionLookup,
    ) {
        self.version_by_space_uid
            .insert((space_id, version_unique_id), lookup);
        if let Some(index_id) = lookup.default_index_id {
            self.index_reverse
                .insert(index_id, (Arc::from(space_name), version_unique_id));
        }
    }

    /// Reverse lookup: given an Index's internal id, recover the
    /// `(space_name, version_unique_id)` it belongs to.
    pub fn reverse_index(&self, index_id: InternalId) -> Option<(Arc<str>, i64)> {
        self.index_reverse.get(&index_id).map(|v| v.clone())
    }

    /// Look up a cached token by its raw string.
    pub fn get_token(&self, token: &str) -> Option<CachedToken> {
        self.token_by_string.get(token).map(|v| v.clone())
    }

    /// Memoise a token.
    pub fn put_token(&self, token: &str, cached: CachedToken) {
        self.token_by_string.insert(token.to_string(), cached);
    }

    /// Invalidate everything for one Space — called whenever that Space, any
    /// of its Versions, or any of its Indexes mutate, and unconditionally on
    /// Space deletion and snapshot restore.
    pub fn invalidate_space(&self, space_id: InternalId, space_name: &str) {
        self.space_by_name.remove(space_name);
        self.version_by_space_uid
            .retain(|(sid, _), _| *sid != space_id);
        self.index_reverse.retain(|_, (name, _)| name.as_ref() != space_name);
    }

    /// Drop every entry — called on snapshot restore, which replaces the
    /// entire catalog.
    pub fn invalidate_all(&self) {
        self.space_by_name.clear();
        self.version_by_space_uid.clear();
        self.index_reverse.clear();
        self.token_by_string.clear();
    }

    /// Invalidate a single cached token, e.g. on token delete/update.
    pub fn invalidate_token(&self, token: &str) {
        self.token_by_string.remove(token);
    }
}
