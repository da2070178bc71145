//! The catalog layer: Space/Version/Index/Vector row managers, the Id-cache,
//! and the bounded Index LRU, composed behind one `Catalog` facade that the
//! retrieval/security/snapshot/facade crates drive.
//!
//! Mirrors the "per-entity manager classes with an injected collaborator"
//! design note: each of `space`/`version`/`index`/`vector`/`token`/`snapshot`
//! is a free-function module over `&rusqlite::Connection`/`&Transaction`;
//! `Catalog` is the thin orchestrator that wires them to `CatalogStore`,
//! `IdCache`, and `IndexLru`.

pub mod codec;
pub mod index;
pub mod snapshot;
pub mod space;
pub mod token;
pub mod vector;
pub mod version;

use std::path::PathBuf;
use std::sync::Arc;

use vdb_annindex::{IndexLru, IndexManager, SearchHit, VectorSource};
use vdb_concurrency::{CachedToken, IdCache, VersionLookup};
use vdb_core::{Config, Error, IndexSpec, InternalId, Result, UniqueId, VectorPayload};
use vdb_storage::CatalogStore;

/// The composed catalog: durable store + id-cache + bounded index LRU.
pub struct Catalog {
    store: Arc<CatalogStore>,
    id_cache: Arc<IdCache>,
    index_cache: Arc<IndexLru>,
    data_path: PathBuf,
}

impl Catalog {
    /// Open (or create) the catalog described by `cfg`.
    pub fn open(cfg: &Config) -> Result<Self> {
        let data_path = cfg.data_path.clone();
        let store = CatalogStore::open(&data_path, &cfg.db_name)?;
        Ok(Self {
            store: Arc::new(store),
            id_cache: Arc::new(IdCache::new()),
            index_cache: Arc::new(IndexLru::new(cfg.hnsw_index_cache_capacity)),
            data_path,
        })
    }

    /// An in-memory catalog, for tests and embedding hosts that opt out of
    /// durability.
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            store: Arc::new(CatalogStore::open_in_memory()?),
            id_cache: Arc::new(IdCache::new()),
            index_cache: Arc::new(IndexLru::new(16)),
            data_path: std::env::temp_dir().join("vdb-in-memory"),
        })
    }

    /// The underlying store, for crates that need direct SQL access
    /// (`vdb-snapshot`'s backup/restore, `vdb-textsearch`'s `bm25_docs`).
    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    /// The id-cache, for `vdb-security`'s token verification fast path.
    pub fn id_cache(&self) -> &Arc<IdCache> {
        &self.id_cache
    }

    /// Root directory for the database file and per-space index trees, for
    /// `vdb-snapshot`'s manifest and staging paths.
    pub fn data_path(&self) -> &std::path::Path {
        &self.data_path
    }

    /// Drop every Id-cache entry and every loaded `IndexManager`, for
    /// `vdb-snapshot`'s restore path: the catalog underneath them just
    /// changed out from under any memoised id or open index.
    pub fn invalidate_all_caches(&self) {
        self.id_cache.invalidate_all();
        self.index_cache.clear();
    }

    /// Persist every loaded `IndexManager`'s in-memory graph to disk, for
    /// `vdb-snapshot`'s create path: a snapshot is only exact if loaded
    /// indexes have flushed their latest state.
    pub fn flush_loaded_indexes(&self) -> Result<()> {
        self.index_cache.flush_all()
    }

    // ---- Space -----------------------------------------------------

    /// Create a Space, and within the same transaction its default Version
    /// and the Indexes `index_specs` describes (the first becomes default).
    /// An empty `index_specs` still creates the default Version, with no
    /// Index until one is added explicitly.
    pub fn create_space(&self, name: &str, description: Option<&str>, index_specs: &[IndexSpec]) -> Result<space::Space> {
        self.store.with_tx(|tx| {
            let space = space::create(tx, name, description)?;
            let version = version::create(tx, space.id, None, None, None, true)?;
            for (i, spec) in index_specs.iter().enumerate() {
                index::create(
                    tx,
                    version.id,
                    &spec.name,
                    spec.value_kind,
                    spec.metric,
                    spec.dimension,
                    spec.hnsw_cfg,
                    spec.quant_cfg,
                    i == 0,
                )?;
            }
            Ok(space)
        })
    }

    /// Reconfigure a Space's default Version: replace its Indexes with
    /// `index_specs` (the first becomes default). Rejected with
    /// `Error::Conflict` if the default Version still holds live vectors,
    /// since reconfiguring would orphan their values.
    pub fn update_space(&self, name: &str, index_specs: &[IndexSpec]) -> Result<()> {
        let space_id = self.resolve_space_id(name)?;
        let index_ids: Vec<i64> = self.store.with_tx(|tx| {
            let version = version::get_default(tx, space_id)?;
            if vector::any_live_for_version(tx, version.id)? {
                return Err(Error::Conflict(format!(
                    "space {name:?} has live vectors in its default version; delete them before reconfiguring"
                )));
            }
            let index_ids: Vec<i64> = tx
                .prepare("SELECT id FROM indexes WHERE version_id = ?1")?
                .query_map([version.id], |r| r.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for index_id in &index_ids {
                index::delete(tx, *index_id)?;
            }
            for (i, spec) in index_specs.iter().enumerate() {
                index::create(
                    tx,
                    version.id,
                    &spec.name,
                    spec.value_kind,
                    spec.metric,
                    spec.dimension,
                    spec.hnsw_cfg,
                    spec.quant_cfg,
                    i == 0,
                )?;
            }
            Ok(index_ids)
        })?;
        for index_id in index_ids {
            self.index_cache.remove(index_id);
        }
        self.id_cache.invalidate_space(space_id, name);
        Ok(())
    }

    /// Fetch a Space by name, consulting the id-cache first.
    pub fn get_space(&self, name: &str) -> Result<space::Space> {
        self.store.with_conn(|c| space::get_by_name(c, name))
    }

    /// Resolve a Space's internal id, memoising the result.
    pub fn resolve_space_id(&self, name: &str) -> Result<InternalId> {
        if let Some(id) = self.id_cache.get_space(name) {
            return Ok(id);
        }
        let space = self.get_space(name)?;
        self.id_cache.put_space(name, space.id);
        Ok(space.id)
    }

    /// List every Space.
    pub fn list_spaces(&self) -> Result<Vec<space::Space>> {
        self.store.with_conn(space::list)
    }

    /// Delete a Space and invalidate every cache entry that could reference
    /// it, including evicting any loaded index managers for its Indexes.
    pub fn delete_space(&self, name: &str) -> Result<()> {
        let space = self.get_space(name)?;
        let index_ids: Vec<i64> = self.store.with_conn(|c| {
            c.prepare(
                "SELECT i.id FROM indexes i JOIN versions v ON i.version_id = v.id WHERE v.space_id = ?1",
            )?
            .query_map([space.id], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
        })?;
        self.store.with_tx(|tx| space::delete(tx, space.id))?;
        for index_id in index_ids {
            self.index_cache.remove(index_id);
        }
        self.id_cache.invalidate_space(space.id, name);
        Ok(())
    }

    // ---- Version -----------------------------------------------------

    /// Create a Version under Space `space_name`. Its `unique_id` is
    /// computed as `max+1` within the creating transaction.
    pub fn create_version(
        &self,
        space_name: &str,
        name: Option<&str>,
        description: Option<&str>,
        tag: Option<&str>,
        make_default: bool,
    ) -> Result<version::Version> {
        let space_id = self.resolve_space_id(space_name)?;
        let v = self
            .store
            .with_tx(|tx| version::create(tx, space_id, name, description, tag, make_default))?;
        self.id_cache.invalidate_space(space_id, space_name);
        Ok(v)
    }

    /// Resolve a Version: `unique_id = None` means "the Space's default".
    pub fn resolve_version(&self, space_name: &str, unique_id: Option<UniqueId>) -> Result<version::Version> {
        let space_id = self.resolve_space_id(space_name)?;
        self.store.with_conn(|c| match unique_id {
            Some(uid) => version::get_by_unique_id(c, space_id, uid),
            None => version::get_default(c, space_id),
        })
    }

    /// Delete a Version, evicting any of its Indexes from the Index LRU.
    pub fn delete_version(&self, space_name: &str, unique_id: UniqueId) -> Result<()> {
        let version = self.resolve_version(space_name, Some(unique_id))?;
        let index_ids: Vec<i64> = self.store.with_conn(|c| {
            c.prepare("SELECT id FROM indexes WHERE version_id = ?1")?
                .query_map([version.id], |r| r.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(Into::into)
        })?;
        self.store.with_tx(|tx| version::delete(tx, version.id))?;
        for index_id in index_ids {
            self.index_cache.remove(index_id);
        }
        self.id_cache.invalidate_space(version.space_id, space_name);
        Ok(())
    }

    // ---- Index -----------------------------------------------------

    /// Create an Index under a resolved Version.
    #[allow(clippy::too_many_arguments)]
    pub fn create_index(
        &self,
        space_name: &str,
        version_unique_id: Option<UniqueId>,
        name: &str,
        value_kind: vdb_core::ValueKind,
        metric: vdb_core::Metric,
        dimension: usize,
        hnsw_cfg: vdb_core::HnswConfig,
        quant_cfg: vdb_core::QuantConfig,
        make_default: bool,
    ) -> Result<index::IndexRow> {
        let version = self.resolve_version(space_name, version_unique_id)?;
        let row = self.store.with_tx(|tx| {
            index::create(
                tx,
                version.id,
                name,
                value_kind,
                metric,
                dimension,
                hnsw_cfg,
                quant_cfg,
                make_default,
            )
        })?;
        self.id_cache.invalidate_space(version.space_id, space_name);
        Ok(row)
    }

    /// Resolve an Index: `name = None` means "the Version's default".
    pub fn resolve_index(&self, version: &version::Version, name: Option<&str>) -> Result<index::IndexRow> {
        self.store.with_conn(|c| match name {
            Some(n) => index::get_by_name(c, version.id, n),
            None => index::get_default(c, version.id),
        })
    }

    /// Delete an Index, evicting it from the Index LRU.
    pub fn delete_index(&self, index_id: InternalId) -> Result<()> {
        self.store.with_tx(|tx| index::delete(tx, index_id))?;
        self.index_cache.remove(index_id);
        Ok(())
    }

    // ---- Vector -----------------------------------------------------

    /// Upsert a Vector's value and metadata for one Index, then apply the
    /// change to the loaded `IndexManager` (building it if unloaded) so a
    /// subsequent search sees it immediately. `unique_id = None` assigns the
    /// next free id (`max+1`) within the upsert transaction; either way, the
    /// resolved id is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_vector(
        &self,
        space_name: &str,
        version_unique_id: Option<UniqueId>,
        index_name: Option<&str>,
        unique_id: Option<UniqueId>,
        payload: VectorPayload,
        metadata: &[(String, String)],
    ) -> Result<UniqueId> {
        let version = self.resolve_version(space_name, version_unique_id)?;
        let idx = self.resolve_index(&version, index_name)?;
        if let VectorPayload::Dense(v) = &payload {
            if v.len() != idx.dimension {
                return Err(Error::BadRequest(format!(
                    "dimension mismatch: index expects {}, got {}",
                    idx.dimension,
                    v.len()
                )));
            }
        }
        let resolved_id = self.store.with_tx(|tx| {
            let resolved_id = match unique_id {
                Some(id) => id,
                None => vector::next_unique_id(tx, version.id)?,
            };
            let vector_id = vector::ensure(tx, version.id, resolved_id, payload.kind())?;
            vector::set_value(tx, vector_id, idx.id, &payload)?;
            vector::set_metadata(tx, vector_id, metadata)?;
            Ok(resolved_id)
        })?;

        let manager = self.manager_for(&version, &idx)?;
        let mut guard = manager.write();
        guard.add(resolved_id, &payload)?;
        guard.save()?;
        Ok(resolved_id)
    }

    /// Delete a Vector (all its values/metadata) and reflect the deletion in
    /// every loaded Index that held it.
    pub fn delete_vector(&self, space_name: &str, version_unique_id: Option<UniqueId>, unique_id: UniqueId) -> Result<()> {
        let version = self.resolve_version(space_name, version_unique_id)?;
        let row = self.store.with_conn(|c| vector::get_by_unique_id(c, version.id, unique_id))?;
        let index_ids: Vec<i64> = self.store.with_conn(|c| {
            c.prepare("SELECT id FROM indexes WHERE version_id = ?1")?
                .query_map([version.id], |r| r.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(Into::into)
        })?;
        self.store.with_tx(|tx| vector::delete(tx, row.id))?;
        for index_id in index_ids {
            if let Ok(idx) = self.store.with_conn(|c| index::get_by_id(c, index_id)) {
                if let Ok(manager) = self.manager_for(&version, &idx) {
                    manager.write().delete(unique_id);
                }
            }
        }
        Ok(())
    }

    /// Run a top-k search against a resolved Index.
    pub fn search(
        &self,
        space_name: &str,
        version_unique_id: Option<UniqueId>,
        index_name: Option<&str>,
        query: &VectorPayload,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let version = self.resolve_version(space_name, version_unique_id)?;
        let idx = self.resolve_index(&version, index_name)?;
        let manager = self.manager_for(&version, &idx)?;
        let result = manager.read().search(query, k);
        result
    }

    /// Fetch metadata for a resolved Vector.
    pub fn vector_metadata(&self, space_name: &str, version_unique_id: Option<UniqueId>, unique_id: UniqueId) -> Result<Vec<(String, String)>> {
        let version = self.resolve_version(space_name, version_unique_id)?;
        let row = self.store.with_conn(|c| vector::get_by_unique_id(c, version.id, unique_id))?;
        self.store.with_conn(|c| vector::get_metadata(c, row.id))
    }

    /// Fetch (or build and load) the `IndexManager` for a resolved Index.
    fn manager_for(&self, version: &version::Version, idx: &index::IndexRow) -> Result<Arc<parking_lot::RwLock<IndexManager>>> {
        let data_path = self.data_path.clone();
        let space_name = self.space_name_of(version.space_id)?;
        let version_uid = version.unique_id;
        let idx_clone = idx.clone();
        self.index_cache.get_or_load(idx.id, || {
            let version_dir = data_path.join(&space_name).join(version_uid.to_string());
            let file_path = IndexManager::file_path_for(&version_dir, idx_clone.id);
            let mut mgr = IndexManager::build(
                idx_clone.id,
                idx_clone.value_kind,
                idx_clone.metric,
                idx_clone.dimension,
                idx_clone.hnsw_cfg,
                idx_clone.quant_cfg,
                file_path,
            );
            mgr.load(self)?;
            Ok(mgr)
        })
    }

    fn space_name_of(&self, space_id: InternalId) -> Result<String> {
        self.store.with_conn(|c| space::get_by_id(c, space_id)).map(|s| s.name)
    }
}

impl VectorSource for Catalog {
    fn live_vectors(&self, index_id: InternalId) -> Result<Vec<(UniqueId, VectorPayload)>> {
        self.store.with_conn(|c| vector::live_vectors_for_index(c, index_id))
    }
}

/// Build a `CachedToken` from a catalog `TokenRow`, for `vdb-security`'s
/// verification path to memoise in the shared `IdCache`.
pub fn cached_token_from_row(row: &token::TokenRow) -> CachedToken {
    CachedToken {
        space_id: row.space_id,
        perms: row.perms.clone(),
        expire_utc: row.expire_utc,
    }
}

/// Build a `VersionLookup` for the id-cache from a resolved Version and its
/// default Index, if any.
pub fn version_lookup(version: &version::Version, default_index_id: Option<InternalId>) -> VersionLookup {
    VersionLookup {
        version_id: version.id,
        default_index_id,
    }
}

/// Re-exported permission bit helper used by `vdb-security`: resource names
/// shared across the id-cache's `CachedToken::perms` map.
pub mod perms {
    /// Bit set on a token permitted to read/search a Space.
    pub const READ: i32 = 1;
    /// Bit set on a token permitted to write (upsert/delete) a Space.
    pub const WRITE: i32 = 2;
    /// Bit set on a token permitted system-level operations (snapshot, token
    /// issuance, Space create/delete).
    pub const ADMIN: i32 = 4;

    /// `true` if `bits` grants `required`.
    pub fn allows(bits: i32, required: i32) -> bool {
        bits & required == required
    }
}
