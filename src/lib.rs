//! # vdb
//!
//! An embedded vector database: a catalog of Spaces/Versions/Indexes, a
//! from-scratch HNSW ANN engine, and hybrid BM25+ANN retrieval.
//!
//! [`VectorDb`] is the single entry point; all operations go through it.
//! Internal crates (`vdb-storage`, `vdb-concurrency`, `vdb-annindex`,
//! `vdb-textsearch`) are not exposed directly — only the public surface in
//! this crate and in `vdb-retrieval`'s request/response types is stable.
//! The `extern "C"` embedding ABI lives in `vdb-facade`, a separate crate
//! consuming the same `vdb-catalog::Catalog` this struct wraps.

pub use vdb_catalog::{index, space, token, vector, version};
pub use vdb_core::{
    Config, Error, HnswConfig, IndexSpec, Metric, ProductQuantConfig, QuantConfig, Result,
    ScalarQuantConfig, ScalarType, UniqueId, ValueKind, VectorPayload,
};
pub use vdb_retrieval::{parse_filter, Filter, ResultItem, SearchRequest, SparseInput};

use std::collections::HashMap;
use std::path::Path;

use vdb_catalog::Catalog;

/// The embedded database handle. Wraps a [`Catalog`] and composes the
/// retrieval/security/snapshot crates behind it.
pub struct VectorDb {
    catalog: Catalog,
    config: Config,
}

impl VectorDb {
    /// Open (or create) a database at the configuration's data path.
    pub fn open(config: Config) -> Result<Self> {
        let catalog = Catalog::open(&config)?;
        Ok(Self { catalog, config })
    }

    /// An in-memory database for tests and embedding hosts that opt out of
    /// durability.
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            catalog: Catalog::in_memory()?,
            config: Config::in_memory(std::env::temp_dir()),
        })
    }

    /// Direct access to the underlying catalog, for callers that need the
    /// full Space/Version/Index/Vector surface `VectorDb`'s convenience
    /// methods don't cover.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn create_space(&self, name: &str, description: Option<&str>, index_specs: &[IndexSpec]) -> Result<space::Space> {
        self.catalog.create_space(name, description, index_specs)
    }

    /// Reconfigure a Space's default Version's Indexes. Rejected with
    /// `Error::Conflict` while any live vector remains in that Version.
    pub fn update_space(&self, name: &str, index_specs: &[IndexSpec]) -> Result<()> {
        self.catalog.update_space(name, index_specs)
    }

    pub fn delete_space(&self, name: &str) -> Result<()> {
        self.catalog.delete_space(name)
    }

    pub fn create_version(
        &self,
        space_name: &str,
        name: Option<&str>,
        description: Option<&str>,
        tag: Option<&str>,
        make_default: bool,
    ) -> Result<version::Version> {
        self.catalog.create_version(space_name, name, description, tag, make_default)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_index(
        &self,
        space_name: &str,
        version_unique_id: Option<UniqueId>,
        name: &str,
        value_kind: ValueKind,
        metric: Metric,
        dimension: usize,
        hnsw_cfg: HnswConfig,
        quant_cfg: QuantConfig,
        make_default: bool,
    ) -> Result<index::IndexRow> {
        self.catalog
            .create_index(space_name, version_unique_id, name, value_kind, metric, dimension, hnsw_cfg, quant_cfg, make_default)
    }

    pub fn delete_index(&self, index_id: vdb_core::InternalId) -> Result<()> {
        self.catalog.delete_index(index_id)
    }

    /// Upsert a Vector. `unique_id = None` assigns the next free id
    /// (`max+1`); either way, the resolved id is returned.
    pub fn upsert_vector(
        &self,
        space_name: &str,
        version_unique_id: Option<UniqueId>,
        index_name: Option<&str>,
        unique_id: Option<UniqueId>,
        payload: VectorPayload,
        metadata: &[(String, String)],
    ) -> Result<UniqueId> {
        self.catalog.upsert_vector(space_name, version_unique_id, index_name, unique_id, payload, metadata)
    }

    pub fn delete_vector(&self, space_name: &str, version_unique_id: Option<UniqueId>, unique_id: UniqueId) -> Result<()> {
        self.catalog.delete_vector(space_name, version_unique_id, unique_id)
    }

    /// Index a document's BM25 term statistics under `vector_id`, so later
    /// hybrid searches with `tokens` can rerank it.
    pub fn index_document(&self, vector_id: vdb_core::InternalId, doc: &str) -> Result<()> {
        self.catalog.store().with_tx(|tx| vdb_textsearch::add_document(tx, vector_id, doc))
    }

    /// Hybrid ANN + optional filter + optional BM25 rerank search.
    pub fn search(&self, space_name: &str, version_unique_id: Option<UniqueId>, request: &SearchRequest) -> Result<Vec<ResultItem>> {
        vdb_retrieval::search(&self.catalog, space_name, version_unique_id, request)
    }

    /// Mint a bearer token scoped to `space_id`, or system-wide when `None`.
    pub fn new_token(&self, space_id: Option<vdb_core::InternalId>, perms: HashMap<String, i32>, expire_days: i64) -> Result<String> {
        vdb_security::new_token(&self.catalog, &self.config, space_id, perms, expire_days)
    }

    /// `true` if `jwt` is valid, unexpired, and grants `required` on
    /// `resource`.
    pub fn permission_for(&self, jwt: &str, resource: &str, required: i32) -> bool {
        vdb_security::permission_for(&self.catalog, &self.config, jwt, resource, required)
    }

    /// Back up `selection` (each a `(space, version_unique_id)` pair,
    /// `None` meaning "the space's current default") into a ZIP at `file`.
    pub fn snapshot_create(&self, selection: &[(String, Option<UniqueId>)], file: &Path, staging_dir: &Path) -> Result<()> {
        vdb_snapshot::create(&self.catalog, selection, file, staging_dir)
    }

    /// Invalidate every cache and restore the live store from the newest
    /// backup found inside `zip_path`.
    pub fn snapshot_restore(&self, zip_path: &Path, target_dir: &Path) -> Result<()> {
        vdb_snapshot::restore(&self.catalog, zip_path, target_dir)
    }
}
