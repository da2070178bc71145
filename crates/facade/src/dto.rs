//! JSON wire shapes for the `extern "C"` ABI. Each request/response DTO
//! mirrors a `vdb-catalog`/`vdb-retrieval`/`vdb-security` row or argument
//! list the facade forwards to, since none of those internal types carry
//! `serde` derives themselves.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use vdb_catalog::space;
use vdb_core::{
    Error, HnswConfig, IndexSpec, Metric, QuantConfig, Result, ScalarQuantConfig, ScalarType,
    UniqueId, ValueKind, VectorPayload,
};

/// `{"code":int,"message":string}`, wrapped under `"error"` in every
/// failure envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    pub fn from_error(e: &vdb_core::Error) -> Self {
        Self {
            error: ErrorBody {
                code: e.wire_code(),
                message: e.to_string(),
            },
        }
    }
}

/// `{"m":int?,"ef_construct":int?}`. Missing fields fall back to whatever
/// `HnswConfig` this layers onto, either the built-in default or the
/// request's top-level `hnsw_config`.
#[derive(Debug, Deserialize, Default)]
pub struct HnswConfigDto {
    pub m: Option<usize>,
    pub ef_construct: Option<usize>,
}

impl HnswConfigDto {
    fn resolve(&self, base: HnswConfig) -> HnswConfig {
        HnswConfig {
            m: self.m.unwrap_or(base.m),
            ef_construction: self.ef_construct.unwrap_or(base.ef_construction),
            ef_search: base.ef_search,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScalarQuantConfigDto {
    #[serde(rename = "type")]
    pub ty: ScalarType,
    pub quantile: Option<f32>,
    pub always_ram: Option<bool>,
}

impl ScalarQuantConfigDto {
    fn resolve(&self) -> ScalarQuantConfig {
        let base = ScalarQuantConfig::default();
        ScalarQuantConfig {
            ty: self.ty,
            quantile: self.quantile.unwrap_or(base.quantile),
            always_ram: self.always_ram.unwrap_or(base.always_ram),
        }
    }
}

/// `{"scalar": {...}}?`. Product quantization has no wire representation
/// yet, so this only ever resolves to `QuantConfig::None` or
/// `QuantConfig::Scalar`.
#[derive(Debug, Deserialize, Default)]
pub struct QuantizationConfigDto {
    pub scalar: Option<ScalarQuantConfigDto>,
}

impl QuantizationConfigDto {
    fn resolve(&self) -> QuantConfig {
        match &self.scalar {
            Some(s) => QuantConfig::Scalar(s.resolve()),
            None => QuantConfig::None,
        }
    }
}

fn parse_metric(s: &str) -> Result<Metric> {
    match s {
        "l2" => Ok(Metric::L2),
        "cosine" => Ok(Metric::Cosine),
        "inner_product" => Ok(Metric::InnerProduct),
        other => Err(Error::BadRequest(format!(
            "unknown metric {other:?}: expected l2|cosine|inner_product"
        ))),
    }
}

/// One `dense`/`sparse`/named-index entry of a Create/Update-Space request.
/// Any field left unset inherits the request's top-level default of the same
/// name.
#[derive(Debug, Deserialize, Default)]
pub struct IndexConfigDto {
    pub dimension: Option<usize>,
    pub metric: Option<String>,
    pub hnsw_config: Option<HnswConfigDto>,
    pub quantization_config: Option<QuantizationConfigDto>,
}

impl IndexConfigDto {
    fn resolve(&self, name: &str, value_kind: ValueKind, defaults: &IndexConfigDto) -> Result<IndexSpec> {
        let dimension = self
            .dimension
            .or(defaults.dimension)
            .ok_or_else(|| Error::BadRequest(format!("index {name:?} has no dimension and no default was given")))?;
        let metric_s = self
            .metric
            .as_deref()
            .or(defaults.metric.as_deref())
            .unwrap_or("l2");
        let metric = parse_metric(metric_s)?;
        let hnsw_base = defaults
            .hnsw_config
            .as_ref()
            .map(|d| d.resolve(HnswConfig::default()))
            .unwrap_or_default();
        let hnsw_cfg = self
            .hnsw_config
            .as_ref()
            .map(|d| d.resolve(hnsw_base))
            .unwrap_or(hnsw_base);
        let quant_cfg = self
            .quantization_config
            .as_ref()
            .or(defaults.quantization_config.as_ref())
            .map(|d| d.resolve())
            .unwrap_or_default();
        Ok(IndexSpec {
            name: name.to_string(),
            value_kind,
            metric,
            dimension,
            hnsw_cfg,
            quant_cfg,
        })
    }
}

/// `{"name","description"?,"dense"?,"sparse"?,"indexes"?,"dimension"?,
/// "metric"?,"hnsw_config"?,"quantization_config"?}`. The flattened
/// top-level `dimension`/`metric`/`hnsw_config`/`quantization_config` fields
/// are defaults inherited by `dense`/`sparse`/each named index in `indexes`.
#[derive(Debug, Deserialize)]
pub struct SpaceCreateRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub defaults: IndexConfigDto,
    pub dense: Option<IndexConfigDto>,
    pub sparse: Option<IndexConfigDto>,
    pub indexes: Option<BTreeMap<String, IndexConfigDto>>,
}

impl SpaceCreateRequest {
    /// The Index configuration to create under the Space's default Version,
    /// in `dense`, `sparse`, then alphabetical-`indexes` order — the first
    /// entry becomes the default Index.
    pub fn index_specs(&self) -> Result<Vec<IndexSpec>> {
        let mut specs = Vec::new();
        if let Some(dense) = &self.dense {
            specs.push(dense.resolve("dense", ValueKind::Dense, &self.defaults)?);
        }
        if let Some(sparse) = &self.sparse {
            specs.push(sparse.resolve("sparse", ValueKind::Sparse, &self.defaults)?);
        }
        if let Some(indexes) = &self.indexes {
            for (name, cfg) in indexes {
                specs.push(cfg.resolve(name, ValueKind::Dense, &self.defaults)?);
            }
        }
        Ok(specs)
    }
}

#[derive(Debug, Serialize)]
pub struct SpaceResponse {
    pub name: String,
    pub description: Option<String>,
    pub created_utc: i64,
    pub updated_utc: i64,
}

impl From<space::Space> for SpaceResponse {
    fn from(s: space::Space) -> Self {
        Self {
            name: s.name,
            description: s.description,
            created_utc: s.created_utc,
            updated_utc: s.updated_utc,
        }
    }
}

/// `{"indices":[i32],"values":[f32]}`, duplicated from `vdb-retrieval`'s
/// query-side shape since a Vector *upsert* carries the payload directly
/// rather than behind `query_payload()`'s either/or validation.
#[derive(Debug, Deserialize)]
pub struct SparsePayload {
    pub indices: Vec<i32>,
    pub values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub struct VectorUpsertRequest {
    pub unique_id: Option<UniqueId>,
    pub vector: Option<Vec<f32>>,
    pub sparse_data: Option<SparsePayload>,
    pub index: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl VectorUpsertRequest {
    pub fn payload(&self) -> vdb_core::Result<VectorPayload> {
        match (&self.vector, &self.sparse_data) {
            (Some(v), None) => Ok(VectorPayload::Dense(v.clone())),
            (None, Some(s)) => Ok(VectorPayload::Sparse {
                indices: s.indices.clone(),
                values: s.values.clone(),
            }),
            _ => Err(vdb_core::Error::BadRequest(
                "vector upsert request must carry exactly one of vector/sparse_data".to_string(),
            )),
        }
    }

    pub fn metadata_pairs(&self) -> Vec<(String, String)> {
        self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[derive(Debug, Serialize)]
pub struct VectorUpsertResponse {
    pub unique_id: UniqueId,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotSelectionEntry {
    pub space: String,
    pub version_unique_id: Option<UniqueId>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotCreateRequest {
    pub selection: Vec<SnapshotSelectionEntry>,
    pub file: String,
    pub staging_dir: String,
}

#[derive(Debug, Serialize)]
pub struct SnapshotCreateResponse {
    pub file: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenNewRequest {
    pub space: Option<String>,
    #[serde(default)]
    pub perms: HashMap<String, i32>,
    #[serde(default)]
    pub expire_days: i64,
}

#[derive(Debug, Serialize)]
pub struct TokenNewResponse {
    pub token: String,
}

/// `{"data_path":string?,"db_name":string?}`, overrides layered on top of
/// `Config::from_env()`, with a JSON override at the embedding boundary.
#[derive(Debug, Deserialize, Default)]
pub struct OpenRequest {
    pub data_path: Option<String>,
    pub db_name: Option<String>,
}
