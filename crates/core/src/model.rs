//! Shared value types for the catalog's vector domain: value kinds, distance
//! metrics, HNSW/quantization configuration, and the vector payload sum type.
//!
//! This is the idiomatic recasting the design notes call for: `VectorValue`'s
//! tagged union (`denseData | sparseIndices+sparseValues | multiVectorData`)
//! becomes a genuine Rust sum type instead of three optional fields.

use serde::{Deserialize, Serialize};

/// The shape of vector a given Index stores and searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// A single dense float vector of fixed dimension.
    Dense,
    /// A sparse vector: strictly ascending indices paired with values.
    Sparse,
    /// A row-major matrix of equal-width float rows.
    MultiVector,
    /// Reserved for a future fused dense+sparse representation.
    Combined,
}

/// Distance metric an Index is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Euclidean (L2) distance.
    L2,
    /// Cosine similarity, realised as inner-product on L2-normalised vectors.
    Cosine,
    /// Raw inner product.
    InnerProduct,
}

/// HNSW graph parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Max bidirectional connections per node at layer 0 is `2*m`; above
    /// layer 0 it is `m`.
    pub m: usize,
    /// Beam width used while inserting.
    pub ef_construction: usize,
    /// Beam width used while searching; may be tuned independently of build.
    pub ef_search: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 100,
            ef_search: 64,
        }
    }
}

/// Scalar quantization numeric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// Signed 8-bit.
    Int8,
    /// Unsigned 8-bit.
    Uint8,
    /// Signed 4-bit, two values packed per byte.
    Int4,
    /// IEEE half precision.
    Fp16,
}

/// Scalar quantization configuration (per-dimension, train-then-use).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarQuantConfig {
    /// Target numeric representation.
    #[serde(rename = "type")]
    pub ty: ScalarType,
    /// Fraction of the training sample's extreme values to clip before
    /// computing the quantization range; `1.0` disables clipping.
    pub quantile: f32,
    /// Keep the quantized codes resident in RAM rather than memory-mapped.
    pub always_ram: bool,
}

impl Default for ScalarQuantConfig {
    fn default() -> Self {
        Self {
            ty: ScalarType::Int8,
            quantile: 0.99,
            always_ram: true,
        }
    }
}

/// Product quantization configuration (sub-vector codebooks).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductQuantConfig {
    /// Number of sub-vectors the dimension is split into.
    pub compression: usize,
    /// Keep the quantized codes resident in RAM.
    pub always_ram: bool,
}

impl Default for ProductQuantConfig {
    fn default() -> Self {
        Self {
            compression: 4,
            always_ram: true,
        }
    }
}

/// Quantization mode for an Index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantConfig {
    /// No quantization; vectors are stored and searched as raw f32.
    None,
    /// Per-dimension scalar quantization.
    Scalar(ScalarQuantConfig),
    /// Sub-vector product quantization.
    Product(ProductQuantConfig),
}

impl Default for QuantConfig {
    fn default() -> Self {
        QuantConfig::None
    }
}

/// One Index's configuration as carried on a Space create/update request:
/// a name, the shape of vector it stores, and its metric/HNSW/quantization
/// settings.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub value_kind: ValueKind,
    pub metric: Metric,
    pub dimension: usize,
    pub hnsw_cfg: HnswConfig,
    pub quant_cfg: QuantConfig,
}

/// The kind-dependent payload of a `VectorValue` row.
///
/// The catalog blob format (see `vdb-catalog::codec`) is this type's external
/// serialisation; this enum is the in-memory, type-safe counterpart the design
/// notes call for in place of three optional fields on one struct.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorPayload {
    /// Packed f32 values, length equal to the owning Index's `dimension`.
    Dense(Vec<f32>),
    /// Strictly ascending indices paired one-to-one with values.
    Sparse {
        /// Ascending dimension indices, each `< dimension`.
        indices: Vec<i32>,
        /// Values parallel to `indices`.
        values: Vec<f32>,
    },
    /// A row-major matrix; `cols = data.len() / rows`.
    MultiVector {
        /// Row count.
        rows: i32,
        /// Row-major packed f32 values.
        data: Vec<f32>,
    },
}

impl VectorPayload {
    /// The `ValueKind` this payload is tagged as.
    pub fn kind(&self) -> ValueKind {
        match self {
            VectorPayload::Dense(_) => ValueKind::Dense,
            VectorPayload::Sparse { .. } => ValueKind::Sparse,
            VectorPayload::MultiVector { .. } => ValueKind::MultiVector,
        }
    }
}
