//! JSON request/response schemas for the search surface.

use serde::{Deserialize, Serialize};
use vdb_core::{Error, Result, UniqueId, VectorPayload};

/// `{"indices":[i32], "values":[f32]}`, the wire shape for a sparse query.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SparseInput {
    pub indices: Vec<i32>,
    pub values: Vec<f32>,
}

/// `{ "vector":[f32]?, "sparse_data":…?, "tokens":[string]?, "filter":"<expr>"?, "k": int? }`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SearchRequest {
    pub vector: Option<Vec<f32>>,
    pub sparse_data: Option<SparseInput>,
    pub tokens: Option<Vec<String>>,
    pub filter: Option<String>,
    pub index: Option<String>,
    pub k: Option<usize>,
}

impl SearchRequest {
    /// The `VectorPayload` this request's query vector decodes to.
    pub fn query_payload(&self) -> Result<VectorPayload> {
        match (&self.vector, &self.sparse_data) {
            (Some(v), None) => Ok(VectorPayload::Dense(v.clone())),
            (None, Some(s)) => Ok(VectorPayload::Sparse {
                indices: s.indices.clone(),
                values: s.values.clone(),
            }),
            (None, None) => Err(Error::BadRequest("search request has neither vector nor sparse_data".to_string())),
            (Some(_), Some(_)) => Err(Error::BadRequest("search request has both vector and sparse_data".to_string())),
        }
    }

    pub fn top_k(&self) -> usize {
        self.k.unwrap_or(10)
    }
}

/// A single result row: `{"id", "distance", "bm25_score"}`.
///
/// `bm25_score` is omitted from plain ANN search responses (no `tokens` in
/// the request) and present once BM25 reranking ran.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResultItem {
    pub id: UniqueId,
    pub distance: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f32>,
}
