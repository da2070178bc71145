//! The hybrid retrieval orchestrator: ANN top-k, optional
//! metadata filter, optional BM25 rerank over the same working set.
//!
//! A stateless orchestrator holding only references to its collaborators,
//! here the `Catalog` and the BM25 engine's connection, running a single
//! ANN-primitive-plus-BM25-rerank pipeline.

use std::cmp::Ordering;

use vdb_catalog::{index, vector, Catalog};
use vdb_core::{Error, Result, UniqueId, ValueKind};

use crate::filter;
use crate::request::{ResultItem, SearchRequest};

/// Locate the Index of a resolved Version matching `kind`, preferring the
/// caller's named index, else the Version's default among indexes of that
/// kind. Errors (`NotFound`) if none matches.
fn locate_index(catalog: &Catalog, version: &vdb_catalog::version::Version, kind: ValueKind, name: Option<&str>) -> Result<index::IndexRow> {
    if let Some(name) = name {
        let idx = catalog.resolve_index(version, Some(name))?;
        if idx.value_kind != kind {
            return Err(Error::BadRequest(format!(
                "index {name:?} holds {:?} vectors, query supplied {kind:?}",
                idx.value_kind
            )));
        }
        return Ok(idx);
    }
    let candidates = catalog.store().with_conn(|c| index::list_for_version(c, version.id))?;
    candidates
        .iter()
        .find(|i| i.value_kind == kind && i.is_default)
        .or_else(|| candidates.iter().find(|i| i.value_kind == kind))
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("no {kind:?} index in version {}", version.id)))
}

/// Run one hybrid search request end to end.
pub fn search(catalog: &Catalog, space_name: &str, version_unique_id: Option<UniqueId>, request: &SearchRequest) -> Result<Vec<ResultItem>> {
    let version = catalog.resolve_version(space_name, version_unique_id)?;
    let payload = request.query_payload()?;
    let idx = locate_index(catalog, &version, payload.kind(), request.index.as_deref())?;
    let k = request.top_k();

    let hits = catalog.search(space_name, Some(version.unique_id), Some(&idx.name), &payload, k)?;

    let mut rows: Vec<ResultItem> = hits
        .into_iter()
        .map(|h| ResultItem {
            id: h.unique_id,
            distance: h.distance,
            bm25_score: None,
        })
        .collect();

    if let Some(filter_str) = &request.filter {
        let parsed = filter::parse(filter_str)?;
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata = catalog
                .vector_metadata(space_name, Some(version.unique_id), row.id)?
                .into_iter()
                .collect::<std::collections::HashMap<_, _>>();
            if parsed.evaluate(&metadata) {
                kept.push(row);
            }
        }
        rows = kept;
    }

    if let Some(tokens) = &request.tokens {
        let query = tokens.join(" ");
        let vector_ids = rows
            .iter()
            .map(|row| catalog.store().with_conn(|c| vector::get_by_unique_id(c, version.id, row.id)).map(|r| r.id))
            .collect::<Result<Vec<_>>>()?;
        let bm25_hits = catalog.store().with_conn(|c| vdb_textsearch::search_with_ids(c, &vector_ids, &query))?;
        let scores: std::collections::HashMap<i64, f32> = bm25_hits.into_iter().map(|h| (h.vector_id, h.score)).collect();
        for row in rows.iter_mut() {
            let internal_id = catalog.store().with_conn(|c| vector::get_by_unique_id(c, version.id, row.id)).map(|r| r.id)?;
            row.bm25_score = Some(scores.get(&internal_id).copied().unwrap_or(0.0));
        }
        rows.sort_by(|a, b| {
            b.bm25_score
                .unwrap_or(0.0)
                .partial_cmp(&a.bm25_score.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal))
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdb_core::{HnswConfig, Metric, QuantConfig, VectorPayload};

    fn seeded_catalog() -> Catalog {
        let catalog = Catalog::in_memory().unwrap();
        catalog.create_space("S", None, &[]).unwrap();
        catalog
            .create_index(
                "S", None, "primary", ValueKind::Dense, Metric::L2, 4,
                HnswConfig::default(), QuantConfig::None, false,
            )
            .unwrap();
        catalog
            .upsert_vector("S", None, None, Some(1), VectorPayload::Dense(vec![1.0, 0.0, 0.0, 0.0]), &[("category".to_string(), "A".to_string())])
            .unwrap();
        catalog
            .upsert_vector("S", None, None, Some(2), VectorPayload::Dense(vec![0.9, 0.1, 0.0, 0.0]), &[("category".to_string(), "B".to_string())])
            .unwrap();
        catalog
    }

    #[test]
    fn plain_search_returns_ann_order_without_bm25_score() {
        let catalog = seeded_catalog();
        let req = SearchRequest {
            vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
            k: Some(2),
            ..Default::default()
        };
        let rows = search(&catalog, "S", None, &req).unwrap();
        assert_eq!(rows[0].id, 1);
        assert!(rows[0].bm25_score.is_none());
    }

    #[test]
    fn filter_drops_non_matching_rows() {
        let catalog = seeded_catalog();
        let req = SearchRequest {
            vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
            filter: Some("category = B".to_string()),
            k: Some(2),
            ..Default::default()
        };
        let rows = search(&catalog, "S", None, &req).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 2);
    }

    #[test]
    fn hybrid_rerank_sorts_by_bm25_then_distance() {
        let catalog = seeded_catalog();
        let version_id = catalog.resolve_version("S", None).unwrap().id;
        catalog
            .store()
            .with_tx(|tx| {
                let v1 = vector::get_by_unique_id(tx, version_id, 1)?.id;
                let v2 = vector::get_by_unique_id(tx, version_id, 2)?.id;
                vdb_textsearch::add_document(tx, v1, "a short note")?;
                vdb_textsearch::add_document(tx, v2, "a detailed essay about foxes and foxes and foxes")
            })
            .unwrap();

        let req = SearchRequest {
            vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
            tokens: Some(vec!["foxes".to_string()]),
            k: Some(2),
            ..Default::default()
        };
        let rows = search(&catalog, "S", None, &req).unwrap();
        assert_eq!(rows[0].id, 2);
        assert!(rows[0].bm25_score.unwrap() > rows[1].bm25_score.unwrap());
    }
}
