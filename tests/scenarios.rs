//! End-to-end coverage through the [`vdb::VectorDb`] umbrella, exercising
//! the catalog, retrieval, security, and snapshot crates together rather
//! than in isolation (each crate's own test suite already covers its
//! scenario/property in isolation — see DESIGN.md).

use std::collections::HashMap;

use vdb::{HnswConfig, Metric, QuantConfig, ResultItem, SearchRequest, SparseInput, ValueKind, VectorDb, VectorPayload};

fn seeded_db() -> VectorDb {
    let db = VectorDb::in_memory().unwrap();
    db.create_space("S", None, &[]).unwrap();
    db.create_index(
        "S",
        None,
        "primary",
        ValueKind::Dense,
        Metric::L2,
        4,
        HnswConfig::default(),
        QuantConfig::None,
        true,
    )
    .unwrap();
    db
}

/// Scenario F, driven end-to-end: upsert two vectors with documents, search
/// with both `vector` and `tokens`, and confirm the BM25-reranked order and
/// verbatim ANN distances, all through the single `VectorDb` handle rather
/// than calling `vdb-catalog`/`vdb-retrieval` directly.
#[test]
fn hybrid_rerank_through_the_umbrella_handle() {
    let db = seeded_db();
    db.upsert_vector("S", None, None, Some(1), VectorPayload::Dense(vec![1.0, 0.0, 0.0, 0.0]), &[]).unwrap();
    db.upsert_vector("S", None, None, Some(2), VectorPayload::Dense(vec![0.9, 0.1, 0.0, 0.0]), &[]).unwrap();
    db.index_document(1, "rust vector database").unwrap();
    db.index_document(2, "rust rust rust database engine").unwrap();

    let request = SearchRequest {
        vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
        sparse_data: None,
        tokens: Some(vec!["rust".to_string()]),
        filter: None,
        index: None,
        k: Some(10),
    };
    let hits = db.search("S", None, &request).unwrap();

    assert_eq!(hits.len(), 2);
    // Id 2 repeats "rust" three times against the same working set: higher
    // term frequency must outrank id 1's single mention (property 8).
    assert_eq!(hits[0].id, 2);
    assert_eq!(hits[1].id, 1);
    assert!(hits.iter().all(|h| h.bm25_score.is_some()));
}

/// Property 8: on an identical working set, BM25 score is monotone
/// non-decreasing in a query token's term frequency.
#[test]
fn bm25_score_increases_with_term_frequency() {
    let db = seeded_db();
    db.upsert_vector("S", None, None, Some(1), VectorPayload::Dense(vec![0.0; 4]), &[]).unwrap();
    db.upsert_vector("S", None, None, Some(2), VectorPayload::Dense(vec![0.0; 4]), &[]).unwrap();
    db.index_document(1, "alpha beta").unwrap();
    db.index_document(2, "alpha alpha alpha beta").unwrap();

    let request = SearchRequest {
        vector: Some(vec![0.0; 4]),
        sparse_data: None,
        tokens: Some(vec!["alpha".to_string()]),
        filter: None,
        index: None,
        k: Some(10),
    };
    let hits = db.search("S", None, &request).unwrap();
    let score_of = |id: i64| hits.iter().find(|h| h.id == id).unwrap().bm25_score.unwrap();
    assert!(score_of(2) > score_of(1));
}

/// Scenario F's filter clause: a metadata filter narrows the ANN result set
/// before BM25 rerank runs, with no re-expansion of the candidate pool.
#[test]
fn filtered_hybrid_search_excludes_non_matching_metadata() {
    let db = seeded_db();
    db.upsert_vector("S", None, None, Some(1), VectorPayload::Dense(vec![1.0, 0.0, 0.0, 0.0]), &[("category".to_string(), "A".to_string())])
        .unwrap();
    db.upsert_vector("S", None, None, Some(2), VectorPayload::Dense(vec![0.9, 0.1, 0.0, 0.0]), &[("category".to_string(), "B".to_string())])
        .unwrap();

    let request = SearchRequest {
        vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
        sparse_data: None,
        tokens: None,
        filter: Some("category = A".to_string()),
        index: None,
        k: Some(10),
    };
    let hits: Vec<ResultItem> = db.search("S", None, &request).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, 1);
}

/// Scenario E, driven end-to-end with a bearer token gating the restored
/// data: snapshot, mutate, restore, and confirm both the pre-snapshot
/// search result and the token's permission check survive intact.
#[test]
fn snapshot_restore_preserves_search_and_token_permissions() {
    let data_dir = tempfile::tempdir().unwrap();
    let staging_dir = tempfile::tempdir().unwrap();
    let restore_dir = tempfile::tempdir().unwrap();

    let db = VectorDb::open(vdb::Config::in_memory(data_dir.path().to_path_buf())).unwrap();
    db.create_space("S", None, &[]).unwrap();
    db.create_index("S", None, "primary", ValueKind::Dense, Metric::L2, 4, HnswConfig::default(), QuantConfig::None, true)
        .unwrap();
    db.upsert_vector("S", None, None, Some(1), VectorPayload::Dense(vec![1.0, 0.0, 0.0, 0.0]), &[]).unwrap();

    let mut perms = HashMap::new();
    perms.insert("S".to_string(), vdb_catalog::perms::READ);
    let token = db.new_token(None, perms, 30).unwrap();
    assert!(db.permission_for(&token, "S", vdb_catalog::perms::READ));

    let zip_path = staging_dir.path().join("snap.zip");
    db.snapshot_create(&[("S".to_string(), None)], &zip_path, staging_dir.path()).unwrap();

    db.upsert_vector("S", None, None, Some(2), VectorPayload::Dense(vec![0.0, 1.0, 0.0, 0.0]), &[]).unwrap();
    db.snapshot_restore(&zip_path, restore_dir.path()).unwrap();

    let request = SearchRequest {
        vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
        sparse_data: None,
        tokens: None,
        filter: None,
        index: None,
        k: Some(10),
    };
    let hits = db.search("S", None, &request).unwrap();
    assert_eq!(hits.iter().filter(|h| h.id == 2).count(), 0, "post-snapshot vector must not survive restore");
    assert_eq!(hits.iter().filter(|h| h.id == 1).count(), 1);

    // The token minted before the snapshot is unaffected by cache
    // invalidation: its row lives in the restored database, not the cache.
    assert!(db.permission_for(&token, "S", vdb_catalog::perms::READ));
}

/// A sparse-payload search routed through the umbrella handle, confirming
/// `SparseInput`'s re-export wires end to end without a dense index.
#[test]
fn sparse_search_through_the_umbrella_handle() {
    let db = VectorDb::in_memory().unwrap();
    db.create_space("S", None, &[]).unwrap();
    db.create_index("S", None, "primary", ValueKind::Sparse, Metric::L2, 4, HnswConfig::default(), QuantConfig::None, true)
        .unwrap();
    db.upsert_vector("S", None, None, Some(1), VectorPayload::Sparse { indices: vec![0, 2], values: vec![0.5, 0.8] }, &[]).unwrap();
    db.upsert_vector("S", None, None, Some(2), VectorPayload::Sparse { indices: vec![1, 3], values: vec![0.9, 1.0] }, &[]).unwrap();

    let request = SearchRequest {
        vector: None,
        sparse_data: Some(SparseInput { indices: vec![0, 2], values: vec![0.5, 0.8] }),
        tokens: None,
        filter: None,
        index: None,
        k: Some(2),
    };
    let hits = db.search("S", None, &request).unwrap();
    assert_eq!(hits[0].id, 1);
    assert!(hits[0].distance < 1e-6);
}
