//! Per-Index manager: owns the HNSW graph, the external-id map, the
//! quantizer, and disk persistence for one Index.
//!
//! State machine:
//!
//! ```text
//! CREATED ──build()──▶ EMPTY ──add*──▶ POPULATED
//!   │                    │   ▲            │
//!   │                    │   └── load() ──┤
//!   │                    ▼                ▼
//!   └────── restore_from_catalog ─── save()
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vdb_core::{Error, HnswConfig, Metric, QuantConfig, Result, UniqueId, ValueKind, VectorPayload};

use crate::distance::{normalize, report};
use crate::graph::{HnswGraph, Label};
use crate::quant::{synthetic_sample, ProductQuantizer, ScalarQuantizer};

/// Supplies the live vectors for an Index during `restore_from_catalog`,
/// implemented by the catalog crate so this crate never depends on it
/// (dependency inversion the design notes call for).
pub trait VectorSource {
    /// Every non-deleted `(vector.unique_id, payload)` pair persisted for
    /// `index_id`, in any order.
    fn live_vectors(&self, index_id: i64) -> Result<Vec<(UniqueId, VectorPayload)>>;
}

#[derive(Debug, Clone)]
enum Quantizer {
    None,
    Scalar(ScalarQuantizer),
    Product(ProductQuantizer),
}

/// One `(score, unique_id)` search hit, `score` already converted to the
/// externally reported convention (see `distance::report`).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Reported distance/similarity, per metric convention.
    pub distance: f32,
    /// External Vector unique id.
    pub unique_id: UniqueId,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    graph: HnswGraph,
    label_by_unique: HashMap<UniqueId, Label>,
    unique_by_label: HashMap<Label, UniqueId>,
    next_label: Label,
}

/// A single Index's in-memory ANN structure plus disk persistence.
pub struct IndexManager {
    index_id: i64,
    value_kind: ValueKind,
    metric: Metric,
    dimension: usize,
    quant_cfg: QuantConfig,
    graph: HnswGraph,
    label_by_unique: HashMap<UniqueId, Label>,
    unique_by_label: HashMap<Label, UniqueId>,
    next_label: Label,
    file_path: PathBuf,
    loaded: bool,
    quantizer: Quantizer,
}

impl IndexManager {
    /// `build(...)`: create a graph sized for `dimension`, train its
    /// quantizer eagerly (synthetic sample if no real data exists yet), and
    /// transition to the `EMPTY` state.
    pub fn build(
        index_id: i64,
        value_kind: ValueKind,
        metric: Metric,
        dimension: usize,
        hnsw_cfg: HnswConfig,
        quant_cfg: QuantConfig,
        file_path: PathBuf,
    ) -> Self {
        let quantizer = match quant_cfg {
            QuantConfig::None => Quantizer::None,
            QuantConfig::Scalar(cfg) => {
                Quantizer::Scalar(ScalarQuantizer::train(cfg, dimension, &[]))
            }
            QuantConfig::Product(cfg) => {
                Quantizer::Product(ProductQuantizer::train(cfg, dimension, &[]))
            }
        };
        Self {
            index_id,
            value_kind,
            metric,
            dimension,
            quant_cfg,
            graph: HnswGraph::new(dimension, metric, hnsw_cfg),
            label_by_unique: HashMap::new(),
            unique_by_label: HashMap::new(),
            next_label: 0,
            file_path,
            loaded: true,
            quantizer,
        }
    }

    /// `true` once `build()`/`load()`/`restore_from_catalog()` has run.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Number of live points currently indexed.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    fn prepare(&self, payload: &VectorPayload) -> Result<Vec<f32>> {
        if self.value_kind == ValueKind::MultiVector {
            return Err(Error::Internal(
                "MultiVector values are persisted only, not searchable".to_string(),
            ));
        }
        let dense = match payload {
            VectorPayload::Dense(v) => {
                if v.len() != self.dimension {
                    return Err(Error::BadRequest(format!(
                        "dimension mismatch: expected {}, got {}",
                        self.dimension,
                        v.len()
                    )));
                }
                v.clone()
            }
            VectorPayload::Sparse { indices, values } => {
                crate::sparse::densify(indices, values, self.dimension)
            }
            VectorPayload::MultiVector { .. } => unreachable!("checked above"),
        };
        Ok(if self.metric == Metric::Cosine {
            normalize(&dense)
        } else {
            dense
        })
    }

    /// `add(unique_id, vec)`: insert (or replace) a single point. Requires
    /// the index to be loaded.
    pub fn add(&mut self, unique_id: UniqueId, payload: &VectorPayload) -> Result<()> {
        if !self.loaded {
            return Err(Error::Internal("index is not loaded".to_string()));
        }
        let prepared = self.prepare(payload)?;
        let label = *self.label_by_unique.entry(unique_id).or_insert_with(|| {
            let l = self.next_label;
            self.next_label += 1;
            l
        });
        self.unique_by_label.insert(label, unique_id);
        self.graph.insert(label, prepared);
        Ok(())
    }

    /// Soft-delete the point mapped to `unique_id`, if present.
    pub fn delete(&mut self, unique_id: UniqueId) -> bool {
        match self.label_by_unique.get(&unique_id) {
            Some(&label) => self.graph.delete(label),
            None => false,
        }
    }

    /// `restore_from_catalog(skip_if_non_empty)`: repopulate from `source`.
    /// When `skip_if_non_empty` is set and the graph already holds points,
    /// this is a no-op, so a manager freshly promoted from the LRU doesn't
    /// redundantly rescan the catalog.
    pub fn restore_from_catalog(
        &mut self,
        source: &dyn VectorSource,
        skip_if_non_empty: bool,
    ) -> Result<()> {
        if skip_if_non_empty && !self.graph.is_empty() {
            return Ok(());
        }
        if self.value_kind == ValueKind::MultiVector {
            self.loaded = true;
            return Ok(());
        }
        let rows = source.live_vectors(self.index_id)?;
        let mut samples = Vec::with_capacity(rows.len());
        for (unique_id, payload) in &rows {
            if let Ok(prepared) = self.prepare(payload) {
                samples.push(prepared.clone());
                let label = *self.label_by_unique.entry(*unique_id).or_insert_with(|| {
                    let l = self.next_label;
                    self.next_label += 1;
                    l
                });
                self.unique_by_label.insert(label, *unique_id);
                self.graph.insert(label, prepared);
            }
        }
        self.retrain_quantizer(&samples);
        self.loaded = true;
        self.save()
    }

    fn retrain_quantizer(&mut self, samples: &[Vec<f32>]) {
        if samples.is_empty() {
            // keep the eager synthetic training from `build()`
            return;
        }
        self.quantizer = match self.quant_cfg {
            QuantConfig::None => Quantizer::None,
            QuantConfig::Scalar(cfg) => {
                Quantizer::Scalar(ScalarQuantizer::train(cfg, self.dimension, samples))
            }
            QuantConfig::Product(cfg) => {
                Quantizer::Product(ProductQuantizer::train(cfg, self.dimension, samples))
            }
        };
    }

    /// `search(query, k)`: top-k nearest points, closest-first, externally
    /// reported distances per metric convention. Entries whose label has no
    /// unique-id mapping (shouldn't happen, but defends against a corrupted
    /// id-map) are filtered.
    pub fn search(&self, query: &VectorPayload, k: usize) -> Result<Vec<SearchHit>> {
        if !self.loaded {
            return Err(Error::Internal("index is not loaded".to_string()));
        }
        let prepared = self.prepare(query)?;
        let hits = self.graph.search(&prepared, k);
        Ok(hits
            .into_iter()
            .filter_map(|(label, sim)| {
                self.unique_by_label.get(&label).map(|&unique_id| SearchHit {
                    distance: report(sim, self.metric),
                    unique_id,
                })
            })
            .collect())
    }

    /// `save()`: serialise the graph and id-maps to `file_path`, creating
    /// parent directories as needed. Failure leaves any prior on-disk file
    /// untouched (written to a temp path and renamed atomically).
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let persisted = PersistedIndex {
            graph: self.graph.clone(),
            label_by_unique: self.label_by_unique.clone(),
            unique_by_label: self.unique_by_label.clone(),
            next_label: self.next_label,
        };
        let bytes = bincode::serialize(&persisted)
            .map_err(|e| Error::Internal(format!("index serialization failed: {e}")))?;
        let tmp_path = self.file_path.with_extension("idx.tmp");
        {
            let mut f = std::fs::File::create(&tmp_path)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.file_path)?;
        Ok(())
    }

    /// `load()`: read the index back from `file_path` if it exists;
    /// otherwise rebuild via `restore_from_catalog` and save.
    pub fn load(&mut self, source: &dyn VectorSource) -> Result<()> {
        if self.file_path.exists() {
            let bytes = std::fs::read(&self.file_path)?;
            let persisted: PersistedIndex = bincode::deserialize(&bytes)
                .map_err(|e| Error::Internal(format!("index deserialization failed: {e}")))?;
            self.graph = persisted.graph;
            self.label_by_unique = persisted.label_by_unique;
            self.unique_by_label = persisted.unique_by_label;
            self.next_label = persisted.next_label;
            self.loaded = true;
            Ok(())
        } else {
            self.restore_from_catalog(source, false)
        }
    }

    /// Canonical on-disk file path for Index `index_id` under `version_dir`
    /// (the `<data_path>/<space>/<version_unique_id>/index/` directory).
    pub fn file_path_for(version_dir: &Path, index_id: i64) -> PathBuf {
        version_dir.join("index").join(format!("index_file_{index_id}.idx"))
    }

    /// `true` when this manager's quantizer has been trained (always true
    /// after `build()`, by contract).
    pub fn is_quantizer_trained(&self) -> bool {
        !matches!(self.quantizer, Quantizer::None) || matches!(self.quant_cfg, QuantConfig::None)
    }
}

/// Generate the deterministic synthetic training sample a freshly built
/// Scalar/Product quantized index trains on when no real vectors exist yet.
/// Exposed for tests and for callers that want to pre-warm a quantizer.
pub fn synthetic_training_sample(dimension: usize) -> Vec<Vec<f32>> {
    synthetic_sample(dimension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    struct EmptySource;
    impl VectorSource for EmptySource {
        fn live_vectors(&self, _index_id: i64) -> Result<Vec<(UniqueId, VectorPayload)>> {
            Ok(Vec::new())
        }
    }

    struct MapSource(StdHashMap<i64, Vec<(UniqueId, VectorPayload)>>);
    impl VectorSource for MapSource {
        fn live_vectors(&self, index_id: i64) -> Result<Vec<(UniqueId, VectorPayload)>> {
            Ok(self.0.get(&index_id).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn l2_scenario_matches_spec_worked_example() {
        let mut mgr = IndexManager::build(
            1,
            ValueKind::Dense,
            Metric::L2,
            4,
            HnswConfig::default(),
            QuantConfig::None,
            PathBuf::from("/tmp/does-not-exist.idx"),
        );
        mgr.add(1, &VectorPayload::Dense(vec![0.25, 0.45, 0.75, 0.85]))
            .unwrap();
        mgr.add(2, &VectorPayload::Dense(vec![0.20, 0.62, 0.77, 0.75]))
            .unwrap();
        let hits = mgr
            .search(&VectorPayload::Dense(vec![0.25, 0.45, 0.75, 0.85]), 2)
            .unwrap();
        assert_eq!(hits[0].unique_id, 1);
        assert!(hits[0].distance.abs() < 1e-6);
        assert_eq!(hits[1].unique_id, 2);
        assert!((hits[1].distance - 0.0418).abs() < 1e-3);
    }

    #[test]
    fn sparse_l2_scenario_matches_spec_worked_example() {
        let mut mgr = IndexManager::build(
            1,
            ValueKind::Sparse,
            Metric::L2,
            4,
            HnswConfig::default(),
            QuantConfig::None,
            PathBuf::from("/tmp/does-not-exist2.idx"),
        );
        mgr.add(
            1,
            &VectorPayload::Sparse {
                indices: vec![0, 2],
                values: vec![0.5, 0.8],
            },
        )
        .unwrap();
        mgr.add(
            2,
            &VectorPayload::Sparse {
                indices: vec![1, 3],
                values: vec![0.9, 1.0],
            },
        )
        .unwrap();
        let hits = mgr
            .search(
                &VectorPayload::Sparse {
                    indices: vec![0, 2],
                    values: vec![0.5, 0.8],
                },
                2,
            )
            .unwrap();
        assert_eq!(hits[0].unique_id, 1);
        assert!(hits[0].distance.abs() < 1e-6);
        assert!((hits[1].distance - 2.70).abs() < 1e-2);
    }

    #[test]
    fn dimension_mismatch_is_bad_request() {
        let mut mgr = IndexManager::build(
            1,
            ValueKind::Dense,
            Metric::L2,
            4,
            HnswConfig::default(),
            QuantConfig::None,
            PathBuf::from("/tmp/x.idx"),
        );
        let err = mgr.add(1, &VectorPayload::Dense(vec![1.0, 2.0])).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn restore_from_catalog_populates_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx.idx");
        let mut source_map = StdHashMap::new();
        source_map.insert(
            1i64,
            vec![
                (1i64, VectorPayload::Dense(vec![1.0, 0.0])),
                (2i64, VectorPayload::Dense(vec![0.0, 1.0])),
            ],
        );
        let source = MapSource(source_map);
        let mut mgr = IndexManager::build(
            1,
            ValueKind::Dense,
            Metric::L2,
            2,
            HnswConfig::default(),
            QuantConfig::None,
            path.clone(),
        );
        mgr.restore_from_catalog(&source, false).unwrap();
        assert_eq!(mgr.len(), 2);
        assert!(path.exists());
    }

    #[test]
    fn load_rebuilds_from_catalog_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.idx");
        let source = EmptySource;
        let mut mgr = IndexManager::build(
            1,
            ValueKind::Dense,
            Metric::L2,
            2,
            HnswConfig::default(),
            QuantConfig::None,
            path,
        );
        mgr.load(&source).unwrap();
        assert_eq!(mgr.len(), 0);
    }

    #[test]
    fn multivector_is_persisted_only_not_searchable() {
        let mut mgr = IndexManager::build(
            1,
            ValueKind::MultiVector,
            Metric::L2,
            2,
            HnswConfig::default(),
            QuantConfig::None,
            PathBuf::from("/tmp/mv.idx"),
        );
        let err = mgr
            .add(1, &VectorPayload::MultiVector { rows: 2, data: vec![1.0, 2.0, 3.0, 4.0] })
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
