//! A from-scratch HNSW (Hierarchical Navigable Small World) graph.
//!
//! `BTreeMap`/`BTreeSet` node storage for deterministic iteration, a
//! fixed-seed splitmix64 PRNG with a monotonic counter for level assignment
//! (so identical insert sequences produce identical graphs), and
//! mark-and-skip soft delete so deleted nodes remain usable as waypoints.
//! Unlike a graph-only structure that defers embedding storage to a
//! separate heap shared with a brute-force backend, this graph owns its
//! embeddings directly — there is no brute-force fallback to share storage
//! with.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use serde::{Deserialize, Serialize};
use vdb_core::{HnswConfig, Metric};

use crate::distance::similarity;

/// Internal ANN label. Distinct from the catalog's `unique_id`; the
/// `IndexManager` owns the mapping between the two.
pub type Label = u32;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    neighbors: Vec<BTreeSet<Label>>,
    max_layer: usize,
    deleted: bool,
}

impl Node {
    fn new(max_layer: usize) -> Self {
        Self {
            neighbors: (0..=max_layer).map(|_| BTreeSet::new()).collect(),
            max_layer,
            deleted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Scored {
    score: f32,
    label: Label,
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.label.cmp(&self.label))
    }
}

/// A single-index HNSW graph. All stored and queried vectors must already be
/// in the representation the metric expects (Cosine callers pre-normalise).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswGraph {
    config: HnswConfig,
    metric: Metric,
    dimension: usize,
    ml: f64,
    nodes: BTreeMap<Label, Node>,
    vectors: BTreeMap<Label, Vec<f32>>,
    entry_point: Option<Label>,
    max_level: usize,
    rng_seed: u64,
    rng_counter: u64,
}

impl HnswGraph {
    /// Create an empty graph for `dimension`-length vectors under `metric`.
    pub fn new(dimension: usize, metric: Metric, config: HnswConfig) -> Self {
        let ml = 1.0 / (config.m.max(2) as f64).ln();
        Self {
            config,
            metric,
            dimension,
            ml,
            nodes: BTreeMap::new(),
            vectors: BTreeMap::new(),
            entry_point: None,
            max_level: 0,
            rng_seed: 0x5EED,
            rng_counter: 0,
        }
    }

    /// Number of live (non-deleted) points.
    pub fn len(&self) -> usize {
        self.nodes.values().filter(|n| !n.deleted).count()
    }

    /// `true` if there are no live points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if `label` is a live point.
    pub fn contains(&self, label: Label) -> bool {
        self.nodes.get(&label).map(|n| !n.deleted).unwrap_or(false)
    }

    /// Full-precision embedding for `label`, if present (live or deleted).
    pub fn get(&self, label: Label) -> Option<&[f32]> {
        self.vectors.get(&label).map(|v| v.as_slice())
    }

    /// All labels present, deterministically ordered ascending.
    pub fn labels(&self) -> Vec<Label> {
        self.nodes.keys().copied().collect()
    }

    fn splitmix64(&self, mut x: u64) -> u64 {
        x = x.wrapping_add(0x9e3779b97f4a7c15);
        x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
        x ^ (x >> 31)
    }

    fn assign_level(&mut self) -> usize {
        self.rng_counter += 1;
        let hash = self.splitmix64(self.rng_seed.wrapping_add(self.rng_counter));
        let uniform = ((hash as f64) / (u64::MAX as f64)).max(1e-15);
        (-uniform.ln() * self.ml) as usize
    }

    /// Insert or replace the embedding at `label`. Dimension is the caller's
    /// responsibility (`IndexManager` validates before calling in).
    pub fn insert(&mut self, label: Label, vector: Vec<f32>) {
        if self.nodes.contains_key(&label) {
            self.remove_edges(label);
        }
        let level = self.assign_level();
        self.vectors.insert(label, vector);
        let mut node = Node::new(level);

        let entry = match self.entry_point {
            Some(e) => e,
            None => {
                self.nodes.insert(label, node);
                self.entry_point = Some(label);
                self.max_level = level;
                return;
            }
        };

        let query = self.vectors[&label].clone();
        let mut current = self.greedy_search_to_layer(&query, entry, self.max_level, level + 1);

        for layer in (0..=level.min(self.max_level)).rev() {
            let max_conn = self.max_connections(layer);
            let candidates = self.search_layer(&query, current, self.config.ef_construction, layer);
            let selected = self.select_neighbors(&candidates, max_conn);
            for &neighbor in &selected {
                node.neighbors[layer].insert(neighbor);
                if let Some(n) = self.nodes.get_mut(&neighbor) {
                    if layer < n.neighbors.len() {
                        n.neighbors[layer].insert(label);
                    }
                }
                self.prune_neighbors(neighbor, layer, max_conn);
            }
            if let Some(&best) = selected.first() {
                current = best;
            }
        }

        self.nodes.insert(label, node);
        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(label);
        }
    }

    /// Soft-delete `label`; it remains a graph waypoint but is excluded from
    /// results and from `len()`.
    pub fn delete(&mut self, label: Label) -> bool {
        match self.nodes.get_mut(&label) {
            Some(n) if !n.deleted => {
                n.deleted = true;
                true
            }
            _ => false,
        }
    }

    fn remove_edges(&mut self, label: Label) {
        if let Some(node) = self.nodes.get(&label).cloned() {
            for (layer, set) in node.neighbors.iter().enumerate() {
                for &other in set {
                    if let Some(n) = self.nodes.get_mut(&other) {
                        if layer < n.neighbors.len() {
                            n.neighbors[layer].remove(&label);
                        }
                    }
                }
            }
        }
    }

    fn max_connections(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m * 2
        } else {
            self.config.m
        }
    }

    fn select_neighbors(&self, candidates: &[Scored], max_connections: usize) -> Vec<Label> {
        candidates.iter().take(max_connections).map(|c| c.label).collect()
    }

    fn prune_neighbors(&mut self, label: Label, layer: usize, max_connections: usize) {
        let Some(embedding) = self.vectors.get(&label).cloned() else {
            return;
        };
        let neighbors: Vec<Label> = match self.nodes.get(&label) {
            Some(n) if layer < n.neighbors.len() => n.neighbors[layer].iter().copied().collect(),
            _ => return,
        };
        if neighbors.len() <= max_connections {
            return;
        }
        let mut scored: Vec<Scored> = neighbors
            .iter()
            .filter_map(|&nid| {
                self.vectors
                    .get(&nid)
                    .map(|emb| Scored {
                        score: similarity(&embedding, emb, self.metric),
                        label: nid,
                    })
            })
            .collect();
        scored.sort();
        scored.reverse();
        let keep: BTreeSet<Label> = scored.into_iter().take(max_connections).map(|s| s.label).collect();
        if let Some(n) = self.nodes.get_mut(&label) {
            n.neighbors[layer] = keep;
        }
    }

    fn greedy_search_to_layer(&self, query: &[f32], entry: Label, from_layer: usize, to_layer_exclusive: usize) -> Label {
        let mut current = entry;
        if to_layer_exclusive > from_layer {
            return current;
        }
        for layer in (to_layer_exclusive..=from_layer).rev() {
            loop {
                let Some(current_emb) = self.vectors.get(&current) else {
                    break;
                };
                let current_score = similarity(query, current_emb, self.metric);
                let mut best_score = current_score;
                let mut best = current;
                if let Some(node) = self.nodes.get(&current) {
                    if layer < node.neighbors.len() {
                        for &n in &node.neighbors[layer] {
                            if let Some(emb) = self.vectors.get(&n) {
                                let score = similarity(query, emb, self.metric);
                                if score > best_score || (score == best_score && n < best) {
                                    best_score = score;
                                    best = n;
                                }
                            }
                        }
                    }
                }
                if best == current {
                    break;
                }
                current = best;
            }
        }
        current
    }

    fn search_layer(&self, query: &[f32], entry: Label, ef: usize, layer: usize) -> Vec<Scored> {
        let Some(entry_emb) = self.vectors.get(&entry) else {
            return Vec::new();
        };
        let entry_score = similarity(query, entry_emb, self.metric);
        let mut visited = BTreeSet::new();
        visited.insert(entry);

        let mut candidates = BinaryHeap::new();
        candidates.push(Scored {
            score: entry_score,
            label: entry,
        });

        let mut results: BinaryHeap<Reverse<Scored>> = BinaryHeap::new();
        let entry_deleted = self.nodes.get(&entry).map(|n| n.deleted).unwrap_or(false);
        if !entry_deleted {
            results.push(Reverse(Scored {
                score: entry_score,
                label: entry,
            }));
        }

        while let Some(nearest) = candidates.pop() {
            let worst = results.peek().map(|r| r.0.score).unwrap_or(f32::NEG_INFINITY);
            if nearest.score < worst && results.len() >= ef {
                break;
            }
            let Some(node) = self.nodes.get(&nearest.label) else {
                continue;
            };
            if layer >= node.neighbors.len() {
                continue;
            }
            for &neighbor in &node.neighbors[layer] {
                if visited.contains(&neighbor) {
                    continue;
                }
                visited.insert(neighbor);
                let Some(emb) = self.vectors.get(&neighbor) else {
                    continue;
                };
                let score = similarity(query, emb, self.metric);
                let worst = results.peek().map(|r| r.0.score).unwrap_or(f32::NEG_INFINITY);
                if results.len() < ef || score > worst {
                    candidates.push(Scored { score, label: neighbor });
                    let deleted = self.nodes.get(&neighbor).map(|n| n.deleted).unwrap_or(false);
                    if !deleted {
                        results.push(Reverse(Scored { score, label: neighbor }));
                        if results.len() > ef {
                            results.pop();
                        }
                    }
                }
            }
        }

        let mut out: Vec<Scored> = results.into_iter().map(|r| r.0).collect();
        out.sort();
        out.reverse();
        out
    }

    /// Search for up to `k` nearest live points to `query`, returning
    /// `(label, similarity)` pairs best-first (highest similarity first —
    /// the graph's internal convention; `IndexManager` converts to the
    /// externally reported score).
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(Label, f32)> {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };
        let ef = self.config.ef_search.max(k);
        let current = self.greedy_search_to_layer(query, entry, self.max_level, 1);
        let mut results = self.search_layer(query, current, ef, 0);
        results.retain(|s| !self.nodes.get(&s.label).map(|n| n.deleted).unwrap_or(true));
        results.truncate(k);
        results.into_iter().map(|s| (s.label, s.score)).collect()
    }

    /// The graph's dimension, for validation at the `IndexManager` layer.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The graph's metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> HnswConfig {
        HnswConfig {
            m: 8,
            ef_construction: 64,
            ef_search: 32,
        }
    }

    #[test]
    fn search_returns_exact_match_first_for_l2() {
        let mut g = HnswGraph::new(4, Metric::L2, cfg());
        g.insert(1, vec![0.25, 0.45, 0.75, 0.85]);
        g.insert(2, vec![0.20, 0.62, 0.77, 0.75]);
        let results = g.search(&[0.25, 0.45, 0.75, 0.85], 2);
        assert_eq!(results[0].0, 1);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn deleted_points_are_excluded_from_results() {
        let mut g = HnswGraph::new(2, Metric::L2, cfg());
        g.insert(1, vec![0.0, 0.0]);
        g.insert(2, vec![1.0, 1.0]);
        g.delete(1);
        let results = g.search(&[0.0, 0.0], 2);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 2);
    }

    #[test]
    fn insert_is_idempotent_on_same_label() {
        let mut g = HnswGraph::new(2, Metric::L2, cfg());
        g.insert(1, vec![0.0, 0.0]);
        g.insert(1, vec![5.0, 5.0]);
        assert_eq!(g.len(), 1);
        assert_eq!(g.get(1), Some([5.0, 5.0].as_slice()));
    }

    #[test]
    fn cosine_orders_by_similarity_descending() {
        let mut g = HnswGraph::new(3, Metric::Cosine, cfg());
        let e1 = crate::distance::normalize(&[1.0, 0.0, 0.0]);
        let e2 = crate::distance::normalize(&[0.0, 1.0, 0.0]);
        let neg_e1 = crate::distance::normalize(&[-1.0, 0.0, 0.0]);
        g.insert(1, e1.clone());
        g.insert(2, e2);
        g.insert(3, neg_e1);
        let results = g.search(&e1, 3);
        assert_eq!(results[0].0, 1);
        assert_eq!(results[2].0, 3);
    }
}
