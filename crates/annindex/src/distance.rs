//! Distance/similarity functions for the three supported metrics.
//!
//! Single-threaded, allocation-free per-pair functions for the three
//! supported metrics.
//!
//! The graph itself is metric-agnostic: [`similarity`] always returns a
//! "higher = more similar" score, which is what the HNSW beam search
//! compares. The externally reported `distance` field, however, does not
//! follow a single uniform convention — see [`report`] and DESIGN.md for
//! why.
//! Cosine is realised as inner-product on L2-normalised vectors;
//! [`normalize`] is applied once at insert/query time by the caller, never
//! implicitly inside these functions (no hidden renormalisation of raw
//! vectors passed to `similarity`).

use vdb_core::Metric;

/// Squared Euclidean (L2) distance. The graph and the externally reported
/// `distance` field both use the squared form, not the square root.
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// True Euclidean (L2) distance, provided for callers that need it; not used
/// by [`similarity`]/[`report`] (see [`l2_squared`]).
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    l2_squared(a, b).sqrt()
}

/// Raw dot product.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2 norm (Euclidean length).
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Return a copy of `v` scaled to unit L2 norm; a zero vector is returned
/// unchanged (there is no meaningful direction to normalise to).
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm == 0.0 {
        v.to_vec()
    } else {
        v.iter().map(|x| x / norm).collect()
    }
}

/// "Higher = more similar" score used internally by the graph, uniform
/// across metrics so the beam search never branches on metric.
///
/// For `L2` this is negated squared distance; for `Cosine` the caller is
/// expected to have pre-normalised both `a` and `b`, so this is the cosine
/// similarity itself; for `InnerProduct` it is the raw dot product.
pub fn similarity(a: &[f32], b: &[f32], metric: Metric) -> f32 {
    match metric {
        Metric::L2 => -l2_squared(a, b),
        Metric::Cosine | Metric::InnerProduct => dot_product(a, b),
    }
}

/// Convert an internal similarity score to the externally reported
/// `distance` field.
///
/// `L2` is reported as ascending squared distance (`-similarity`); `Cosine`
/// and `InnerProduct` are reported as their raw similarity score, descending
/// (larger = closer) — the "inner-product-on-unit" realisation used literally
/// by the worked Cosine example. See DESIGN.md for the rationale.
pub fn report(similarity: f32, metric: Metric) -> f32 {
    match metric {
        Metric::L2 => -similarity,
        Metric::Cosine | Metric::InnerProduct => similarity,
    }
}

/// `true` when `a` should sort ahead of `b` for `metric` ("closest first").
pub fn is_better(a: f32, b: f32, metric: Metric) -> bool {
    match metric {
        Metric::L2 => a < b,
        Metric::Cosine | Metric::InnerProduct => a > b,
    }
}
