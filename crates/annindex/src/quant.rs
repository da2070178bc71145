//! Quantizers: train-then-use operators that compress vectors for storage.
//!
//! Search always ranks against the full-precision vectors retained by the
//! graph (see `manager.rs`); the quantizer's codes are a compressed side
//! representation, trained eagerly so a freshly created index is
//! immediately usable even before any vector has been inserted, without
//! requiring the HNSW distance computation itself to become
//! quantization-aware.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use vdb_core::{ProductQuantConfig, ScalarQuantConfig, ScalarType};

/// Fixed seed for the synthetic training sample, so a freshly built
/// quantizer is reproducible across runs.
const SYNTHETIC_SEED: u64 = 0x5EED_BEEF_u64;
/// Number of synthetic training vectors generated when no real data exists.
const SYNTHETIC_SAMPLE_SIZE: usize = 100;

/// Generate a deterministic synthetic sample of `count` random vectors of
/// `dimension`, used to train a quantizer before any real vector exists.
pub fn synthetic_sample(dimension: usize) -> Vec<Vec<f32>> {
    let mut rng = ChaCha8Rng::seed_from_u64(SYNTHETIC_SEED);
    (0..SYNTHETIC_SAMPLE_SIZE)
        .map(|_| (0..dimension).map(|_| rng.gen_range(-1.0f32..1.0f32)).collect())
        .collect()
}

/// Per-dimension scalar quantizer: maps each dimension's `[lo, hi]` range
/// (computed from a training sample, optionally clipped to a quantile) onto
/// the target integer type's full range.
#[derive(Debug, Clone)]
pub struct ScalarQuantizer {
    cfg: ScalarQuantConfig,
    lo: Vec<f32>,
    hi: Vec<f32>,
}

impl ScalarQuantizer {
    /// Train on `samples` (each of length `dimension`). Falls back to the
    /// deterministic synthetic sample when `samples` is empty, per contract.
    pub fn train(cfg: ScalarQuantConfig, dimension: usize, samples: &[Vec<f32>]) -> Self {
        let owned_synthetic;
        let samples = if samples.is_empty() {
            owned_synthetic = synthetic_sample(dimension);
            &owned_synthetic
        } else {
            samples
        };

        let mut lo = vec![f32::MAX; dimension];
        let mut hi = vec![f32::MIN; dimension];
        for sample in samples {
            for (d, &v) in sample.iter().enumerate().take(dimension) {
                if v < lo[d] {
                    lo[d] = v;
                }
                if v > hi[d] {
                    hi[d] = v;
                }
            }
        }
        // Quantile clipping narrows the range symmetrically toward the
        // per-dimension mean, reducing sensitivity to outliers.
        if cfg.quantile < 1.0 {
            for d in 0..dimension {
                let mean = (lo[d] + hi[d]) / 2.0;
                let half_range = (hi[d] - lo[d]) / 2.0 * cfg.quantile;
                lo[d] = mean - half_range;
                hi[d] = mean + half_range;
            }
        }
        Self { cfg, lo, hi }
    }

    /// Encode a full-precision vector into quantized bytes. `Int4` packs two
    /// 4-bit codes per output byte; every other type uses one byte per
    /// dimension (or two for `Fp16`).
    pub fn encode(&self, v: &[f32]) -> Vec<u8> {
        match self.cfg.ty {
            ScalarType::Int8 => v
                .iter()
                .enumerate()
                .map(|(d, &x)| self.code_i8(d, x) as u8)
                .collect(),
            ScalarType::Uint8 => v
                .iter()
                .enumerate()
                .map(|(d, &x)| (self.code_i8(d, x) as i16 + 128) as u8)
                .collect(),
            ScalarType::Int4 => {
                let codes: Vec<u8> = v
                    .iter()
                    .enumerate()
                    .map(|(d, &x)| (((self.code_i8(d, x) as i16 + 128) >> 4) & 0x0F) as u8)
                    .collect();
                codes
                    .chunks(2)
                    .map(|pair| {
                        let lo = pair[0];
                        let hi = pair.get(1).copied().unwrap_or(0);
                        lo | (hi << 4)
                    })
                    .collect()
            }
            ScalarType::Fp16 => v
                .iter()
                .flat_map(|&x| half_bits(x).to_le_bytes())
                .collect(),
        }
    }

    fn code_i8(&self, dim: usize, x: f32) -> i8 {
        let (lo, hi) = (self.lo[dim], self.hi[dim]);
        if hi <= lo {
            return 0;
        }
        let t = ((x - lo) / (hi - lo)).clamp(0.0, 1.0);
        (t * 255.0 - 128.0).round().clamp(-128.0, 127.0) as i8
    }

    /// Trained dimension count.
    pub fn dimension(&self) -> usize {
        self.lo.len()
    }
}

/// Minimal round-to-nearest-even-free IEEE half conversion, good enough for
/// a lossy compressed storage representation (not used in any distance
/// computation this implementation performs).
fn half_bits(x: f32) -> u16 {
    let bits = x.to_bits();
    let sign = (bits >> 16) & 0x8000;
    let exp = ((bits >> 23) & 0xFF) as i32 - 127 + 15;
    let mantissa = (bits >> 13) & 0x3FF;
    if exp <= 0 {
        sign as u16
    } else if exp >= 0x1F {
        (sign | 0x7C00) as u16
    } else {
        (sign | ((exp as u32) << 10) | mantissa) as u16
    }
}

/// Sub-vector product quantizer: splits each vector into `compression`
/// equal-width chunks and learns a 256-centroid codebook per chunk via a
/// fixed-iteration Lloyd's algorithm, seeded deterministically.
#[derive(Debug, Clone)]
pub struct ProductQuantizer {
    cfg: ProductQuantConfig,
    dimension: usize,
    /// `codebooks[chunk][centroid] = Vec<f32>` of length `chunk_width`.
    codebooks: Vec<Vec<Vec<f32>>>,
}

const CENTROIDS_PER_CHUNK: usize = 256;
const KMEANS_ITERATIONS: usize = 8;

impl ProductQuantizer {
    /// Train on `samples`, falling back to the synthetic sample when empty.
    pub fn train(cfg: ProductQuantConfig, dimension: usize, samples: &[Vec<f32>]) -> Self {
        let owned_synthetic;
        let samples = if samples.is_empty() {
            owned_synthetic = synthetic_sample(dimension);
            &owned_synthetic
        } else {
            samples
        };

        let chunks = cfg.compression.max(1).min(dimension.max(1));
        let chunk_width = (dimension + chunks - 1) / chunks;
        let mut codebooks = Vec::with_capacity(chunks);
        let mut rng = ChaCha8Rng::seed_from_u64(SYNTHETIC_SEED ^ 0xC0FFEE);

        for c in 0..chunks {
            let start = c * chunk_width;
            let end = (start + chunk_width).min(dimension);
            let sub: Vec<Vec<f32>> = samples
                .iter()
                .map(|v| v.get(start..end).unwrap_or(&[]).to_vec())
                .filter(|v| !v.is_empty())
                .collect();
            codebooks.push(train_chunk_codebook(&sub, end - start, &mut rng));
        }

        Self {
            cfg,
            dimension,
            codebooks,
        }
    }

    /// Encode a full-precision vector into one centroid index byte per
    /// sub-vector chunk.
    pub fn encode(&self, v: &[f32]) -> Vec<u8> {
        let chunks = self.codebooks.len();
        let chunk_width = (self.dimension + chunks - 1) / chunks;
        (0..chunks)
            .map(|c| {
                let start = c * chunk_width;
                let end = (start + chunk_width).min(v.len());
                let sub = &v[start.min(v.len())..end];
                nearest_centroid(&self.codebooks[c], sub)
            })
            .collect()
    }

    /// Sub-vector chunk count actually used (may be less than `compression`
    /// when `dimension < compression`).
    pub fn chunk_count(&self) -> usize {
        self.codebooks.len()
    }

    /// `always_ram` flag from the trained config.
    pub fn always_ram(&self) -> bool {
        self.cfg.always_ram
    }
}

fn train_chunk_codebook(sub: &[Vec<f32>], width: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f32>> {
    if sub.is_empty() || width == 0 {
        return vec![vec![0.0; width]; 1];
    }
    let k = CENTROIDS_PER_CHUNK.min(sub.len()).max(1);
    // Deterministic initial centroids: sample without replacement via a
    // shuffled index list, seeded RNG guarantees reproducibility.
    let mut indices: Vec<usize> = (0..sub.len()).collect();
    for i in (1..indices.len()).rev() {
        let j = rng.gen_range(0..=i);
        indices.swap(i, j);
    }
    let mut centroids: Vec<Vec<f32>> = indices[..k].iter().map(|&i| sub[i].clone()).collect();

    for _ in 0..KMEANS_ITERATIONS {
        let mut sums = vec![vec![0.0f32; width]; k];
        let mut counts = vec![0usize; k];
        for point in sub {
            let c = nearest_centroid(&centroids, point) as usize;
            counts[c] += 1;
            for (s, &x) in sums[c].iter_mut().zip(point.iter()) {
                *s += x;
            }
        }
        for c in 0..k {
            if counts[c] > 0 {
                for d in 0..width {
                    centroids[c][d] = sums[c][d] / counts[c] as f32;
                }
            }
        }
    }
    centroids
}

fn nearest_centroid(codebook: &[Vec<f32>], point: &[f32]) -> u8 {
    let mut best = 0usize;
    let mut best_dist = f32::MAX;
    for (i, c) in codebook.iter().enumerate() {
        let dist: f32 = c
            .iter()
            .zip(point.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_quantizer_trains_on_synthetic_sample_when_empty() {
        let q = ScalarQuantizer::train(ScalarQuantConfig::default(), 4, &[]);
        assert_eq!(q.dimension(), 4);
        let code = q.encode(&[0.1, -0.2, 0.3, -0.4]);
        assert_eq!(code.len(), 4);
    }

    #[test]
    fn scalar_quantizer_int4_packs_two_per_byte() {
        let cfg = ScalarQuantConfig {
            ty: ScalarType::Int4,
            ..Default::default()
        };
        let q = ScalarQuantizer::train(cfg, 4, &[]);
        let code = q.encode(&[0.1, -0.2, 0.3, -0.4]);
        assert_eq!(code.len(), 2);
    }

    #[test]
    fn product_quantizer_encodes_one_byte_per_chunk() {
        let cfg = ProductQuantConfig::default();
        let q = ProductQuantizer::train(cfg, 8, &[]);
        let code = q.encode(&[0.1; 8]);
        assert_eq!(code.len(), q.chunk_count());
    }
}
