//! The Laplace-HDC codec: a learned, structure-preserving transform between
//! the geometric embedding space and the bipolar hypervector space.
//!
//! `fit` computes a random spectral projection from a sinusoidal ("Laplace")
//! kernel of the sample cosine-similarity matrix; `encode` applies it with a
//! sign nonlinearity; `decode` applies the projection's pseudoinverse as a
//! deterministic, order-preserving probe suitable for constrained cleanup.

use nalgebra::{DMatrix, DVector};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::hdc::{sign_tie_positive, Hypervector};

/// Errors raised by codec operations.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// `encode`/`decode`/`validate` called before `fit`.
    #[error("codec has not been fitted yet")]
    NotFitted,
    /// `fit` called with fewer samples than `N_min` or fewer than `n_components`.
    #[error("insufficient data: have {have}, need at least {need}")]
    InsufficientData { have: usize, need: usize },
    /// An input vector's length didn't match the configured dimension.
    #[error("shape error: expected dimension {expected}, got {got}")]
    ShapeError { expected: usize, got: usize },
    /// A NaN or infinite value appeared in an input vector.
    #[error("numeric error: {0}")]
    NumericError(String),
}

/// Result of [`LaplaceCodec::validate`].
#[derive(Debug, Clone, Copy)]
pub struct ValidationReport {
    /// Every output component was in {-1, +1}.
    pub bipolar: bool,
    /// Output shapes matched the configured `D`.
    pub shape_ok: bool,
    /// Pearson correlation between input cosine similarities and output
    /// Hamming similarities on the held-out sample's pairs.
    pub correlation: f64,
    /// `correlation >= threshold` — the codec is "structure-preserving".
    pub structure_preserving: bool,
}

/// A fitted Laplace-HDC codec. Immutable once `fit` returns; a new codec is
/// built (never mutated) on refit and published via an atomic pointer swap
/// (see `crate::maintenance`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaplaceCodec {
    d: usize,
    capital_d: usize,
    n_components: usize,
    seed: u64,
    /// Projection matrix, shape (D x d).
    p: DMatrix<f64>,
    /// Pseudoinverse of `P^T` (shape d x D), shape (D x d): the decode map.
    pt_pinv: DMatrix<f64>,
    tag: String,
}

/// Minimum correlation (property P7) for a fit to be considered structure-preserving.
pub const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.5;

fn check_finite(rows: &[Vec<f32>]) -> Result<(), CodecError> {
    for row in rows {
        if row.iter().any(|x| !x.is_finite()) {
            return Err(CodecError::NumericError(
                "embedding contains NaN or infinite value".to_string(),
            ));
        }
    }
    Ok(())
}

fn l2_normalize_rows(m: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = m.clone();
    for r in 0..out.nrows() {
        let norm = out.row(r).norm();
        if norm > 0.0 {
            for c in 0..out.ncols() {
                out[(r, c)] /= norm;
            }
        }
    }
    out
}

fn embeddings_to_matrix(embeddings: &[Vec<f32>], expected_d: usize) -> Result<DMatrix<f64>, CodecError> {
    check_finite(embeddings)?;
    for e in embeddings {
        if e.len() != expected_d {
            return Err(CodecError::ShapeError {
                expected: expected_d,
                got: e.len(),
            });
        }
    }
    let n = embeddings.len();
    Ok(DMatrix::from_fn(n, expected_d, |r, c| embeddings[r][c] as f64))
}

fn tag_for(d: usize, capital_d: usize, n_components: usize, seed: u64, p: &DMatrix<f64>) -> String {
    let mut hasher = DefaultHasher::new();
    for v in p.iter() {
        v.to_bits().hash(&mut hasher);
    }
    let fingerprint = hasher.finish();
    format!("lhdc-d{d}-D{capital_d}-n{n_components}-s{seed:x}-f{fingerprint:x}")
}

impl LaplaceCodec {
    /// Fit a codec from a sample of geometric embeddings.
    ///
    /// 1. Cosine similarity matrix over L2-normalized rows.
    /// 2. Laplace kernel transform `W = sin(2*pi*K)`.
    /// 3. Symmetric eigendecomposition of `W`, keeping the top `n_components`
    ///    eigenpairs by eigenvalue magnitude.
    /// 4. Nystrom extension of the retained sample-space eigenvectors back
    ///    into the `d`-dimensional embedding space (`V = Xn^T * U_k`), then a
    ///    random Gaussian projection `P = G * diag(sqrt(max(0, lambda))) * V^T`.
    /// 5. The pseudoinverse of `P^T` is cached for `decode`.
    pub fn fit(
        sample_embeddings: &[Vec<f32>],
        capital_d: usize,
        n_components: usize,
        seed: u64,
    ) -> Result<Self, CodecError> {
        let n = sample_embeddings.len();
        if n < n_components.max(2) {
            return Err(CodecError::InsufficientData {
                have: n,
                need: n_components.max(2),
            });
        }
        let d = sample_embeddings[0].len();
        let x = embeddings_to_matrix(sample_embeddings, d)?;
        let xn = l2_normalize_rows(&x);

        // Step 1-2: cosine similarity matrix, Laplace kernel transform.
        let k = &xn * xn.transpose();
        let w = k.map(|v| (2.0 * std::f64::consts::PI * v).sin());

        // Step 3: symmetric eigendecomposition, keep top n_components by |lambda|.
        let eig = nalgebra::SymmetricEigen::new(w);
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            eig.eigenvalues[b]
                .abs()
                .partial_cmp(&eig.eigenvalues[a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let kept: Vec<usize> = order.into_iter().take(n_components).collect();
        let lambda = DVector::from_fn(kept.len(), |i, _| eig.eigenvalues[kept[i]]);
        let u_k = DMatrix::from_fn(n, kept.len(), |r, c| eig.eigenvectors[(r, kept[c])]);

        // Step 4: Nystrom extension into embedding space, then random projection.
        let v = xn.transpose() * &u_k; // (d x n_components)

        let mut rng = StdRng::seed_from_u64(seed);
        let g = DMatrix::from_fn(capital_d, kept.len(), |_, _| rng.sample(StandardNormal));
        let diag_sqrt = DVector::from_fn(kept.len(), |i, _| lambda[i].max(0.0).sqrt());
        let scaled_vt = DMatrix::from_fn(kept.len(), d, |r, c| v[(c, r)] * diag_sqrt[r]);
        let p = g * scaled_vt; // (D x d)

        // Step 5: cache the decode map.
        let pt = p.transpose(); // (d x D)
        let svd = nalgebra::linalg::SVD::new(pt, true, true);
        let pt_pinv = svd
            .pseudo_inverse(1e-10)
            .map_err(|e| CodecError::NumericError(format!("pseudoinverse failed: {e}")))?;

        let tag = tag_for(d, capital_d, n_components, seed, &p);

        Ok(Self {
            d,
            capital_d,
            n_components,
            seed,
            p,
            pt_pinv,
            tag,
        })
    }

    pub fn d(&self) -> usize {
        self.d
    }

    pub fn capital_d(&self) -> usize {
        self.capital_d
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Serialize the fit codec parameters to a JSON blob, for persistence
    /// keyed by [`LaplaceCodec::tag`] (see `crate::store::ConceptStore`'s
    /// codec table).
    pub fn to_json(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(|e| CodecError::NumericError(e.to_string()))
    }

    /// Reconstruct a codec previously serialized with [`LaplaceCodec::to_json`].
    pub fn from_json(blob: &str) -> Result<Self, CodecError> {
        serde_json::from_str(blob).map_err(|e| CodecError::NumericError(e.to_string()))
    }

    /// `H = sign(X * P^T)`, ties resolving to +1.
    pub fn encode(&self, embeddings: &[Vec<f32>]) -> Result<Vec<Hypervector>, CodecError> {
        let x = embeddings_to_matrix(embeddings, self.d)?;
        let projected = &x * self.p.transpose(); // (n x D)
        Ok((0..projected.nrows())
            .map(|r| {
                (0..projected.ncols())
                    .map(|c| sign_tie_positive(projected[(r, c)]))
                    .collect::<Hypervector>()
            })
            .collect())
    }

    /// `X_hat = H * (P^T)^+`, a deterministic approximate inverse suitable as
    /// an immediate probe for constrained nearest-neighbor cleanup.
    pub fn decode(&self, hypervectors: &[Hypervector]) -> Result<Vec<Vec<f32>>, CodecError> {
        for h in hypervectors {
            if h.len() != self.capital_d {
                return Err(CodecError::ShapeError {
                    expected: self.capital_d,
                    got: h.len(),
                });
            }
        }
        let n = hypervectors.len();
        let h = DMatrix::from_fn(n, self.capital_d, |r, c| hypervectors[r][c] as f64);
        let reconstructed = h * &self.pt_pinv; // (n x d)
        Ok((0..n)
            .map(|r| (0..self.d).map(|c| reconstructed[(r, c)] as f32).collect())
            .collect())
    }

    /// Property P7: Pearson correlation between cosine-similarity pairs on
    /// the held-out sample and Hamming-similarity pairs on their encodings.
    pub fn validate(&self, sample: &[Vec<f32>]) -> Result<ValidationReport, CodecError> {
        self.validate_with_threshold(sample, DEFAULT_CORRELATION_THRESHOLD)
    }

    pub fn validate_with_threshold(
        &self,
        sample: &[Vec<f32>],
        threshold: f64,
    ) -> Result<ValidationReport, CodecError> {
        let encoded = self.encode(sample)?;
        let bipolar = encoded
            .iter()
            .all(|h| crate::hdc::is_bipolar(h) && h.len() == self.capital_d);
        let shape_ok = sample.iter().all(|e| e.len() == self.d);

        let mut cosine_pairs = Vec::new();
        let mut hamming_pairs = Vec::new();
        for i in 0..sample.len() {
            for j in (i + 1)..sample.len() {
                cosine_pairs.push(cosine_similarity(&sample[i], &sample[j]));
                hamming_pairs.push(hamming_similarity(&encoded[i], &encoded[j]));
            }
        }
        let correlation = pearson_correlation(&cosine_pairs, &hamming_pairs);

        Ok(ValidationReport {
            bipolar,
            shape_ok,
            correlation,
            structure_preserving: correlation >= threshold,
        })
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum();
    let norm_a: f64 = a.iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn hamming_similarity(a: &[i8], b: &[i8]) -> f64 {
    let agree = a.iter().zip(b).filter(|(&x, &y)| x == y).count();
    agree as f64 / a.len() as f64
}

fn pearson_correlation(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    if xs.len() < 2 {
        return 0.0;
    }
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        0.0
    } else {
        cov / (var_x.sqrt() * var_y.sqrt())
    }
}
