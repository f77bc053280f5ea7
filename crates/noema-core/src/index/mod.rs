//! Federated Vector Index (C3): L1 geometric ANN over embeddings and L2
//! algebraic ANN over hypervectors, both kept consistent with the concept
//! store by the maintenance sync worker (`crate::maintenance`).

mod algebraic;
mod geometric;

pub use algebraic::AlgebraicIndex;
pub use geometric::GeometricIndex;

use crate::oid::Oid;

/// Errors shared by both sub-indexes.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// A query or inserted vector didn't match the index's configured dimension.
    #[error("shape error: expected dimension {expected}, got {got}")]
    ShapeError { expected: usize, got: usize },
    /// L2 was searched before `build()`/`rebuild_from_store()` ran.
    #[error("index not built yet; call build() or rebuild_from_store() first")]
    IndexNotBuilt,
}

/// A single search hit: the concept's OID and its similarity score.
pub type ScoredOid = (Oid, f32);

/// Aggregate counters returned by `stats()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexStats {
    pub total_vectors: usize,
    pub tombstoned: usize,
    pub dimensions: usize,
}

/// Sort hits by similarity descending, ties broken by OID ascending (the
/// deterministic ordering L1's `search` contract requires), then truncate to `k`.
pub(crate) fn rank_and_truncate(mut hits: Vec<ScoredOid>, k: usize) -> Vec<ScoredOid> {
    hits.sort_by(|(oid_a, score_a), (oid_b, score_b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| oid_a.cmp(oid_b))
    });
    hits.truncate(k);
    hits
}

pub(crate) fn cosine_f32(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(&x, &y)| x * y).sum();
    let norm_a = a.iter().map(|&x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub(crate) fn normalize_f32(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        v.to_vec()
    } else {
        v.iter().map(|&x| x / norm).collect()
    }
}

pub(crate) fn cosine_bipolar(a: &[i8], b: &[i8]) -> f32 {
    let dim = a.len() as f32;
    let dot: i64 = a.iter().zip(b).map(|(&x, &y)| (x as i64) * (y as i64)).sum();
    // Bipolar vectors all have norm sqrt(D), so cosine reduces to dot / D.
    dot as f32 / dim
}
