//! L1: geometric index over concept embeddings.
//!
//! A flat, brute-force cosine index rather than an HNSW graph (see
//! `crate::index` and the crate's design notes for why `usearch` was not
//! carried into this component): AGL's `constrained_search` must be exact
//! over an arbitrary caller-supplied candidate set, which an HNSW graph
//! cannot serve without either an approximate-then-filter degradation or a
//! per-query rebuilt sub-index. A flat scan is exact by construction and the
//! candidate set sizes this component is built for (spec's sub-10^6 concept
//! counts) keep a linear scan well within budget.

use super::{cosine_f32, normalize_f32, rank_and_truncate, IndexError, IndexStats, ScoredOid};
use crate::oid::Oid;
use std::collections::{HashMap, HashSet};

/// Flat cosine index over L1 (geometric) embeddings.
#[derive(Debug, Default)]
pub struct GeometricIndex {
    dimensions: Option<usize>,
    vectors: HashMap<Oid, Vec<f32>>,
    tombstones: HashSet<Oid>,
}

impl GeometricIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Insert or replace the embedding for `oid`. Vectors are normalized on
    /// insertion so `search`'s cosine computation is a dot product.
    pub fn add(&mut self, oid: Oid, embedding: &[f32]) -> Result<(), IndexError> {
        if let Some(dim) = self.dimensions {
            if embedding.len() != dim {
                return Err(IndexError::ShapeError {
                    expected: dim,
                    got: embedding.len(),
                });
            }
        } else {
            self.dimensions = Some(embedding.len());
        }
        self.tombstones.remove(&oid);
        self.vectors.insert(oid, normalize_f32(embedding));
        Ok(())
    }

    /// Logically remove `oid`: the vector stays in place but is excluded
    /// from every lookup until a `compact` drops it for good. Returns
    /// `true` if `oid` was live (present and not already tombstoned).
    pub fn remove(&mut self, oid: &Oid) -> bool {
        if self.tombstones.contains(oid) {
            return false;
        }
        if self.vectors.contains_key(oid) {
            self.tombstones.insert(oid.clone());
            true
        } else {
            false
        }
    }

    pub fn contains(&self, oid: &Oid) -> bool {
        self.vectors.contains_key(oid) && !self.tombstones.contains(oid)
    }

    /// Fraction of the index's vectors that are currently tombstoned.
    pub fn tombstone_fraction(&self) -> f32 {
        if self.vectors.is_empty() {
            0.0
        } else {
            self.tombstones.len() as f32 / self.vectors.len() as f32
        }
    }

    /// Drop every tombstoned vector for good, if the tombstoned fraction
    /// exceeds `watermark`. Returns `true` if a compaction actually ran.
    pub fn compact_if_needed(&mut self, watermark: f32) -> bool {
        if self.tombstone_fraction() <= watermark {
            return false;
        }
        let tombstoned: Vec<Oid> = self.tombstones.drain().collect();
        for oid in tombstoned {
            self.vectors.remove(&oid);
        }
        true
    }

    /// Unconstrained top-`k` search by cosine similarity over every live
    /// (non-tombstoned) vector, keeping only hits with similarity at least
    /// `threshold`.
    pub fn search(&self, query: &[f32], k: usize, threshold: f32) -> Result<Vec<ScoredOid>, IndexError> {
        if let Some(dim) = self.dimensions {
            if query.len() != dim {
                return Err(IndexError::ShapeError {
                    expected: dim,
                    got: query.len(),
                });
            }
        }
        let q = normalize_f32(query);
        let hits: Vec<ScoredOid> = self
            .vectors
            .iter()
            .filter(|(oid, _)| !self.tombstones.contains(*oid))
            .map(|(oid, v)| (oid.clone(), cosine_f32(&q, v)))
            .filter(|(_, score)| *score >= threshold)
            .collect();
        Ok(rank_and_truncate(hits, k))
    }

    /// Top-`k` search restricted to `candidates`, keeping only hits with
    /// similarity at least `threshold`. Exact: every candidate not present,
    /// tombstoned, or below `threshold` is silently skipped rather than
    /// erroring, since AGL may hand in OIDs this index hasn't indexed yet.
    pub fn constrained_search(
        &self,
        query: &[f32],
        candidates: &[Oid],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredOid>, IndexError> {
        if let Some(dim) = self.dimensions {
            if query.len() != dim {
                return Err(IndexError::ShapeError {
                    expected: dim,
                    got: query.len(),
                });
            }
        }
        let q = normalize_f32(query);
        let hits: Vec<ScoredOid> = candidates
            .iter()
            .filter(|oid| !self.tombstones.contains(oid))
            .filter_map(|oid| self.vectors.get(oid).map(|v| (oid.clone(), cosine_f32(&q, v))))
            .filter(|(_, score)| *score >= threshold)
            .collect();
        Ok(rank_and_truncate(hits, k))
    }

    /// Run `search` for each query in `queries`, in order.
    pub fn batch_search(
        &self,
        queries: &[Vec<f32>],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<Vec<ScoredOid>>, IndexError> {
        queries.iter().map(|q| self.search(q, k, threshold)).collect()
    }

    /// Drop all tombstoned entries and rebuild the live set from `live`.
    pub fn rebuild_from_store<'a, I>(&mut self, live: I) -> Result<(), IndexError>
    where
        I: IntoIterator<Item = (Oid, &'a [f32])>,
    {
        self.vectors.clear();
        self.tombstones.clear();
        self.dimensions = None;
        for (oid, embedding) in live {
            self.add(oid, embedding)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_vectors: self.vectors.len() - self.tombstones.len(),
            tombstoned: self.tombstones.len(),
            dimensions: self.dimensions.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid() -> Oid {
        Oid::new()
    }

    #[test]
    fn search_returns_self_first_for_identical_query() {
        let mut idx = GeometricIndex::new();
        let a = oid();
        let b = oid();
        idx.add(a.clone(), &[1.0, 0.0, 0.0]).unwrap();
        idx.add(b.clone(), &[0.0, 1.0, 0.0]).unwrap();

        let hits = idx.search(&[1.0, 0.0, 0.0], 2, 0.0).unwrap();
        assert_eq!(hits[0].0, a);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut idx = GeometricIndex::new();
        idx.add(oid(), &[1.0, 0.0]).unwrap();
        let err = idx.search(&[1.0, 0.0, 0.0], 1, 0.0).unwrap_err();
        assert!(matches!(err, IndexError::ShapeError { expected: 2, got: 3 }));
    }

    #[test]
    fn threshold_filters_out_dissimilar_hits() {
        let mut idx = GeometricIndex::new();
        let close = oid();
        let far = oid();
        idx.add(close.clone(), &[1.0, 0.0]).unwrap();
        idx.add(far.clone(), &[0.0, 1.0]).unwrap();

        let hits = idx.search(&[1.0, 0.0], 5, 0.5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, close);
    }

    #[test]
    fn constrained_search_only_considers_candidates() {
        let mut idx = GeometricIndex::new();
        let a = oid();
        let b = oid();
        idx.add(a.clone(), &[1.0, 0.0]).unwrap();
        idx.add(b.clone(), &[0.99, 0.01]).unwrap();

        let hits = idx.constrained_search(&[1.0, 0.0], &[b.clone()], 5, 0.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, b);
    }

    #[test]
    fn constrained_search_ignores_unknown_candidates() {
        let idx = GeometricIndex::new();
        let hits = idx.constrained_search(&[1.0], &[oid()], 5, 0.0).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn remove_is_logical_until_compaction() {
        let mut idx = GeometricIndex::new();
        let a = oid();
        idx.add(a.clone(), &[1.0, 0.0]).unwrap();
        assert!(idx.remove(&a));
        assert!(idx.search(&[1.0, 0.0], 5, 0.0).unwrap().is_empty());
        assert_eq!(idx.stats().tombstoned, 1);
        // A second remove of an already-tombstoned oid is a no-op.
        assert!(!idx.remove(&a));
    }

    #[test]
    fn compact_if_needed_only_runs_past_the_watermark() {
        let mut idx = GeometricIndex::new();
        let a = oid();
        let b = oid();
        idx.add(a.clone(), &[1.0, 0.0]).unwrap();
        idx.add(b.clone(), &[0.0, 1.0]).unwrap();
        idx.remove(&a);

        // Tombstoned fraction is 1/2; a watermark of 0.6 shouldn't trigger.
        assert!(!idx.compact_if_needed(0.6));
        assert_eq!(idx.stats().tombstoned, 1);

        assert!(idx.compact_if_needed(0.1));
        assert_eq!(idx.stats().tombstoned, 0);
        assert_eq!(idx.stats().total_vectors, 1);
    }

    #[test]
    fn re_adding_a_tombstoned_oid_resurrects_it() {
        let mut idx = GeometricIndex::new();
        let a = oid();
        idx.add(a.clone(), &[1.0, 0.0]).unwrap();
        idx.remove(&a);
        idx.add(a.clone(), &[1.0, 0.0]).unwrap();
        assert!(idx.contains(&a));
        assert_eq!(idx.stats().tombstoned, 0);
    }

    #[test]
    fn rebuild_from_store_resets_state() {
        let mut idx = GeometricIndex::new();
        idx.add(oid(), &[1.0, 0.0]).unwrap();

        let a = oid();
        let vecs = vec![(a.clone(), vec![0.0, 1.0])];
        idx.rebuild_from_store(vecs.iter().map(|(o, v)| (o.clone(), v.as_slice())))
            .unwrap();

        assert_eq!(idx.stats().total_vectors, 1);
        assert!(idx.contains(&a));
    }
}
