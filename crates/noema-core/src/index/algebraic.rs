//! L2: algebraic index over concept hypervectors.
//!
//! Same flat, brute-force shape as `GeometricIndex` (see `crate::index`) but
//! over bipolar `Vec<i8>` vectors with cosine computed via `cosine_bipolar`.
//! Inserts are buffered and only take effect once `build()` is called, to
//! match the spec's sync-worker usage (bulk stage-then-apply per sweep)
//! rather than one index mutation per insert.

use super::{cosine_bipolar, rank_and_truncate, IndexError, IndexStats, ScoredOid};
use crate::oid::Oid;
use std::collections::{HashMap, HashSet};

/// Flat cosine index over L2 (algebraic) hypervectors.
#[derive(Debug, Default)]
pub struct AlgebraicIndex {
    dimensions: Option<usize>,
    vectors: HashMap<Oid, Vec<i8>>,
    tombstones: HashSet<Oid>,
    pending_upserts: HashMap<Oid, Vec<i8>>,
    pending_removals: HashSet<Oid>,
    built: bool,
}

impl AlgebraicIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Stage an upsert. Not visible to `search` until the next `build()`.
    pub fn stage_upsert(&mut self, oid: Oid, hypervector: &[i8]) -> Result<(), IndexError> {
        if let Some(dim) = self.dimensions {
            if hypervector.len() != dim {
                return Err(IndexError::ShapeError {
                    expected: dim,
                    got: hypervector.len(),
                });
            }
        }
        self.pending_removals.remove(&oid);
        self.pending_upserts.insert(oid, hypervector.to_vec());
        Ok(())
    }

    /// Stage a removal. Not visible to `search` until the next `build()`.
    pub fn stage_removal(&mut self, oid: Oid) {
        self.pending_upserts.remove(&oid);
        self.pending_removals.insert(oid);
    }

    /// Apply every staged upsert/removal, fixing the index's dimension from
    /// the first vector seen if not already set.
    pub fn build(&mut self) -> Result<(), IndexError> {
        for (oid, v) in self.pending_upserts.drain() {
            if self.dimensions.is_none() {
                self.dimensions = Some(v.len());
            }
            self.tombstones.remove(&oid);
            self.vectors.insert(oid, v);
        }
        for oid in self.pending_removals.drain() {
            self.vectors.remove(&oid);
            self.tombstones.insert(oid);
        }
        self.built = true;
        Ok(())
    }

    /// Replace the live set wholesale, e.g. after a codec refit re-encodes
    /// every concept's hypervector.
    pub fn rebuild_from_store<'a, I>(&mut self, live: I) -> Result<(), IndexError>
    where
        I: IntoIterator<Item = (Oid, &'a [i8])>,
    {
        self.vectors.clear();
        self.tombstones.clear();
        self.pending_upserts.clear();
        self.pending_removals.clear();
        self.dimensions = None;
        for (oid, hv) in live {
            if self.dimensions.is_none() {
                self.dimensions = Some(hv.len());
            } else if self.dimensions != Some(hv.len()) {
                return Err(IndexError::ShapeError {
                    expected: self.dimensions.unwrap(),
                    got: hv.len(),
                });
            }
            self.vectors.insert(oid, hv.to_vec());
        }
        self.built = true;
        Ok(())
    }

    pub fn contains(&self, oid: &Oid) -> bool {
        self.vectors.contains_key(oid)
    }

    pub fn search(&self, query: &[i8], k: usize) -> Result<Vec<ScoredOid>, IndexError> {
        if !self.built {
            return Err(IndexError::IndexNotBuilt);
        }
        if let Some(dim) = self.dimensions {
            if query.len() != dim {
                return Err(IndexError::ShapeError {
                    expected: dim,
                    got: query.len(),
                });
            }
        }
        let hits: Vec<ScoredOid> = self
            .vectors
            .iter()
            .map(|(oid, v)| (oid.clone(), cosine_bipolar(query, v)))
            .collect();
        Ok(rank_and_truncate(hits, k))
    }

    /// Exact top-`k` search restricted to `candidates`.
    pub fn constrained_search(
        &self,
        query: &[i8],
        candidates: &[Oid],
        k: usize,
    ) -> Result<Vec<ScoredOid>, IndexError> {
        if !self.built {
            return Err(IndexError::IndexNotBuilt);
        }
        if let Some(dim) = self.dimensions {
            if query.len() != dim {
                return Err(IndexError::ShapeError {
                    expected: dim,
                    got: query.len(),
                });
            }
        }
        let hits: Vec<ScoredOid> = candidates
            .iter()
            .filter_map(|oid| self.vectors.get(oid).map(|v| (oid.clone(), cosine_bipolar(query, v))))
            .collect();
        Ok(rank_and_truncate(hits, k))
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_vectors: self.vectors.len(),
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
    fn search_before_build_is_not_built() {
        let idx = AlgebraicIndex::new();
        let err = idx.search(&[1, -1], 1).unwrap_err();
        assert!(matches!(err, IndexError::IndexNotBuilt));
    }

    #[test]
    fn staged_upsert_is_invisible_until_build() {
        let mut idx = AlgebraicIndex::new();
        idx.stage_upsert(oid(), &[1, 1, -1]).unwrap();
        assert!(idx.search(&[1, 1, -1], 1).is_err());
        idx.build().unwrap();
        assert_eq!(idx.search(&[1, 1, -1], 1).unwrap().len(), 1);
    }

    #[test]
    fn exact_match_scores_one() {
        let mut idx = AlgebraicIndex::new();
        let a = oid();
        idx.stage_upsert(a.clone(), &[1, -1, 1, 1]).unwrap();
        idx.build().unwrap();
        let hits = idx.search(&[1, -1, 1, 1], 1).unwrap();
        assert_eq!(hits[0].0, a);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn staged_removal_takes_effect_on_build() {
        let mut idx = AlgebraicIndex::new();
        let a = oid();
        idx.stage_upsert(a.clone(), &[1, -1]).unwrap();
        idx.build().unwrap();
        idx.stage_removal(a.clone());
        idx.build().unwrap();
        assert!(!idx.contains(&a));
    }

    #[test]
    fn constrained_search_restricts_candidates() {
        let mut idx = AlgebraicIndex::new();
        let a = oid();
        let b = oid();
        idx.stage_upsert(a.clone(), &[1, 1]).unwrap();
        idx.stage_upsert(b.clone(), &[1, -1]).unwrap();
        idx.build().unwrap();
        let hits = idx.constrained_search(&[1, 1], &[b.clone()], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, b);
    }
}
