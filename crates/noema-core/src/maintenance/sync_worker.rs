//! Sync worker: drains `ConceptStore::iter_dirty_since` and applies the
//! changes to L1/L2, re-encoding stale hypervectors through the live codec.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::codec::{CodecError, LaplaceCodec};
use crate::index::{AlgebraicIndex, GeometricIndex, IndexError};
use crate::store::{ConceptStore, StoreError};

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Outcome of a single `run_once` sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncReport {
    pub concepts_seen: usize,
    pub l1_upserts: usize,
    pub l2_upserts: usize,
    pub removed: usize,
    pub re_encoded: usize,
    pub new_watermark: i64,
}

/// Drains dirty concepts from the store and applies them to both indexes.
///
/// The watermark only advances after both `GeometricIndex` and
/// `AlgebraicIndex` successfully apply a sweep's changes — if the process
/// crashes mid-sweep, the next `run_once` simply replays the same dirty
/// range, which is idempotent (upserts and tombstones are both last-write-wins).
pub struct SyncWorker {
    store: Arc<ConceptStore>,
    l1: Arc<Mutex<GeometricIndex>>,
    l2: Arc<Mutex<AlgebraicIndex>>,
    codec: Arc<ArcSwap<LaplaceCodec>>,
    watermark: i64,
}

impl SyncWorker {
    pub fn new(
        store: Arc<ConceptStore>,
        l1: Arc<Mutex<GeometricIndex>>,
        l2: Arc<Mutex<AlgebraicIndex>>,
        codec: Arc<ArcSwap<LaplaceCodec>>,
    ) -> Self {
        Self {
            store,
            l1,
            l2,
            codec,
            watermark: 0,
        }
    }

    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    /// Rebuild both indexes from scratch from every live concept in the
    /// store. Used on startup and after a codec refit invalidates every
    /// existing hypervector.
    pub fn full_rebuild(&mut self) -> Result<SyncReport, MaintenanceError> {
        let concepts = self.store.iter_all()?;
        let mut report = SyncReport {
            concepts_seen: concepts.len(),
            ..Default::default()
        };

        {
            let mut l1 = self.l1.lock().expect("l1 lock poisoned");
            let live: Vec<_> = concepts
                .iter()
                .filter(|c| c.has_embedding())
                .map(|c| (c.oid.clone(), c.geometric_embedding.clone().unwrap()))
                .collect();
            report.l1_upserts = live.len();
            l1.rebuild_from_store(live.iter().map(|(o, v)| (o.clone(), v.as_slice())))?;
        }

        let codec = self.codec.load_full();
        let mut l2 = self.l2.lock().expect("l2 lock poisoned");
        let mut live_hv = Vec::new();
        for concept in &concepts {
            if concept.has_live_hypervector() {
                live_hv.push((concept.oid.clone(), concept.hypervector.clone().unwrap()));
            } else if concept.has_embedding() {
                let encoded = codec.encode(std::slice::from_ref(
                    concept.geometric_embedding.as_ref().unwrap(),
                ))?;
                let hv = encoded.into_iter().next().unwrap();
                self.store
                    .set_hypervector(&concept.oid, hv.clone(), codec.tag().to_string())?;
                report.re_encoded += 1;
                live_hv.push((concept.oid.clone(), hv));
            }
        }
        report.l2_upserts = live_hv.len();
        l2.rebuild_from_store(live_hv.iter().map(|(o, v)| (o.clone(), v.as_slice())))?;

        let (_, new_watermark) = self.store.iter_dirty_since(0)?;
        self.watermark = new_watermark;
        report.new_watermark = new_watermark;
        Ok(report)
    }

    /// Apply every change since the last sweep.
    pub fn run_once(&mut self) -> Result<SyncReport, MaintenanceError> {
        let (dirty, new_watermark) = self.store.iter_dirty_since(self.watermark)?;
        let mut report = SyncReport {
            concepts_seen: dirty.len(),
            new_watermark: self.watermark,
            ..Default::default()
        };
        if dirty.is_empty() {
            return Ok(report);
        }

        let codec = self.codec.load_full();

        {
            let mut l1 = self.l1.lock().expect("l1 lock poisoned");
            for concept in &dirty {
                if !concept.is_indexable() {
                    l1.remove(&concept.oid);
                    report.removed += 1;
                } else if concept.has_embedding() {
                    l1.add(concept.oid.clone(), concept.geometric_embedding.as_ref().unwrap())?;
                    report.l1_upserts += 1;
                }
            }
        }

        {
            let mut l2 = self.l2.lock().expect("l2 lock poisoned");
            for concept in &dirty {
                if !concept.is_indexable() {
                    l2.stage_removal(concept.oid.clone());
                    continue;
                }
                if concept.has_live_hypervector() {
                    l2.stage_upsert(concept.oid.clone(), concept.hypervector.as_ref().unwrap())?;
                } else if concept.has_embedding() {
                    let encoded =
                        codec.encode(std::slice::from_ref(concept.geometric_embedding.as_ref().unwrap()))?;
                    let hv = encoded.into_iter().next().unwrap();
                    self.store
                        .set_hypervector(&concept.oid, hv.clone(), codec.tag().to_string())?;
                    report.re_encoded += 1;
                    l2.stage_upsert(concept.oid.clone(), &hv)?;
                }
            }
            l2.build()?;
        }

        report.l2_upserts = dirty.iter().filter(|c| c.is_indexable() && c.has_embedding()).count();

        self.watermark = new_watermark;
        report.new_watermark = new_watermark;
        Ok(report)
    }
}
