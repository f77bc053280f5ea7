//! The top-level engine context (spec §9: "explicit core context value
//! carrying handles to C1, C2, C3, and configuration"). Wires the concept
//! store, both index tiers, the codec, the embedder, and maintenance into a
//! single value exposing `reason`, `fit_codec`, `rebuild_indexes`, `stats`.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::codec::{CodecError, LaplaceCodec};
use crate::config::EngineConfig;
use crate::embedder::Embedder;
use crate::index::{AlgebraicIndex, GeometricIndex, IndexStats};
use crate::maintenance::{MaintenanceError, RefitDecision, RefitScheduler, SyncReport, SyncWorker};
use crate::reasoning::{ConceptHandle, Engine as ReasoningEngine, QueryPlan, ReasoningError};
use crate::store::{ConceptStore, StoreError};

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Maintenance(#[from] MaintenanceError),
    #[error(transparent)]
    Reasoning(#[from] ReasoningError),
    /// A freshly fit codec failed `validate_with_threshold`; the previous
    /// codec stays published.
    #[error("codec fit rejected: round-trip correlation {correlation:.3} below threshold {threshold:.3}")]
    ValidationFailed { correlation: f64, threshold: f64 },
}

/// A snapshot of engine-wide health, returned by [`Engine::stats`].
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    pub l1: IndexStats,
    pub l2: IndexStats,
    pub sync_watermark: i64,
    pub dirty_since_fit: usize,
}

/// Owns the full component graph (C1-C5) and is the crate's only intended
/// public entry point; callers never reach for `ConceptStore` or the index
/// tiers directly.
pub struct Engine {
    store: Arc<ConceptStore>,
    l1: Arc<Mutex<GeometricIndex>>,
    l2: Arc<Mutex<AlgebraicIndex>>,
    codec: Arc<ArcSwap<LaplaceCodec>>,
    embedder: Arc<dyn Embedder>,
    sync: Mutex<SyncWorker>,
    refit: Mutex<RefitScheduler>,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine over an already-fit codec (the common case: a fresh
    /// engine opened against a store that has seen at least one `fit_codec`).
    pub fn new(
        store: Arc<ConceptStore>,
        codec: LaplaceCodec,
        embedder: Arc<dyn Embedder>,
        config: EngineConfig,
    ) -> Self {
        let l1 = Arc::new(Mutex::new(GeometricIndex::new()));
        let l2 = Arc::new(Mutex::new(AlgebraicIndex::new()));
        let codec = Arc::new(ArcSwap::from_pointee(codec));
        let sync = SyncWorker::new(store.clone(), l1.clone(), l2.clone(), codec.clone());
        let refit = RefitScheduler::new(config.refit_threshold);
        Self {
            store,
            l1,
            l2,
            codec,
            embedder,
            sync: Mutex::new(sync),
            refit: Mutex::new(refit),
            config,
        }
    }

    /// Build an engine, preferring whatever codec the store last persisted
    /// via `fit_codec` over a caller-supplied fallback. Used on process
    /// startup, where there is no in-memory codec to carry forward from a
    /// previous run.
    pub fn open(
        store: Arc<ConceptStore>,
        fallback_codec: LaplaceCodec,
        embedder: Arc<dyn Embedder>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let codec = store.load_current_codec()?.unwrap_or(fallback_codec);
        Ok(Self::new(store, codec, embedder, config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a query plan through the GCE -> HRC -> AGL pipeline.
    pub fn reason(&self, plan: &QueryPlan) -> Result<ConceptHandle, ReasoningError> {
        let engine = ReasoningEngine::new(
            self.store.clone(),
            self.l1.clone(),
            self.l2.clone(),
            self.codec.clone(),
            self.embedder.clone(),
            self.config.retrieval_k,
            self.config.l1_threshold,
        );
        engine.reason(plan)
    }

    /// Fit a fresh codec from every concept currently carrying a geometric
    /// embedding, publish it via the atomic pointer swap, and rebuild both
    /// index tiers so nothing is left encoded under the old codec.
    ///
    /// Per-call since a rebuild after a refit is expensive; callers
    /// ordinarily let [`Engine::maybe_refit`] decide when to invoke it.
    #[tracing::instrument(skip(self))]
    pub fn fit_codec(&self) -> Result<(), EngineError> {
        let concepts = self.store.iter_all()?;
        let samples: Vec<Vec<f32>> = concepts
            .iter()
            .filter(|c| c.is_indexable())
            .filter_map(|c| c.geometric_embedding.clone())
            .collect();

        // `codec_n_components` is a ceiling, not a floor: clamp it to the
        // sample count so a corpus between `refit::N_MIN` and the
        // configured component count (the common case right after the
        // scheduler first allows a fit) doesn't spuriously fail
        // `LaplaceCodec::fit`'s own `n < n_components` guard.
        let n_components = self.config.codec_n_components.min(samples.len()).max(2);

        let new_codec = LaplaceCodec::fit(&samples, self.config.codec_d, n_components, self.config.seed)?;
        let report = new_codec.validate_with_threshold(
            &samples,
            self.config.validation_correlation_threshold as f64,
        )?;
        if !report.structure_preserving {
            return Err(EngineError::ValidationFailed {
                correlation: report.correlation,
                threshold: self.config.validation_correlation_threshold as f64,
            });
        }
        self.store.save_codec(&new_codec)?;
        self.codec.store(Arc::new(new_codec));

        self.store.mark_all_stale()?;
        let mut sync = self.sync.lock().expect("sync lock poisoned");
        sync.full_rebuild()?;
        self.refit.lock().expect("refit lock poisoned").reset();
        Ok(())
    }

    /// Check whether enough concept churn has accumulated to warrant a
    /// refit, and run one if so. Returns the decision that was made.
    pub fn maybe_refit(&self) -> Result<RefitDecision, EngineError> {
        let embeddable = self
            .store
            .iter_all()?
            .iter()
            .filter(|c| c.is_indexable() && c.has_embedding())
            .count();
        let decision = self.refit.lock().expect("refit lock poisoned").decide(embeddable);
        if decision == RefitDecision::Refit {
            self.fit_codec()?;
        }
        Ok(decision)
    }

    /// Drain every dirty concept since the last sync and apply it to both
    /// index tiers. Also records the churn against the refit scheduler and
    /// compacts L1's tombstones once they cross the configured watermark.
    pub fn rebuild_indexes(&self) -> Result<SyncReport, EngineError> {
        let mut sync = self.sync.lock().expect("sync lock poisoned");
        let report = sync.run_once()?;
        self.refit
            .lock()
            .expect("refit lock poisoned")
            .record_changes(report.concepts_seen);
        drop(sync);
        self.l1
            .lock()
            .expect("l1 lock poisoned")
            .compact_if_needed(self.config.tombstone_watermark);
        Ok(report)
    }

    /// Rebuild both index tiers wholesale from the store's current contents.
    /// Used on startup.
    pub fn full_rebuild(&self) -> Result<SyncReport, EngineError> {
        let mut sync = self.sync.lock().expect("sync lock poisoned");
        Ok(sync.full_rebuild()?)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            l1: self.l1.lock().expect("l1 lock poisoned").stats(),
            l2: self.l2.lock().expect("l2 lock poisoned").stats(),
            sync_watermark: self.sync.lock().expect("sync lock poisoned").watermark(),
            dirty_since_fit: self.refit.lock().expect("refit lock poisoned").dirty_since_fit(),
        }
    }
}
