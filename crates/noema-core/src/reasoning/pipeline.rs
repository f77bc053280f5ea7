//! The GCE -> HRC -> AGL reasoning pipeline (C4).
//!
//! - **GCE** (Geometric Context Retrieval): resolve each query term to a
//!   geometric embedding and retrieve its candidate context via L1, widened
//!   to `retrieval_k`/`l1_threshold` for the candidate set AGL ranks over
//!   and narrowed to `context_k` for the subset HRC encodes.
//! - **HRC** (Hyperdimensional Algebra): combine the resolved hypervectors
//!   per the plan's operation into a single query hypervector.
//! - **AGL** (Constrained Cleanup): decode the query hypervector back into
//!   geometric space and resolve the single best match within GCE's
//!   candidate context.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::codec::{CodecError, LaplaceCodec};
use crate::config::Deadline;
use crate::embedder::{Embedder, EmbedderError};
use crate::hdc::{self, Hypervector};
use crate::index::{AlgebraicIndex, GeometricIndex, IndexError};
use crate::oid::Oid;
use crate::store::{ConceptStore, StoreError};

use super::plan::{ConceptHandle, Op, QueryPlan};

/// Which pipeline stage a failure originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Gce,
    Hrc,
    Agl,
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("{stage:?} stage: {source}")]
    Embedder { stage: Stage, #[source] source: EmbedderError },
    #[error("{stage:?} stage: {source}")]
    Store { stage: Stage, #[source] source: StoreError },
    #[error("{stage:?} stage: {source}")]
    Index { stage: Stage, #[source] source: IndexError },
    #[error("{stage:?} stage: {source}")]
    Codec { stage: Stage, #[source] source: CodecError },
    /// GCE's context retrieval came back empty; AGL has nothing to rank.
    #[error("empty context: no candidates were retrieved for this query")]
    EmptyContext,
    /// AGL's constrained search returned zero results from a non-empty context.
    #[error("no match found within the retrieved context")]
    NoMatch,
    /// `RecipeSearch` with no `include` terms has no anchor to search around.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// The plan's deadline elapsed while `stage` was running. No state is
    /// mutated by `reason`, so this is always safe to retry.
    #[error("{stage:?} stage: deadline exceeded")]
    Timeout { stage: Stage },
}

/// A term resolved to its geometric embedding, and the store OID if it
/// already existed as a concept. HRC is solely responsible for turning
/// embeddings into hypervectors (its own, and its retrieved context's), so
/// resolution stops at the embedding.
struct Resolved {
    oid: Option<Oid>,
    embedding: Vec<f32>,
}

/// The reasoning engine: owns references to every C1-C3 collaborator needed
/// to run a [`QueryPlan`] end to end.
pub struct Engine {
    store: Arc<ConceptStore>,
    l1: Arc<Mutex<GeometricIndex>>,
    #[allow(dead_code)]
    l2: Arc<Mutex<AlgebraicIndex>>,
    codec: Arc<ArcSwap<LaplaceCodec>>,
    embedder: Arc<dyn Embedder>,
    /// GCE's candidate-set search width (`K_retrieve`, spec default 20).
    retrieval_k: usize,
    /// Minimum L1 cosine similarity for a GCE hit to enter the candidate set.
    l1_threshold: f32,
}

impl Engine {
    pub fn new(
        store: Arc<ConceptStore>,
        l1: Arc<Mutex<GeometricIndex>>,
        l2: Arc<Mutex<AlgebraicIndex>>,
        codec: Arc<ArcSwap<LaplaceCodec>>,
        embedder: Arc<dyn Embedder>,
        retrieval_k: usize,
        l1_threshold: f32,
    ) -> Self {
        Self { store, l1, l2, codec, embedder, retrieval_k, l1_threshold }
    }

    /// GCE term resolution: reuse a matching concept's stored embedding if
    /// one exists by symbolic name, otherwise embed fresh.
    fn resolve_term(&self, term: &str) -> Result<Resolved, ReasoningError> {
        let existing = self
            .store
            .iter_all()
            .map_err(|e| ReasoningError::Store { stage: Stage::Gce, source: e })?
            .into_iter()
            .find(|c| c.is_indexable() && c.symbolic_name.eq_ignore_ascii_case(term));

        if let Some(concept) = existing {
            if let Some(embedding) = concept.geometric_embedding.clone() {
                return Ok(Resolved { oid: Some(concept.oid), embedding });
            }
        }

        let (embedding, _model_tag) = self
            .embedder
            .embed(term)
            .map_err(|e| ReasoningError::Embedder { stage: Stage::Gce, source: e })?;
        Ok(Resolved { oid: None, embedding })
    }

    /// GCE's raw retrieval: the top `retrieval_k` L1 neighbors of `embedding`
    /// at or above `l1_threshold`, ordered by similarity descending. This is
    /// the full candidate set C that AGL will later rank over.
    fn retrieve_candidates(&self, embedding: &[f32]) -> Result<Vec<Oid>, ReasoningError> {
        let l1 = self.l1.lock().expect("l1 lock poisoned");
        let hits = l1
            .search(embedding, self.retrieval_k, self.l1_threshold)
            .map_err(|e| ReasoningError::Index { stage: Stage::Gce, source: e })?;
        Ok(hits.into_iter().map(|(oid, _)| oid).collect())
    }

    /// HRC step 1: encode a set of concepts' stored geometric embeddings
    /// into hypervectors via C2. Concepts that have lost their embedding
    /// between GCE's retrieval and this lookup are silently skipped.
    fn encode_oids(&self, oids: &[Oid]) -> Result<Vec<Hypervector>, ReasoningError> {
        let mut embeddings = Vec::with_capacity(oids.len());
        for oid in oids {
            let concept = self
                .store
                .get(oid)
                .map_err(|e| ReasoningError::Store { stage: Stage::Hrc, source: e })?;
            if let Some(embedding) = concept.and_then(|c| c.geometric_embedding) {
                embeddings.push(embedding);
            }
        }
        if embeddings.is_empty() {
            return Ok(Vec::new());
        }
        let codec = self.codec.load_full();
        codec
            .encode(&embeddings)
            .map_err(|e| ReasoningError::Codec { stage: Stage::Hrc, source: e })
    }

    /// Bundle a set of context hypervectors, or, if none were available
    /// (e.g. `context_k == 0`, or every neighbor lost its embedding),
    /// fall back to encoding `fallback_embedding` directly so HRC always
    /// has something to hand AGL. `hdc::bundle` panics on an empty slice,
    /// so this is the one place that guard has to be enforced.
    fn bundle_or_fallback(
        &self,
        hvs: &[Hypervector],
        fallback_embedding: &[f32],
    ) -> Result<Hypervector, ReasoningError> {
        if hvs.is_empty() {
            let codec = self.codec.load_full();
            Ok(codec
                .encode(std::slice::from_ref(&fallback_embedding.to_vec()))
                .map_err(|e| ReasoningError::Codec { stage: Stage::Hrc, source: e })?
                .into_iter()
                .next()
                .expect("encode of one embedding returns one hypervector"))
        } else {
            let refs: Vec<&[i8]> = hvs.iter().map(|h| h.as_slice()).collect();
            Ok(hdc::bundle(&refs))
        }
    }

    /// An entity's representative hypervector for HRC: the bundle of its
    /// top-`context_k` GCE-retrieved neighbors' hypervectors (spec.md's
    /// "encode the context embeddings... via C2" step), falling back to the
    /// entity's own direct encoding if it has no indexed neighbors.
    fn entity_representative(&self, embedding: &[f32], context_k: usize) -> Result<Hypervector, ReasoningError> {
        let candidates = self.retrieve_candidates(embedding)?;
        let context: Vec<Oid> = candidates.into_iter().take(context_k).collect();
        let hvs = self.encode_oids(&context)?;
        self.bundle_or_fallback(&hvs, embedding)
    }

    /// Run a query plan through GCE -> HRC -> AGL and return the single
    /// concept handle AGL resolved to.
    #[tracing::instrument(skip(self, plan), fields(context_k = plan.context_k))]
    pub fn reason(&self, plan: &QueryPlan) -> Result<ConceptHandle, ReasoningError> {
        match &plan.op {
            Op::GeneralSearch { term } => self.general_search(term, plan.context_k, plan.deadline),
            Op::RecipeSearch { include, exclude } => {
                self.recipe_search(include, exclude, plan.context_k, plan.deadline)
            }
            Op::Analogy { a, b, c } => self.analogy(a, b, c, plan.context_k, plan.deadline),
        }
    }

    fn general_search(
        &self,
        term: &str,
        context_k: usize,
        deadline: Option<Deadline>,
    ) -> Result<ConceptHandle, ReasoningError> {
        if let Some(d) = deadline {
            d.check(Stage::Gce)?;
        }
        let resolved = self.resolve_term(term)?;
        let candidates = self.retrieve_candidates(&resolved.embedding)?;
        if candidates.is_empty() {
            return Err(ReasoningError::EmptyContext);
        }
        let context: Vec<Oid> = candidates.iter().take(context_k).cloned().collect();

        if let Some(d) = deadline {
            d.check(Stage::Hrc)?;
        }
        // HRC: bundle the encoded hypervectors of the retrieved context,
        // not the query term's own direct encoding.
        let context_hvs = self.encode_oids(&context)?;
        let query_hv = self.bundle_or_fallback(&context_hvs, &resolved.embedding)?;

        self.agl(&query_hv, &candidates, deadline)
    }

    fn recipe_search(
        &self,
        include: &[String],
        exclude: &[String],
        context_k: usize,
        deadline: Option<Deadline>,
    ) -> Result<ConceptHandle, ReasoningError> {
        if let Some(d) = deadline {
            d.check(Stage::Gce)?;
        }
        if include.is_empty() {
            return Err(ReasoningError::UnsupportedOperation(
                "recipe_search requires at least one include term".to_string(),
            ));
        }

        let included: Vec<Resolved> = include.iter().map(|t| self.resolve_term(t)).collect::<Result<_, _>>()?;
        let excluded: Vec<Resolved> = exclude.iter().map(|t| self.resolve_term(t)).collect::<Result<_, _>>()?;

        // GCE: union the candidate set around every include term.
        let mut candidate_set = HashSet::new();
        let mut candidates = Vec::new();
        let mut context_set = HashSet::new();
        let mut context = Vec::new();
        for r in &included {
            let raw = self.retrieve_candidates(&r.embedding)?;
            for oid in &raw {
                if candidate_set.insert(oid.clone()) {
                    candidates.push(oid.clone());
                }
            }
            for oid in raw.into_iter().take(context_k) {
                if context_set.insert(oid.clone()) {
                    context.push(oid);
                }
            }
        }
        if candidates.is_empty() {
            return Err(ReasoningError::EmptyContext);
        }

        if let Some(d) = deadline {
            d.check(Stage::Hrc)?;
        }
        // HRC: encode the pooled include-context and exclude-context
        // neighbor hypervectors (not the terms' own direct encodings),
        // then bundle(include) folded against negate(bundle(exclude)).
        let include_hvs = self.encode_oids(&context)?;
        let incl_bundle = self.bundle_or_fallback(&include_hvs, &included[0].embedding)?;

        let mut exclude_context_set = HashSet::new();
        let mut exclude_context = Vec::new();
        for r in &excluded {
            let raw = self.retrieve_candidates(&r.embedding)?;
            for oid in raw.into_iter().take(context_k) {
                if exclude_context_set.insert(oid.clone()) {
                    exclude_context.push(oid);
                }
            }
        }
        let query_hv = if exclude_context.is_empty() {
            incl_bundle
        } else {
            let exclude_hvs = self.encode_oids(&exclude_context)?;
            let excl_bundle = self.bundle_or_fallback(&exclude_hvs, &excluded[0].embedding)?;
            hdc::bind(&incl_bundle, &hdc::negate(&excl_bundle))
        };

        self.agl(&query_hv, &candidates, deadline)
    }

    fn analogy(
        &self,
        a: &str,
        b: &str,
        c: &str,
        context_k: usize,
        deadline: Option<Deadline>,
    ) -> Result<ConceptHandle, ReasoningError> {
        if let Some(d) = deadline {
            d.check(Stage::Gce)?;
        }
        let ra = self.resolve_term(a)?;
        let rb = self.resolve_term(b)?;
        let rc = self.resolve_term(c)?;

        // GCE: candidates drawn from c's neighborhood (the analogy answer
        // should live near c, shifted by the a->b relation).
        let mut candidates: Vec<Oid> = self
            .retrieve_candidates(&rc.embedding)?
            .into_iter()
            .filter(|oid| ![&ra.oid, &rb.oid, &rc.oid].contains(&&Some(oid.clone())))
            .collect();
        if candidates.is_empty() {
            return Err(ReasoningError::EmptyContext);
        }
        candidates.sort();
        candidates.dedup();

        if let Some(d) = deadline {
            d.check(Stage::Hrc)?;
        }
        // HRC: each entity's representative is the bundle of its own
        // context neighbors' hypervectors (not its own direct encoding);
        // d = bind(bind(a, b), c) then solves a:b::c:d over bipolar algebra
        // (bind is self-inverse, so this is equivalently bind(c, unbind(a, b))).
        let rep_a = self.entity_representative(&ra.embedding, context_k)?;
        let rep_b = self.entity_representative(&rb.embedding, context_k)?;
        let rep_c = self.entity_representative(&rc.embedding, context_k)?;
        let query_hv = hdc::bind(&hdc::bind(&rep_a, &rep_b), &rep_c);

        self.agl(&query_hv, &candidates, deadline)
    }

    /// AGL: decode the query hypervector into geometric space and resolve
    /// the single best match (`k=1`, fixed per spec) exactly against
    /// `candidates` via L1's constrained search.
    fn agl(
        &self,
        query_hv: &Hypervector,
        candidates: &[Oid],
        deadline: Option<Deadline>,
    ) -> Result<ConceptHandle, ReasoningError> {
        if let Some(d) = deadline {
            d.check(Stage::Agl)?;
        }
        let codec = self.codec.load_full();
        let decoded = codec
            .decode(std::slice::from_ref(query_hv))
            .map_err(|e| ReasoningError::Codec { stage: Stage::Agl, source: e })?
            .into_iter()
            .next()
            .expect("decode of one hypervector returns one embedding");

        let l1 = self.l1.lock().expect("l1 lock poisoned");
        let hits = l1
            .constrained_search(&decoded, candidates, 1, self.l1_threshold)
            .map_err(|e| ReasoningError::Index { stage: Stage::Agl, source: e })?;
        drop(l1);

        let (winner, _score) = hits.into_iter().next().ok_or(ReasoningError::NoMatch)?;
        let symbolic_name = self
            .store
            .get(&winner)
            .map_err(|e| ReasoningError::Store { stage: Stage::Agl, source: e })?
            .map(|c| c.symbolic_name)
            .unwrap_or_default();
        Ok(ConceptHandle { oid: winner, symbolic_name })
    }
}
