//! Tunable knobs for the engine (spec §6): retrieval/context widths, codec
//! shape, refit/tombstone thresholds, and per-call deadline defaults.
//!
//! Loading this from a file or environment is out of core scope; the core
//! only defines the type and consumes it.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::reasoning::{ReasoningError, Stage};

/// A per-call cooperative deadline. Checked between reasoning stages and
/// inside batched vector-search loops; overrun yields `Timeout` rather than
/// letting the call run unbounded.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    pub fn after(duration: Duration) -> Self {
        Self { expires_at: Instant::now() + duration }
    }

    /// `Err(Timeout)` if this deadline has already passed.
    pub fn check(&self, stage: Stage) -> Result<(), ReasoningError> {
        if Instant::now() >= self.expires_at {
            Err(ReasoningError::Timeout { stage })
        } else {
            Ok(())
        }
    }
}

/// Every tunable knob `spec.md` §6 names as part of the core's external
/// surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// GCE's raw L1 retrieval width (`K_retrieve`): how many neighbors form
    /// the candidate set AGL ranks over.
    pub retrieval_k: usize,
    /// Default width of HRC's context-encoding window (`K_context`), used
    /// when a caller doesn't build its own `QueryPlan` with an explicit one.
    pub context_k: usize,
    /// Minimum L1 cosine similarity for a hit to be considered relevant.
    pub l1_threshold: f32,
    /// Hypervector dimension `D` the codec projects into.
    pub codec_d: usize,
    /// Number of retained eigenpairs (`n_components`) in the codec's fit.
    pub codec_n_components: usize,
    /// Minimum round-trip correlation a freshly fit codec must clear before
    /// it's published (see `DESIGN.md`'s resolution of the validation open
    /// question).
    pub validation_correlation_threshold: f32,
    /// Dirty-concept churn since the last fit that triggers a scheduled refit.
    pub refit_threshold: usize,
    /// Fraction of deprecated concepts that triggers a tombstone compaction.
    pub tombstone_watermark: f32,
    /// Default per-call deadline applied when a caller doesn't supply one.
    #[serde(with = "duration_millis")]
    pub default_deadline: Duration,
    /// Seed for the codec's random spectral projection.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retrieval_k: 20,
            context_k: 5,
            l1_threshold: 0.0,
            codec_d: 10_000,
            codec_n_components: 256,
            validation_correlation_threshold: 0.5,
            refit_threshold: 100,
            tombstone_watermark: 0.1,
            default_deadline: Duration::from_secs(5),
            seed: 0,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
