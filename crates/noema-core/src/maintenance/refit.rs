//! Codec lifecycle scheduling: when there isn't enough data to fit yet, and
//! when enough concepts have changed since the last fit to warrant a refit.

/// Minimum number of embeddings required before a codec can be fit at all.
pub const N_MIN: usize = 10;

/// What the scheduler recommends doing this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefitDecision {
    /// Fewer than [`N_MIN`] embeddings are available; the codec cannot fit yet.
    InsufficientData { have: usize, need: usize },
    /// Enough dirty concepts have accumulated since the last fit to refit now.
    Refit,
    /// Nothing to do.
    Hold,
}

/// Tracks concept churn since the last codec fit and decides when a refit
/// is due.
pub struct RefitScheduler {
    threshold: usize,
    dirty_since_fit: usize,
}

impl RefitScheduler {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            dirty_since_fit: 0,
        }
    }

    /// Record that `count` concepts changed since the last fit.
    pub fn record_changes(&mut self, count: usize) {
        self.dirty_since_fit += count;
    }

    /// Reset the churn counter after a fit completes.
    pub fn reset(&mut self) {
        self.dirty_since_fit = 0;
    }

    pub fn dirty_since_fit(&self) -> usize {
        self.dirty_since_fit
    }

    /// Decide what to do given the current embeddable-concept population.
    pub fn decide(&self, embeddable_count: usize) -> RefitDecision {
        if embeddable_count < N_MIN {
            return RefitDecision::InsufficientData {
                have: embeddable_count,
                need: N_MIN,
            };
        }
        if self.dirty_since_fit >= self.threshold {
            return RefitDecision::Refit;
        }
        RefitDecision::Hold
    }
}
