//! Reasoning Pipeline (C4): the GCE -> HRC -> AGL state machine that answers
//! [`QueryPlan`]s against the concept store and its indexes.

mod pipeline;
mod plan;

pub use pipeline::{Engine, ReasoningError, Stage};
pub use plan::{ConceptHandle, Op, QueryPlan};
