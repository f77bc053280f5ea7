//! Query plans the reasoning pipeline (`crate::reasoning::pipeline::Engine::reason`)
//! accepts, and the handle it resolves them to.

use crate::config::Deadline;
use crate::oid::Oid;

/// A single reasoning operation.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum Op {
    /// Plain nearest-neighbor lookup around one term.
    GeneralSearch { term: String },
    /// Bundle the `include` terms' hypervectors, fold out `exclude`'s, search
    /// the result. `include` must not be empty.
    RecipeSearch { include: Vec<String>, exclude: Vec<String> },
    /// Solve `a : b :: c : ?` over hypervector algebra.
    Analogy { a: String, b: String, c: String },
}

/// A reasoning request: an operation plus how wide GCE's representative
/// context window should be before HRC encodes it.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub op: Op,
    pub context_k: usize,
    /// Cooperative deadline; `None` means the caller's default applies.
    pub deadline: Option<Deadline>,
}

impl QueryPlan {
    pub fn general_search(term: impl Into<String>, context_k: usize) -> Self {
        Self {
            op: Op::GeneralSearch { term: term.into() },
            context_k,
            deadline: None,
        }
    }

    pub fn recipe_search(include: Vec<String>, exclude: Vec<String>, context_k: usize) -> Self {
        Self {
            op: Op::RecipeSearch { include, exclude },
            context_k,
            deadline: None,
        }
    }

    pub fn analogy(a: impl Into<String>, b: impl Into<String>, c: impl Into<String>, context_k: usize) -> Self {
        Self {
            op: Op::Analogy { a: a.into(), b: b.into(), c: c.into() },
            context_k,
            deadline: None,
        }
    }

    /// Attach a per-call deadline to this plan.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// AGL's result: the single concept `reason` resolved the plan to. AGL's
/// constrained search always asks for exactly one winner, so this is the
/// pipeline's sole return value rather than a ranked list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptHandle {
    pub oid: Oid,
    pub symbolic_name: String,
}
