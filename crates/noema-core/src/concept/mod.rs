//! Concept module — the data model of the concept graph.
//!
//! A [`Concept`] carries a geometric embedding, a bipolar hypervector derived
//! from it by the codec, and typed relations to other concepts. The store
//! ([`crate::store`]) owns concept records exclusively; every other
//! component addresses them by [`crate::oid::Oid`].

mod concept;

pub use concept::{Concept, RelationKind, Relations};
