//! Concept — the fundamental unit of the concept graph.
//!
//! Each concept carries dual representations (a geometric embedding and a
//! bipolar hypervector) plus typed relations to other concepts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::oid::Oid;

/// Kind of a directed relation edge between two concepts.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Taxonomic "is a" edge.
    IsA,
    /// Meronymic "part of" edge.
    PartOf,
    /// Loose semantic association.
    AssociatedWith,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::IsA => "is_a",
            RelationKind::PartOf => "part_of",
            RelationKind::AssociatedWith => "associated_with",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "is_a" => Some(RelationKind::IsA),
            "part_of" => Some(RelationKind::PartOf),
            "associated_with" => Some(RelationKind::AssociatedWith),
            _ => None,
        }
    }
}

/// A concept's three labeled relation sets (I1: targets must resolve to live concepts).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relations {
    pub is_a: BTreeSet<Oid>,
    pub part_of: BTreeSet<Oid>,
    pub associated_with: BTreeSet<Oid>,
}

impl Relations {
    fn set_for(&mut self, kind: RelationKind) -> &mut BTreeSet<Oid> {
        match kind {
            RelationKind::IsA => &mut self.is_a,
            RelationKind::PartOf => &mut self.part_of,
            RelationKind::AssociatedWith => &mut self.associated_with,
        }
    }

    pub fn add(&mut self, kind: RelationKind, dst: Oid) {
        self.set_for(kind).insert(dst);
    }

    pub fn remove(&mut self, kind: RelationKind, dst: &Oid) {
        self.set_for(kind).remove(dst);
    }

    pub fn iter_all(&self) -> impl Iterator<Item = (RelationKind, &Oid)> {
        self.is_a
            .iter()
            .map(|o| (RelationKind::IsA, o))
            .chain(self.part_of.iter().map(|o| (RelationKind::PartOf, o)))
            .chain(
                self.associated_with
                    .iter()
                    .map(|o| (RelationKind::AssociatedWith, o)),
            )
    }
}

/// A concept record. Owned exclusively by the [`crate::store::ConceptStore`];
/// every other component holds it by OID, never by reference.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub oid: Oid,
    pub symbolic_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Dense geometric embedding of dimension `d`, if one has been attached.
    pub geometric_embedding: Option<Vec<f32>>,
    /// Producer tag for `geometric_embedding`, set jointly with it.
    pub embedding_model_tag: Option<String>,

    /// Bipolar hypervector of dimension `D`, values in {-1, +1}, if derived.
    pub hypervector: Option<Vec<i8>>,
    /// Codec version tag that produced `hypervector`, set jointly with it.
    pub codec_tag: Option<String>,
    /// I2: a hypervector whose `codec_tag` no longer matches the installed
    /// codec is stale and invisible to L2 until re-encoded.
    pub stale: bool,

    pub relations: Relations,

    /// The only supported "deletion": excluded from indexes, never removed.
    pub deprecated: bool,
}

impl Concept {
    /// Create a new concept with only the fields an ingestion collaborator is
    /// required to supply.
    pub fn new(symbolic_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            oid: Oid::new(),
            symbolic_name: symbolic_name.into(),
            created_at: now,
            updated_at: now,
            geometric_embedding: None,
            embedding_model_tag: None,
            hypervector: None,
            codec_tag: None,
            stale: false,
            relations: Relations::default(),
            deprecated: false,
        }
    }

    /// I3 precondition: a concept is eligible for indexing only if it is not
    /// deprecated.
    pub fn is_indexable(&self) -> bool {
        !self.deprecated
    }

    pub fn has_live_hypervector(&self) -> bool {
        self.is_indexable() && !self.stale && self.hypervector.is_some()
    }

    pub fn has_embedding(&self) -> bool {
        self.is_indexable() && self.geometric_embedding.is_some()
    }
}
