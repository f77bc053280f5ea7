//! # Noema Core
//!
//! A neuro-symbolic reasoning engine: concepts carry both a geometric
//! embedding and a bipolar hyperdimensional encoding, and queries are
//! answered by combining dense nearest-neighbor search with hyperdimensional
//! algebra.
//!
//! - **Concept Store** (`concept`, `store`): the transactional record of
//!   every concept and its typed relations, backed by SQLite.
//! - **Laplace-HDC Codec** (`codec`, `hdc`): a fit linear projection from
//!   geometric embeddings into bipolar hypervectors and back, plus the
//!   bind/bundle/negate algebra those hypervectors support.
//! - **Federated Vector Index** (`index`): an exact geometric tier (L1) and
//!   an exact algebraic tier (L2), kept consistent with the store by
//!   `maintenance`.
//! - **Reasoning Pipeline** (`reasoning`): the GCE -> HRC -> AGL state
//!   machine that answers a [`reasoning::QueryPlan`] against the store and
//!   both index tiers.
//! - **Maintenance** (`maintenance`): the sync worker that drains store
//!   changes into the indexes, and the scheduler that decides when the
//!   codec needs refitting.
//!
//! [`Engine`] is the crate's single entry point: it owns the whole
//! component graph and is the only type most callers need.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use noema_core::{Engine, EngineConfig};
//! use noema_core::reasoning::QueryPlan;
//! use std::sync::Arc;
//!
//! let store = Arc::new(noema_core::store::ConceptStore::new(None)?);
//! // ... ingest concepts, then fit a codec once enough have embeddings ...
//! let engine = Engine::new(store, codec, embedder, EngineConfig::default());
//! let handle = engine.reason(&QueryPlan::general_search("dog", 5))?;
//! ```
//!
//! ## Feature flags
//!
//! - `embeddings` (default): enables [`embedder::FastEmbedder`], a local
//!   ONNX-based `Embedder` implementation via `fastembed`.
//! - `bundled-sqlite` (default): links an in-tree SQLite rather than
//!   requiring the system library.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod concept;
pub mod config;
pub mod embedder;
mod engine;
pub mod hdc;
pub mod index;
pub mod maintenance;
pub mod oid;
pub mod reasoning;
pub mod store;

pub use config::{Deadline, EngineConfig};
pub use engine::{Engine, EngineError, EngineStats};
pub use oid::Oid;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
