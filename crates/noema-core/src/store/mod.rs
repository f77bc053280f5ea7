//! Concept Store (C1): transactional SQLite persistence for the concept graph.

mod migrations;
mod sqlite_store;

pub use sqlite_store::{ConceptStore, ConceptTxn, Result, StoreError};
