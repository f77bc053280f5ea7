//! The Embedder collaborator (spec §6): given an entity term, returns a
//! geometric embedding and a model tag. Deterministic per `(term, model_tag)`.
//!
//! This is an external collaborator boundary — the reasoning pipeline treats
//! unavailability as the hard error `EmbedderError::Unavailable` and never
//! falls back to a synthetic vector (spec §9: "forbidden in the core").

/// Error raised when an entity term cannot be embedded.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    #[error("embedder unavailable for term {term:?}: {reason}")]
    Unavailable { term: String, reason: String },
}

/// Produces a geometric embedding for an entity term.
///
/// Implementations must be deterministic per `(term, model_tag)` pair.
pub trait Embedder: Send + Sync {
    /// Embed `term`, returning its vector and the producing model's tag.
    fn embed(&self, term: &str) -> Result<(Vec<f32>, String), EmbedderError>;

    /// The dimensionality this embedder produces.
    fn dimensions(&self) -> usize;
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedder;

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use super::{Embedder, EmbedderError};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Local ONNX-based embedder built on `fastembed`, the way
    /// `vestige-core::embeddings::local` wraps `TextEmbedding`.
    pub struct FastEmbedder {
        model: Mutex<TextEmbedding>,
        model_tag: String,
        dimensions: usize,
    }

    impl FastEmbedder {
        /// Initialize the default model (nomic-embed-text-v1.5, 768d).
        pub fn new() -> Result<Self, EmbedderError> {
            let options = InitOptions::new(EmbeddingModel::NomicEmbedTextV15)
                .with_show_download_progress(true);
            let model = TextEmbedding::try_new(options).map_err(|e| EmbedderError::Unavailable {
                term: String::new(),
                reason: format!("failed to initialize embedding model: {e}"),
            })?;
            Ok(Self {
                model: Mutex::new(model),
                model_tag: "nomic-embed-text-v1.5".to_string(),
                dimensions: 768,
            })
        }
    }

    impl Embedder for FastEmbedder {
        fn embed(&self, term: &str) -> Result<(Vec<f32>, String), EmbedderError> {
            let mut model = self.model.lock().map_err(|e| EmbedderError::Unavailable {
                term: term.to_string(),
                reason: format!("model lock poisoned: {e}"),
            })?;
            let mut vectors =
                model
                    .embed(vec![term.to_string()], None)
                    .map_err(|e| EmbedderError::Unavailable {
                        term: term.to_string(),
                        reason: e.to_string(),
                    })?;
            let vector = vectors.pop().ok_or_else(|| EmbedderError::Unavailable {
                term: term.to_string(),
                reason: "embedding model returned no output".to_string(),
            })?;
            Ok((vector, self.model_tag.clone()))
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }
}

/// Deterministic in-memory test double, grounded on the teacher's fixture
/// module shape (`tests/e2e/src/mocks/fixtures.rs`): a fixed term->vector
/// map, `Unavailable` for anything else. Public (not `#[cfg(test)]`) so the
/// `tests/e2e` integration crate can depend on it too.
pub mod fixtures {
    use super::{Embedder, EmbedderError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub struct FixedEmbedder {
        table: Mutex<HashMap<String, Vec<f32>>>,
        dimensions: usize,
        model_tag: String,
    }

    impl FixedEmbedder {
        pub fn new(dimensions: usize) -> Self {
            Self {
                table: Mutex::new(HashMap::new()),
                dimensions,
                model_tag: "fixed-test-embedder".to_string(),
            }
        }

        pub fn insert(&self, term: &str, vector: Vec<f32>) {
            self.table.lock().unwrap().insert(term.to_string(), vector);
        }
    }

    impl Embedder for FixedEmbedder {
        fn embed(&self, term: &str) -> Result<(Vec<f32>, String), EmbedderError> {
            self.table
                .lock()
                .unwrap()
                .get(term)
                .cloned()
                .map(|v| (v, self.model_tag.clone()))
                .ok_or_else(|| EmbedderError::Unavailable {
                    term: term.to_string(),
                    reason: "term not in fixture table".to_string(),
                })
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }
}
