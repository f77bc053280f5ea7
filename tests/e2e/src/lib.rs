//! Shared fixtures for the end-to-end test suite: a small builder that wires
//! a temp-backed `ConceptStore`, a codec fit in-sample over the fixture
//! concepts, and a fully rebuilt `Engine`, without requiring a real embedder.

use std::sync::Arc;

use noema_core::codec::LaplaceCodec;
use noema_core::concept::{Concept, RelationKind};
use noema_core::embedder::fixtures::FixedEmbedder;
use noema_core::embedder::Embedder;
use noema_core::oid::Oid;
use noema_core::store::ConceptStore;
use noema_core::{Engine, EngineConfig};

/// A concept to seed into the store before the codec is fit and the indexes
/// are built.
pub struct Fixture {
    pub name: String,
    pub embedding: Vec<f32>,
}

pub fn fixture(name: impl Into<String>, embedding: Vec<f32>) -> Fixture {
    Fixture { name: name.into(), embedding }
}

/// A built test engine plus a lookup from fixture name to its assigned OID.
pub struct TestEngine {
    pub engine: Engine,
    pub store: Arc<ConceptStore>,
    _temp: tempfile::TempDir,
}

impl TestEngine {
    /// Resolve a fixture's OID by the name it was seeded with.
    pub fn oid(&self, name: &str) -> Oid {
        self.store
            .iter_all()
            .unwrap()
            .into_iter()
            .find(|c| c.symbolic_name == name)
            .unwrap_or_else(|| panic!("no fixture named {name:?}"))
            .oid
    }
}

/// Build an engine over `fixtures`, fitting the codec in-sample (the
/// training set is exactly the concepts being indexed) so decode/AGL gets
/// the best structure-preservation fidelity available for a small corpus.
pub fn build_engine(fixtures: Vec<Fixture>, n_components: usize, capital_d: usize) -> TestEngine {
    build_engine_with_config(fixtures, n_components, capital_d, EngineConfig::default())
}

/// As [`build_engine`], but with a caller-supplied config — for tests that
/// need to relax validation thresholds or codec shape beyond the defaults
/// (e.g. a later refit over a small synthetic corpus).
pub fn build_engine_with_config(
    fixtures: Vec<Fixture>,
    n_components: usize,
    capital_d: usize,
    config: EngineConfig,
) -> TestEngine {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("noema-e2e.db");
    let store = Arc::new(ConceptStore::new(Some(db_path)).unwrap());

    let samples: Vec<Vec<f32>> = fixtures.iter().map(|f| f.embedding.clone()).collect();
    let codec = LaplaceCodec::fit(&samples, capital_d, n_components, 7).unwrap();

    for f in &fixtures {
        let mut c = Concept::new(f.name.clone());
        c.geometric_embedding = Some(f.embedding.clone());
        c.embedding_model_tag = Some("fixture".to_string());
        store.create(&c).unwrap();
    }

    let embedder: Arc<dyn Embedder> = Arc::new(FixedEmbedder::new(samples[0].len()));
    let engine = Engine::new(store.clone(), codec, embedder, config);
    engine.full_rebuild().unwrap();

    TestEngine { engine, store, _temp: temp }
}

/// Add a relation edge between two already-seeded fixtures, by name.
pub fn relate(e: &TestEngine, source: &str, kind: RelationKind, target: &str) {
    e.store.add_relation(&e.oid(source), kind, &e.oid(target)).unwrap();
}
