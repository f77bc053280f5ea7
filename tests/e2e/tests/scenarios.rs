//! The six concrete end-to-end scenarios: analogy, include/exclude recipe
//! search, degenerate exclude, empty context, post-refit stability, and
//! crash-replay idempotency.

use noema_core::concept::Concept;
use noema_core::maintenance::RefitDecision;
use noema_core::reasoning::{QueryPlan, ReasoningError};
use noema_core::EngineConfig;

use noema_e2e_tests::{build_engine, build_engine_with_config, fixture};

#[test]
fn analogy_king_man_woman_resolves_to_queen() {
    // man -> king and woman -> queen share the same offset, so king's
    // neighborhood minus {king, man, woman} leaves queen as the sole
    // remaining candidate regardless of how well HRC's algebra tracks the
    // exact offset (property P6: the winner must come from that candidate set).
    let t = build_engine(
        vec![
            fixture("man", vec![1.0, 0.0, 0.0]),
            fixture("woman", vec![0.0, 1.0, 0.0]),
            fixture("king", vec![1.0, 0.0, 1.0]),
            fixture("queen", vec![0.0, 1.0, 1.0]),
        ],
        4,
        128,
    );

    let plan = QueryPlan::analogy("king", "man", "woman", 4);
    let handle = t.engine.reason(&plan).unwrap();
    assert_eq!(handle.oid, t.oid("queen"));
}

#[test]
fn recipe_search_prefers_the_recipe_with_both_ingredients_and_not_the_excluded_one() {
    // margherita is the only recipe near both "tomato" and "basil" within a
    // context window of 2 around each anchor; "anchovy" never enters the
    // context at all since recipe_search's context union is built only from
    // `include` terms.
    let t = build_engine(
        vec![
            fixture("tomato", vec![1.0, 0.0, 0.0, 0.0]),
            fixture("basil", vec![0.0, 1.0, 0.0, 0.0]),
            fixture("anchovy", vec![0.0, 0.0, 1.0, 0.0]),
            fixture("margherita", vec![0.8, 0.8, 0.0, 0.0]),
        ],
        4,
        256,
    );

    let plan = QueryPlan::recipe_search(
        vec!["tomato".to_string(), "basil".to_string()],
        vec!["anchovy".to_string()],
        2,
    );
    let handle = t.engine.reason(&plan).unwrap();

    let context: Vec<_> = [t.oid("tomato"), t.oid("basil"), t.oid("margherita")];
    assert!(context.contains(&handle.oid));
    assert_ne!(handle.oid, t.oid("anchovy"));
}

#[test]
fn degenerate_exclude_equal_to_include_never_escapes_the_candidate_set() {
    let t = build_engine(
        vec![
            fixture("tomato", vec![1.0, 0.0, 0.0]),
            fixture("basil", vec![0.0, 1.0, 0.0]),
        ],
        2,
        64,
    );

    let plan = QueryPlan::recipe_search(
        vec!["tomato".to_string()],
        vec!["tomato".to_string()],
        2,
    );
    match t.engine.reason(&plan) {
        Err(ReasoningError::NoMatch) => {}
        Ok(handle) => {
            let context = [t.oid("tomato"), t.oid("basil")];
            assert!(context.contains(&handle.oid));
        }
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_context_is_reported_when_gce_retrieves_nothing() {
    // LaplaceCodec::fit requires at least two samples regardless of
    // n_components, so a second fixture rides along purely to make the fit
    // valid; "filler" never enters the query. An unreachable l1_threshold
    // forces GCE's raw L1 retrieval to come back empty.
    let config = EngineConfig { l1_threshold: 2.0, ..EngineConfig::default() };
    let t = build_engine_with_config(
        vec![
            fixture("dog", vec![1.0, 0.0, 0.0]),
            fixture("filler", vec![0.0, 1.0, 0.0]),
        ],
        2,
        64,
        config,
    );

    let plan = QueryPlan::general_search("dog", 5);
    let err = t.engine.reason(&plan).unwrap_err();
    assert!(matches!(err, ReasoningError::EmptyContext));
}

#[test]
fn post_refit_analogy_still_resolves_to_the_same_concept() {
    // A lenient validation threshold: this test is exercising refit
    // mechanics and candidate-set narrowing, not codec fidelity (which has
    // its own dedicated coverage in `noema-core::codec`).
    let config = EngineConfig {
        validation_correlation_threshold: 0.0,
        codec_n_components: 16,
        codec_d: 128,
        ..EngineConfig::default()
    };
    let t = build_engine_with_config(
        vec![
            fixture("man", vec![1.0, 0.0, 0.0]),
            fixture("woman", vec![0.0, 1.0, 0.0]),
            fixture("king", vec![1.0, 0.0, 1.0]),
            fixture("queen", vec![0.0, 1.0, 1.0]),
        ],
        4,
        128,
        config,
    );

    let before = t.engine.reason(&QueryPlan::analogy("king", "man", "woman", 4)).unwrap();
    assert_eq!(before.oid, t.oid("queen"));

    // Cross the default refit threshold (100 dirty concepts) with filler
    // concepts uninvolved in the analogy itself, then let the sync worker
    // observe the churn before asking the scheduler to decide.
    for i in 0..120 {
        let mut c = Concept::new(format!("filler-{i}"));
        c.geometric_embedding = Some(vec![(i as f32).sin(), (i as f32).cos(), 0.0]);
        c.embedding_model_tag = Some("fixture".to_string());
        t.store.create(&c).unwrap();
    }
    t.engine.rebuild_indexes().unwrap();

    let decision = t.engine.maybe_refit().unwrap();
    assert_eq!(decision, RefitDecision::Refit);

    let after = t.engine.reason(&QueryPlan::analogy("king", "man", "woman", 4)).unwrap();
    assert_eq!(after.oid, t.oid("queen"));
}

#[test]
fn replaying_from_watermark_zero_after_a_simulated_crash_loses_nothing() {
    let t = build_engine(
        (0..50)
            .map(|i| {
                fixture(
                    format!("concept-{i}"),
                    vec![(i as f32).sin(), (i as f32).cos(), i as f32 * 0.01],
                )
            })
            .collect(),
        8,
        128,
    );

    let before = t.engine.stats();

    // A crash loses the in-memory sync watermark but not anything committed
    // to the store; a fresh `full_rebuild` from the same store must land on
    // the same index contents (P3, P5's idempotent-replay clause).
    let after_replay = t.engine.full_rebuild().unwrap();
    assert_eq!(after_replay.concepts_seen, 50);

    let after = t.engine.stats();
    assert_eq!(after.l1.total_vectors, before.l1.total_vectors);
    assert_eq!(after.l2.total_vectors, before.l2.total_vectors);
}
