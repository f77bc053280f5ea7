//! Noema CLI: a thin command-line front end over `noema-core`'s `Engine`.
//!
//! Every invocation is a fresh process: the engine is opened against the
//! on-disk concept store (and whatever codec it last persisted), the
//! requested command runs, and the process exits. There is no daemon.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;

use noema_core::codec::LaplaceCodec;
use noema_core::concept::{Concept, RelationKind};
use noema_core::embedder::fixtures::FixedEmbedder;
use noema_core::embedder::Embedder;
#[cfg(feature = "embeddings")]
use noema_core::embedder::FastEmbedder;
use noema_core::oid::Oid;
use noema_core::reasoning::{ConceptHandle, QueryPlan};
use noema_core::store::ConceptStore;
use noema_core::{Engine, EngineConfig};

#[derive(Parser)]
#[command(name = "noema", version, about = "Neuro-symbolic reasoning engine CLI")]
struct Cli {
    /// Path to the SQLite concept store. Defaults to the platform data directory.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a new concept by symbolic name, printing its OID.
    Ingest { name: String },
    /// Attach or replace a concept's geometric embedding using the default embedder.
    Embed { oid: String },
    /// Add a typed relation edge between two concepts.
    Relate {
        source: String,
        #[arg(value_enum)]
        kind: RelationArg,
        target: String,
    },
    /// Fit a fresh codec from every embedded concept and publish it.
    FitCodec,
    /// Rebuild both index tiers from the store's current contents.
    Rebuild,
    /// Run a plain nearest-neighbor search around a term.
    Search { term: String },
    /// Bundle `include` terms, fold out `exclude` terms, search the result.
    Recipe {
        #[arg(long = "include", required = true)]
        include: Vec<String>,
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },
    /// Solve `a : b :: c : ?` over the hypervector algebra.
    Analogy { a: String, b: String, c: String },
    /// Print index and sync statistics.
    Stats,
}

#[derive(Clone, clap::ValueEnum)]
enum RelationArg {
    IsA,
    PartOf,
    AssociatedWith,
}

impl From<RelationArg> for RelationKind {
    fn from(r: RelationArg) -> Self {
        match r {
            RelationArg::IsA => RelationKind::IsA,
            RelationArg::PartOf => RelationKind::PartOf,
            RelationArg::AssociatedWith => RelationKind::AssociatedWith,
        }
    }
}

fn default_embedder() -> anyhow::Result<Arc<dyn Embedder>> {
    #[cfg(feature = "embeddings")]
    {
        return Ok(Arc::new(FastEmbedder::new()?));
    }
    #[cfg(not(feature = "embeddings"))]
    {
        Ok(Arc::new(FixedEmbedder::new(768)))
    }
}

/// A codec to fall back on when the store has never persisted one yet.
/// Fit from a tiny synthetic sample so `Engine::open` always has something
/// to construct against before the first real `fit-codec` run.
fn bootstrap_codec(dimensions: usize) -> anyhow::Result<LaplaceCodec> {
    let samples: Vec<Vec<f32>> = (0..32)
        .map(|i| {
            (0..dimensions)
                .map(|j| ((i * 7 + j) as f32).sin())
                .collect()
        })
        .collect();
    Ok(LaplaceCodec::fit(&samples, 256, 16, 0)?)
}

fn open_engine(db_path: Option<PathBuf>) -> anyhow::Result<Engine> {
    let store = Arc::new(ConceptStore::new(db_path)?);
    let embedder = default_embedder()?;
    let fallback = bootstrap_codec(embedder.dimensions())?;
    let engine = Engine::open(store, fallback, embedder, EngineConfig::default())?;
    Ok(engine)
}

fn print_handle(label: &str, handle: &ConceptHandle) {
    println!("{label}:");
    println!("  {}  {}", handle.oid.as_str().cyan(), handle.symbolic_name);
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Ingest { name } => {
            let store = ConceptStore::new(cli.db_path)?;
            let concept = Concept::new(name);
            store.create(&concept)?;
            println!("{} {}", "created".green(), concept.oid.as_str());
        }
        Command::Embed { oid } => {
            let store = ConceptStore::new(cli.db_path)?;
            let oid = Oid::from(oid);
            let concept = store
                .get(&oid)?
                .ok_or_else(|| anyhow::anyhow!("no concept with oid {}", oid.as_str()))?;
            let embedder = default_embedder()?;
            let (vector, tag) = embedder.embed(&concept.symbolic_name)?;
            store.set_embedding(&oid, vector, tag)?;
            println!("{} {}", "embedded".green(), oid.as_str());
        }
        Command::Relate { source, kind, target } => {
            let store = ConceptStore::new(cli.db_path)?;
            store.add_relation(&Oid::from(source), kind.into(), &Oid::from(target))?;
            println!("{}", "related".green());
        }
        Command::FitCodec => {
            let engine = open_engine(cli.db_path)?;
            engine.fit_codec()?;
            println!("{}", "codec fit and published".green());
        }
        Command::Rebuild => {
            let engine = open_engine(cli.db_path)?;
            let report = engine.full_rebuild()?;
            println!(
                "{} concepts_seen={} l1={} l2={} watermark={}",
                "rebuilt".green(),
                report.concepts_seen,
                report.l1_upserts,
                report.l2_upserts,
                report.new_watermark
            );
        }
        Command::Search { term } => {
            let engine = open_engine(cli.db_path)?;
            let plan = QueryPlan::general_search(&term, engine.config().context_k);
            let handle = engine.reason(&plan)?;
            print_handle(&format!("search result for {term:?}"), &handle);
        }
        Command::Recipe { include, exclude } => {
            let engine = open_engine(cli.db_path)?;
            let context_k = engine.config().context_k;
            let plan = QueryPlan::recipe_search(include, exclude, context_k);
            let handle = engine.reason(&plan)?;
            print_handle("recipe result", &handle);
        }
        Command::Analogy { a, b, c } => {
            let engine = open_engine(cli.db_path)?;
            let context_k = engine.config().context_k;
            let plan = QueryPlan::analogy(&a, &b, &c, context_k);
            let handle = engine.reason(&plan)?;
            print_handle(&format!("{a} : {b} :: {c} : ?"), &handle);
        }
        Command::Stats => {
            let engine = open_engine(cli.db_path)?;
            let stats = engine.stats();
            println!("l1: {} vectors ({} tombstoned)", stats.l1.total_vectors, stats.l1.tombstoned);
            println!("l2: {} vectors ({} tombstoned)", stats.l2.total_vectors, stats.l2.tombstoned);
            println!("sync watermark: {}", stats.sync_watermark);
            println!("dirty since last fit: {}", stats.dirty_since_fit);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
