//! amr-oracle-core: rule-based derivation oracle for transition-based
//! AMR parsing.
//!
//! Given a gold AMR graph aligned to its tokens, the oracle computes the
//! action sequence a stack/buffer/latent transition system needs to
//! rebuild that graph.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`derive()`] -- run the oracle on one sentence
//! - [`run_corpus()`] -- run it on a corpus, in parallel
//! - [`Amr`] -- aligned graph, gold or predicted
//! - [`StateMachine`] -- parsing configuration and its actions
//! - [`Decision`], [`Rule`], [`PRIORITY`] -- the applicability rules
//! - [`OracleConfig`] -- run configuration
//! - Errors: [`OracleError`], [`GraphError`], [`TransitionError`],
//!   [`ReadError`], [`ConfigError`], [`CorpusError`]

pub mod action;
pub mod config;
pub mod corpus;
pub mod entity_rules;
pub mod error;
pub mod graph;
pub mod machine;
pub mod oracle;
pub mod preprocess;
pub mod reader;
pub mod resolver;
pub mod rules;
pub mod stats;
pub mod writer;

// ── Convenience re-exports: key types ────────────────────────────────

pub use action::{Action, ActionKind};
pub use config::OracleConfig;
pub use error::{ConfigError, CorpusError, GraphError, OracleError, ReadError, TransitionError};
pub use graph::{Amr, Edge, NodeId, RootPolicy};
pub use machine::StateMachine;
pub use oracle::Derivation;
pub use resolver::Resolver;
pub use rules::{Decision, Rule, PRIORITY};
pub use stats::{Anomaly, Counter, OracleStats};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use corpus::{replay, run_corpus, CorpusRun};
pub use oracle::derive;
pub use reader::{read_corpus_file, read_oracle_file};
