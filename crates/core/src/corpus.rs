//! Corpus-level runs: many independent sentences, results kept in input
//! order.

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::action::Action;
use crate::config::OracleConfig;
use crate::error::{CorpusError, GraphError, OracleError, TransitionError};
use crate::graph::Amr;
use crate::machine::StateMachine;
use crate::oracle::{derive, Derivation};
use crate::reader::OracleBlock;
use crate::stats::{Anomaly, OracleStats};

/// A sentence the oracle gave up on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentenceFailure {
    /// Position in the input corpus.
    pub index: usize,
    pub id: Option<String>,
    pub message: String,
    #[serde(skip)]
    pub error: OracleError,
}

pub type Outcome = Result<Derivation, SentenceFailure>;

#[derive(Debug, Clone)]
pub struct CorpusRun {
    /// One entry per input sentence, in input order.
    pub outcomes: Vec<Outcome>,
    pub stats: OracleStats,
}

impl CorpusRun {
    pub fn derivations(&self) -> impl Iterator<Item = &Derivation> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &SentenceFailure> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }
}

/// Derive every sentence of `amrs`, in parallel when more than one
/// worker is available.
pub fn run_corpus(amrs: Vec<Amr>, config: &OracleConfig) -> Result<CorpusRun, CorpusError> {
    let total = amrs.len();
    let work = || -> Vec<Outcome> {
        amrs.into_par_iter()
            .enumerate()
            .map(|(index, amr)| {
                let id = amr.id.clone();
                derive(amr, config).map_err(|error| SentenceFailure {
                    index,
                    id,
                    message: error.to_string(),
                    error,
                })
            })
            .collect()
    };
    let outcomes = match config.threads {
        Some(n) => rayon::ThreadPoolBuilder::new().num_threads(n).build()?.install(work),
        None => work(),
    };

    let mut stats = OracleStats::default();
    for outcome in &outcomes {
        match outcome {
            Ok(derivation) => stats.merge(&derivation.stats),
            Err(failure) => {
                warn!(
                    "sentence {} ({}): {}",
                    failure.index,
                    failure.id.as_deref().unwrap_or("no id"),
                    failure.message
                );
                stats.anomaly(failure_kind(&failure.error));
            }
        }
    }
    info!(
        "derived {} of {} sentences in {} steps",
        stats.sentences, total, stats.steps
    );
    Ok(CorpusRun { outcomes, stats })
}

fn failure_kind(error: &OracleError) -> Anomaly {
    match error {
        OracleError::Graph(GraphError::AmbiguousSubgraph { .. }) => Anomaly::AmbiguousSubgraph,
        _ => Anomaly::Failed,
    }
}

/// Rebuild the predicted graph of a recorded trace. A trailing CLOSE is
/// implied when the trace lacks one.
pub fn replay_block(block: &OracleBlock, use_entity_rules: bool) -> Result<Amr, TransitionError> {
    let mut machine = StateMachine::new(&block.tokens);
    for action in &block.actions {
        if *action == Action::Close {
            break;
        }
        machine.apply(action)?;
    }
    machine.close(None, use_entity_rules);
    Ok(machine.amr)
}

/// Replay every block; results line up with `blocks`.
pub fn replay(blocks: &[OracleBlock], use_entity_rules: bool) -> Vec<Result<Amr, TransitionError>> {
    blocks
        .par_iter()
        .map(|block| replay_block(block, use_entity_rules))
        .collect()
}
