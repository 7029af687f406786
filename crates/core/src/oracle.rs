//! Per-sentence derivation loop.
//!
//! `derive` prepares the gold graph, then asks the rules for one
//! decision at a time and applies it until the configuration is
//! terminal, the rules run dry, or the step budget is spent. CLOSE runs
//! in every case, so a stalled sentence still yields a partial graph.

use log::{debug, warn};
use serde::Serialize;

use crate::action::{Action, ActionKind};
use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::graph::{Amr, ROOT_TOKEN};
use crate::machine::StateMachine;
use crate::preprocess::prepare;
use crate::resolver::Resolver;
use crate::rules::{decide, Decision};
use crate::stats::{Anomaly, OracleStats};

/// Everything one sentence produces.
#[derive(Debug, Clone, Serialize)]
pub struct Derivation {
    pub id: Option<String>,
    /// Prepared tokens, placeholders and `<ROOT>` included.
    pub tokens: Vec<String>,
    pub actions: Vec<Action>,
    pub predicted: Amr,
    pub stats: OracleStats,
    pub anomaly: Option<Anomaly>,
}

impl Derivation {
    /// Tokens without the trailing `<ROOT>`.
    pub fn sentence(&self) -> &[String] {
        match self.tokens.split_last() {
            Some((last, rest)) if last == ROOT_TOKEN => rest,
            _ => &self.tokens,
        }
    }
}

/// Derive the action trace that rebuilds `gold`.
pub fn derive(mut gold: Amr, config: &OracleConfig) -> Result<Derivation, OracleError> {
    if gold.tokens.is_empty() {
        return Err(OracleError::EmptySentence);
    }
    if gold.root.is_none() {
        return Err(OracleError::MissingRoot);
    }

    let report = prepare(&mut gold, config);
    let mut stats = OracleStats {
        sentences: 1,
        alignment_repairs: report.repaired,
        unaligned_bound: report.bound_unaligned.len(),
        ..Default::default()
    };

    let mut machine = StateMachine::new(&gold.tokens);
    let resolver = Resolver::new(&gold, config.root_tie_break);
    let budget = config.step_budget(gold.tokens.len());
    let mut anomaly = None;

    let mut steps = 0;
    while !machine.is_terminal() {
        if steps >= budget {
            warn!(
                "sentence {}: step budget of {} exhausted",
                gold.id.as_deref().unwrap_or("?"),
                budget
            );
            anomaly = Some(Anomaly::StepLimit);
            break;
        }
        let decision = decide(&machine, &resolver)?;
        if decision == Decision::Close {
            warn!(
                "sentence {}: no rule applies with stack {:?}",
                gold.id.as_deref().unwrap_or("?"),
                machine.stack
            );
            anomaly = Some(Anomaly::Stall);
            break;
        }

        let descriptor = describe(&machine, &decision);
        apply(&mut machine, &decision)?;
        let descriptor = match decision {
            Decision::Merge => machine
                .stack0()
                .map(|s0| machine.surface(s0))
                .unwrap_or_default(),
            _ => descriptor,
        };
        if let Decision::Entity(entity_type) = &decision {
            stats.entity_types.add(entity_type.as_str());
        }
        debug!("{} {}", decision.to_action(), descriptor);
        stats.record(decision.kind(), descriptor);
        steps += 1;
    }

    if let Some(a) = anomaly {
        machine.abandon();
        stats.anomaly(a);
    }
    let tally = machine.close(Some(&gold), config.use_entity_rules);
    stats.entity_rules.merge(&tally);

    let mut predicted = machine.amr;
    predicted.id = gold.id.clone();
    Ok(Derivation {
        id: gold.id,
        tokens: gold.tokens,
        actions: machine.actions,
        predicted,
        stats,
        anomaly,
    })
}

fn apply(machine: &mut StateMachine, decision: &Decision) -> Result<(), OracleError> {
    match decision {
        Decision::Introduce { position } => machine.introduce(*position)?,
        other => machine.apply(&other.to_action())?,
    }
    Ok(())
}

/// Human-readable key for the statistics table, taken before the
/// action changes the configuration.
fn describe(machine: &StateMachine, decision: &Decision) -> String {
    let s0 = machine.stack0().map(|i| machine.label(i)).unwrap_or_default();
    let s1 = machine.stack1().map(|i| machine.label(i)).unwrap_or_default();
    match decision {
        Decision::Shift => machine
            .buffer0()
            .map(|b| machine.label(b).to_owned())
            .unwrap_or_default(),
        Decision::Entity(entity_type) => {
            let surface = machine.stack0().map(|i| machine.surface(i)).unwrap_or_default();
            format!("{} ({})", surface, entity_type)
        }
        Decision::Confirm(label) => format!("{} => {}", s0, label),
        Decision::Dependent { edge, node } => format!("{} {}", edge, node),
        Decision::Introduce { position } => {
            let latent = machine
                .latent
                .get(*position)
                .map(|i| machine.label(*i))
                .unwrap_or_default();
            format!("{} {}", latent, s0)
        }
        Decision::LeftArc(label) => format!("{} {} {}", s0, label, s1),
        Decision::RightArc(label) => format!("{} {} {}", s1, label, s0),
        Decision::Reduce => s0.to_owned(),
        Decision::Swap => format!("swapped: {} stack0: {}", s1, s0),
        Decision::Merge | Decision::Close => String::new(),
    }
}

/// Descriptor kinds the statistics report prints, in report order.
pub const REPORTED_KINDS: [ActionKind; 9] = [
    ActionKind::Merge,
    ActionKind::Entity,
    ActionKind::Confirm,
    ActionKind::Dependent,
    ActionKind::Introduce,
    ActionKind::LeftArc,
    ActionKind::RightArc,
    ActionKind::Reduce,
    ActionKind::Swap,
];
