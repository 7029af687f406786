//! Applicability rules and the priority-ordered decision.
//!
//! Each rule inspects the configuration and the gold graph and either
//! declines or names the action it licenses together with its
//! arguments. Rules never mutate anything; the driver applies the
//! winning [`Decision`].

use serde::Serialize;

use crate::action::{Action, ActionKind};
use crate::error::GraphError;
use crate::graph::{NodeId, ENTITY_EDGE};
use crate::machine::StateMachine;
use crate::resolver::Resolver;

/// Edge labels realized by DEPENDENT instead of a token.
pub const DEPENDENT_EDGES: [&str; 2] = [":polarity", ":mode"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rule {
    Merge,
    Entity,
    Confirm,
    Dependent,
    Introduce,
    #[serde(rename = "LA")]
    LeftArc,
    #[serde(rename = "RA")]
    RightArc,
    Reduce,
    Swap,
}

/// Evaluation order. The first rule that fires decides the step, so
/// reordering this changes every derivation.
pub const PRIORITY: [Rule; 9] = [
    Rule::Merge,
    Rule::Entity,
    Rule::Confirm,
    Rule::Dependent,
    Rule::Introduce,
    Rule::LeftArc,
    Rule::RightArc,
    Rule::Reduce,
    Rule::Swap,
];

/// What the oracle does next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Shift,
    Merge,
    Confirm(String),
    Dependent { edge: String, node: String },
    Entity(String),
    LeftArc(String),
    RightArc(String),
    Reduce,
    Swap,
    /// Reintroduce the latent item at this index of `latent`.
    Introduce { position: usize },
    /// Nothing applies and the buffer is empty.
    Close,
}

impl Decision {
    pub fn kind(&self) -> ActionKind {
        match self {
            Decision::Shift => ActionKind::Shift,
            Decision::Merge => ActionKind::Merge,
            Decision::Confirm(_) => ActionKind::Confirm,
            Decision::Dependent { .. } => ActionKind::Dependent,
            Decision::Entity(_) => ActionKind::Entity,
            Decision::LeftArc(_) => ActionKind::LeftArc,
            Decision::RightArc(_) => ActionKind::RightArc,
            Decision::Reduce => ActionKind::Reduce,
            Decision::Swap => ActionKind::Swap,
            Decision::Introduce { .. } => ActionKind::Introduce,
            Decision::Close => ActionKind::Close,
        }
    }

    /// The logged action this decision applies.
    pub fn to_action(&self) -> Action {
        match self {
            Decision::Shift => Action::Shift,
            Decision::Merge => Action::Merge,
            Decision::Confirm(label) => Action::Confirm(label.clone()),
            Decision::Dependent { edge, node } => Action::Dependent {
                edge: edge.clone(),
                node: node.clone(),
            },
            Decision::Entity(t) => Action::Entity(t.clone()),
            Decision::LeftArc(label) => Action::LeftArc(label.clone()),
            Decision::RightArc(label) => Action::RightArc(label.clone()),
            Decision::Reduce => Action::Reduce,
            Decision::Swap => Action::Swap,
            Decision::Introduce { .. } => Action::Introduce,
            Decision::Close => Action::Close,
        }
    }
}

impl Rule {
    pub fn name(self) -> &'static str {
        match self {
            Rule::Merge => "MERGE",
            Rule::Entity => "ENTITY",
            Rule::Confirm => "CONFIRM",
            Rule::Dependent => "DEPENDENT",
            Rule::Introduce => "INTRODUCE",
            Rule::LeftArc => "LA",
            Rule::RightArc => "RA",
            Rule::Reduce => "REDUCE",
            Rule::Swap => "SWAP",
        }
    }

    pub fn evaluate(self, m: &StateMachine, r: &Resolver<'_>) -> Result<Option<Decision>, GraphError> {
        match self {
            Rule::Merge => Ok(try_merge(m, r)),
            Rule::Entity => Ok(try_entity(m, r)),
            Rule::Confirm => try_confirm(m, r),
            Rule::Dependent => try_dependent(m, r),
            Rule::Introduce => try_introduce(m, r),
            Rule::LeftArc => try_arc(m, r, true),
            Rule::RightArc => try_arc(m, r, false),
            Rule::Reduce => try_reduce(m, r),
            Rule::Swap => try_swap(m, r),
        }
    }
}

/// First rule in [`PRIORITY`] that fires; SHIFT when none does and the
/// buffer has items, [`Decision::Close`] otherwise.
pub fn decide(m: &StateMachine, r: &Resolver<'_>) -> Result<Decision, GraphError> {
    for rule in PRIORITY {
        if let Some(decision) = rule.evaluate(m, r)? {
            return Ok(decision);
        }
    }
    if m.buffer.is_empty() {
        Ok(Decision::Close)
    } else {
        Ok(Decision::Shift)
    }
}

/// Every rule evaluated on the same configuration, in priority order.
pub fn evaluate_all(m: &StateMachine, r: &Resolver<'_>) -> Result<Vec<(Rule, Option<Decision>)>, GraphError> {
    PRIORITY
        .iter()
        .map(|rule| -> Result<_, GraphError> { Ok((*rule, rule.evaluate(m, r)?)) })
        .collect()
}

/// stack0 would merge with the next buffer item.
fn merge_pending(m: &StateMachine, r: &Resolver<'_>, s0: NodeId) -> bool {
    m.buffer0().is_some_and(|b0| r.merges(s0, b0))
}

fn try_merge(m: &StateMachine, r: &Resolver<'_>) -> Option<Decision> {
    let (s0, s1) = (m.stack0()?, m.stack1()?);
    r.merges(s0, s1).then_some(Decision::Merge)
}

fn try_entity(m: &StateMachine, r: &Resolver<'_>) -> Option<Decision> {
    let s0 = m.stack0()?;
    if m.entities.contains(&s0) {
        return None;
    }
    let align = r.alignment(s0);
    if align.len() <= 1 {
        return None;
    }
    if m.stack1().is_some_and(|s1| r.merges(s0, s1)) {
        return None;
    }
    if m.buffer.iter().rev().any(|b| r.merges(s0, *b)) {
        return None;
    }

    let gold = r.gold();
    let edges = gold.subgraph_edges(align);
    if edges.is_empty() {
        return None;
    }
    if align.len() == 2 && edges.len() == 1 && DEPENDENT_EDGES.contains(&edges[0].label.as_str()) {
        return None;
    }

    let heads: Vec<&str> = align
        .iter()
        .filter(|n| edges.iter().any(|e| e.source == **n))
        .filter_map(|n| gold.label(*n))
        .collect();
    Some(Decision::Entity(heads.join(",")))
}

fn try_confirm(m: &StateMachine, r: &Resolver<'_>) -> Result<Option<Decision>, GraphError> {
    let Some(s0) = m.stack0() else {
        return Ok(None);
    };
    let align = r.alignment(s0);
    let after_dependent = matches!(m.last_action(), Some(Action::Dependent { .. }));
    if !after_dependent && align.len() != 1 {
        return Ok(None);
    }
    if m.entities.contains(&s0) || m.is_confirmed.contains(&s0) {
        return Ok(None);
    }
    let Some(gold_id) = r.root_of(align)? else {
        return Ok(None);
    };
    Ok(r
        .gold()
        .label(gold_id)
        .map(|label| Decision::Confirm(label.to_owned())))
}

fn try_dependent(m: &StateMachine, r: &Resolver<'_>) -> Result<Option<Decision>, GraphError> {
    let Some(s0) = m.stack0() else {
        return Ok(None);
    };
    let align = r.alignment(s0);
    let Some(source) = r.root_of(align)? else {
        return Ok(None);
    };
    let gold = r.gold();
    for edge in gold.edges.iter().filter(|e| e.source == source) {
        if !DEPENDENT_EDGES.contains(&edge.label.as_str()) {
            continue;
        }
        if m.amr.edges.iter().any(|e| e.source == s0 && e.label == edge.label) {
            continue;
        }
        if !align.contains(&edge.target) && gold.is_aligned(edge.target) {
            continue;
        }
        return Ok(Some(Decision::Dependent {
            edge: edge.label.clone(),
            node: gold.label(edge.target).unwrap_or_default().to_owned(),
        }));
    }
    Ok(None)
}

fn try_introduce(m: &StateMachine, r: &Resolver<'_>) -> Result<Option<Decision>, GraphError> {
    let Some(s0) = m.stack0() else {
        return Ok(None);
    };
    if m.latent.is_empty() || merge_pending(m, r, s0) {
        return Ok(None);
    }
    for (position, latent) in m.latent.iter().enumerate().rev() {
        if r.is_head(&m.amr, s0, *latent)?.is_some() || r.is_head(&m.amr, *latent, s0)?.is_some() {
            return Ok(Some(Decision::Introduce { position }));
        }
    }
    Ok(None)
}

/// LA when `left`, RA otherwise.
fn try_arc(m: &StateMachine, r: &Resolver<'_>, left: bool) -> Result<Option<Decision>, GraphError> {
    let (Some(s0), Some(s1)) = (m.stack0(), m.stack1()) else {
        return Ok(None);
    };
    if merge_pending(m, r, s0) {
        return Ok(None);
    }
    let (head, dependent) = if left { (s0, s1) } else { (s1, s0) };
    Ok(r.is_head(&m.amr, head, dependent)?.map(|label| {
        if left {
            Decision::LeftArc(label.to_owned())
        } else {
            Decision::RightArc(label.to_owned())
        }
    }))
}

/// Reduce once every gold edge of the stack top's node has a predicted
/// counterpart.
fn try_reduce(m: &StateMachine, r: &Resolver<'_>) -> Result<Option<Decision>, GraphError> {
    let Some(s0) = m.stack0() else {
        return Ok(None);
    };
    let align = r.alignment(s0);
    if align.is_empty() {
        return Ok(Some(Decision::Reduce));
    }
    if m.buffer0().is_some_and(|b0| r.alignment(b0) == align) {
        return Ok(None);
    }
    let Some(gold_id) = r.root_of(align)? else {
        return Ok(None);
    };

    let predicted = m.amr.edges.iter().filter(|e| e.label != ENTITY_EDGE);
    let (mut out, mut inc) = (0usize, 0usize);
    for e in predicted {
        out += usize::from(e.source == s0);
        inc += usize::from(e.target == s0);
    }
    let gold = r.gold();
    let gold_out = gold.edges.iter().filter(|e| e.source == gold_id).count();
    let gold_in = gold.edges.iter().filter(|e| e.target == gold_id).count();
    if m.entities.contains(&s0) {
        for e in &gold.edges {
            out += usize::from(e.source == gold_id && align.contains(&e.target));
            inc += usize::from(e.target == gold_id && align.contains(&e.source));
        }
    }
    Ok((out == gold_out && inc == gold_in).then_some(Decision::Reduce))
}

fn try_swap(m: &StateMachine, r: &Resolver<'_>) -> Result<Option<Decision>, GraphError> {
    let (Some(s0), Some(s1)) = (m.stack0(), m.stack1()) else {
        return Ok(None);
    };
    if m.were_swapped(s0, s1) || merge_pending(m, r, s0) {
        return Ok(None);
    }
    let align = r.alignment(s0);
    for item in m.stack.iter().copied().filter(|i| *i != s0 && *i != s1) {
        if r.is_head(&m.amr, s0, item)?.is_some() || r.is_head(&m.amr, item, s0)?.is_some() {
            return Ok(Some(Decision::Swap));
        }
        if !align.is_empty() && r.alignment(item) == align {
            return Ok(Some(Decision::Swap));
        }
    }
    Ok(None)
}
