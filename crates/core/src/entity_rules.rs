//! Entity expansion run at CLOSE.
//!
//! ENTITY leaves a head labelled with the comma-joined entity type and
//! an `entity` child holding the surface tokens. Expansion replaces the
//! child with real structure:
//!
//! - `name`: `X,name` becomes `X :name (name :op1 "w1" :op2 "w2" ...)`
//! - `date-entity`: numeric and month-name tokens become `:year`,
//!   `:month`, `:day`
//! - `generic`: anything else keeps only the first type on the head
//!
//! In training mode every expansion is compared against the gold
//! subgraph aligned to the same token and scored per rule.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::graph::{Amr, Edge, NodeId, ENTITY_EDGE};
use crate::machine::StateMachine;
use crate::stats::Counter;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRule {
    Name,
    Date,
    Generic,
}

impl EntityRule {
    pub fn for_type(types: &[&str]) -> Self {
        match types {
            [_, "name"] => EntityRule::Name,
            ["date-entity"] => EntityRule::Date,
            _ => EntityRule::Generic,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityRule::Name => "name",
            EntityRule::Date => "date-entity",
            EntityRule::Generic => "generic",
        }
    }
}

/// Per-rule expansion outcomes against gold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityRuleTally {
    pub totals: Counter,
    pub hits: Counter,
    /// `surface (type)` of every expansion that missed its gold subgraph.
    pub fails: Counter,
}

impl EntityRuleTally {
    pub fn accuracy(&self, rule: &str) -> Option<f64> {
        let total = self.totals.get(rule);
        (total > 0).then(|| self.hits.get(rule) as f64 / total as f64)
    }

    pub fn overall(&self) -> Option<f64> {
        let total = self.totals.total();
        (total > 0).then(|| self.hits.total() as f64 / total as f64)
    }

    pub fn merge(&mut self, other: &EntityRuleTally) {
        self.totals.merge(&other.totals);
        self.hits.merge(&other.hits);
        self.fails.merge(&other.fails);
    }
}

/// Expand one entity head in place.
pub(crate) fn expand(
    machine: &mut StateMachine,
    head: NodeId,
    gold: Option<&Amr>,
    use_rules: bool,
    tally: &mut EntityRuleTally,
) {
    let children = machine.entity_children(head);
    let surface = children
        .first()
        .map(|c| machine.label(*c).to_owned())
        .unwrap_or_else(|| machine.surface(head));
    machine
        .amr
        .edges
        .retain(|e| !(e.source == head && e.label == ENTITY_EDGE));
    for child in &children {
        machine.amr.nodes.remove(child);
    }

    let entity_type = machine.label(head).to_owned();
    let types: Vec<&str> = entity_type.split(',').collect();
    machine
        .amr
        .nodes
        .insert(head, types.first().copied().unwrap_or_default().to_owned());
    if !use_rules {
        return;
    }

    let words: Vec<String> = surface
        .split(',')
        .map(|w| w.replace("-COMMA-", ","))
        .collect();
    let rule = EntityRule::for_type(&types);
    let positions = machine.token_positions(head);
    let mut built = Builder {
        machine: &mut *machine,
        positions,
        edges: Vec::new(),
    };
    match rule {
        EntityRule::Name => {
            let name = built.node(head, ":name", "name");
            for (i, word) in words.iter().enumerate() {
                built.node(name, &format!(":op{}", i + 1), &format!("\"{}\"", word));
            }
        }
        EntityRule::Date => {
            let mut month_set = false;
            for word in &words {
                let lower = word.to_lowercase();
                if let Some(m) = MONTHS.iter().position(|m| *m == lower) {
                    built.node(head, ":month", &(m + 1).to_string());
                    month_set = true;
                    continue;
                }
                let Ok(value) = word.parse::<u32>() else {
                    continue;
                };
                if word.len() == 4 {
                    built.node(head, ":year", word);
                } else if (1..=12).contains(&value) && !month_set {
                    built.node(head, ":month", &value.to_string());
                    month_set = true;
                } else if (1..=31).contains(&value) {
                    built.node(head, ":day", &value.to_string());
                }
            }
        }
        EntityRule::Generic => {}
    }
    let edges = built.edges;

    let Some(gold) = gold else {
        return;
    };
    tally.totals.add(rule.name());
    let head_label = machine.label(head).to_owned();
    let predicted = signature(&edges, |id| machine.label(id).to_owned(), &[head_label]);
    let aligned = gold.alignments_token_to_node(head);
    let gold_edges = gold.subgraph_edges(&aligned);
    let gold_labels: Vec<String> = aligned
        .iter()
        .filter_map(|n| gold.label(*n))
        .map(str::to_owned)
        .collect();
    let expected = signature(
        &gold_edges,
        |id| gold.label(id).unwrap_or_default().to_owned(),
        &gold_labels,
    );
    if predicted == expected {
        tally.hits.add(rule.name());
    } else {
        tally.fails.add(format!("{} ({})", surface, entity_type));
    }
}

struct Builder<'a> {
    machine: &'a mut StateMachine,
    positions: Vec<NodeId>,
    edges: Vec<Edge>,
}

impl Builder<'_> {
    fn node(&mut self, parent: NodeId, edge: &str, label: &str) -> NodeId {
        let id = self.machine.fresh_id();
        self.machine.amr.nodes.insert(id, label.to_owned());
        self.machine.is_confirmed.insert(id);
        if !self.positions.is_empty() {
            self.machine.amr.alignments.insert(id, self.positions.clone());
        }
        let e = Edge::new(parent, edge, id);
        self.machine.amr.edges.push(e.clone());
        self.edges.push(e);
        id
    }
}

#[derive(Debug, PartialEq)]
enum Signature {
    Edges(Vec<(String, String, String)>),
    Nodes(Vec<String>),
}

/// Label-level shape of a subgraph, quotes stripped, order ignored.
fn signature(edges: &[Edge], label: impl Fn(NodeId) -> String, lone: &[String]) -> Signature {
    let clean = |s: String| s.trim_matches('"').to_owned();
    if edges.is_empty() {
        let mut nodes: Vec<String> = lone.iter().cloned().map(clean).collect();
        nodes.sort();
        return Signature::Nodes(nodes);
    }
    let mut triples: Vec<(String, String, String)> = edges
        .iter()
        .map(|e| (clean(label(e.source)), e.label.clone(), clean(label(e.target))))
        .collect();
    triples.sort();
    Signature::Edges(triples)
}

/// Totals per rule, rendered as `rule hits / total = ratio` lines.
pub fn summary_lines(tally: &EntityRuleTally) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let by_rule: BTreeMap<&str, usize> = tally.totals.most_common(usize::MAX).into_iter().collect();
    for (rule, total) in by_rule {
        lines.push(format!(
            "{} {} / {} = {:.2}",
            rule,
            tally.hits.get(rule),
            total,
            tally.accuracy(rule).unwrap_or(0.0)
        ));
    }
    if let Some(overall) = tally.overall() {
        lines.push(format!("Totals: {:.2}", overall));
    }
    lines
}
