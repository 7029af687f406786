//! Frequency tables collected while deriving. Nothing here feeds back
//! into a derivation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::action::ActionKind;
use crate::entity_rules::EntityRuleTally;

/// String-keyed frequency counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Counter(BTreeMap<String, usize>);

impl Counter {
    pub fn new() -> Self {
        Counter(BTreeMap::new())
    }

    pub fn add(&mut self, key: impl Into<String>) {
        self.add_n(key, 1);
    }

    pub fn add_n(&mut self, key: impl Into<String>, n: usize) {
        *self.0.entry(key.into()).or_default() += n;
    }

    pub fn get(&self, key: &str) -> usize {
        self.0.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// The `n` most frequent keys; ties are broken by key order.
    pub fn most_common(&self, n: usize) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> =
            self.0.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.truncate(n);
        entries
    }

    pub fn merge(&mut self, other: &Counter) {
        for (key, n) in &other.0 {
            self.add_n(key.clone(), *n);
        }
    }
}

/// Ways a sentence can end without reproducing its gold graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anomaly {
    /// Buffer empty, stack not, and no rule applied.
    Stall,
    /// The step budget ran out.
    StepLimit,
    /// A token's aligned nodes had no unique root; the sentence was dropped.
    AmbiguousSubgraph,
    /// Any other per-sentence failure; the sentence was dropped.
    Failed,
}

impl Anomaly {
    pub fn name(self) -> &'static str {
        match self {
            Anomaly::Stall => "stall",
            Anomaly::StepLimit => "step-limit",
            Anomaly::AmbiguousSubgraph => "ambiguous-subgraph",
            Anomaly::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OracleStats {
    pub sentences: usize,
    pub steps: usize,
    /// Per action kind, counts of human-readable descriptors.
    pub actions: BTreeMap<ActionKind, Counter>,
    pub entity_types: Counter,
    pub anomalies: BTreeMap<Anomaly, usize>,
    /// Token-to-node links removed by the alignment repair.
    pub alignment_repairs: usize,
    /// Concepts bound to injected placeholder tokens.
    pub unaligned_bound: usize,
    pub entity_rules: EntityRuleTally,
}

impl OracleStats {
    pub fn record(&mut self, kind: ActionKind, descriptor: impl Into<String>) {
        self.steps += 1;
        self.actions.entry(kind).or_default().add(descriptor);
    }

    pub fn anomaly(&mut self, anomaly: Anomaly) {
        *self.anomalies.entry(anomaly).or_default() += 1;
    }

    pub fn anomaly_count(&self, anomaly: Anomaly) -> usize {
        self.anomalies.get(&anomaly).copied().unwrap_or(0)
    }

    pub fn action_count(&self, kind: ActionKind) -> usize {
        self.actions.get(&kind).map_or(0, Counter::total)
    }

    pub fn merge(&mut self, other: &OracleStats) {
        self.sentences += other.sentences;
        self.steps += other.steps;
        for (kind, counter) in &other.actions {
            self.actions.entry(*kind).or_default().merge(counter);
        }
        self.entity_types.merge(&other.entity_types);
        for (anomaly, n) in &other.anomalies {
            *self.anomalies.entry(*anomaly).or_default() += n;
        }
        self.alignment_repairs += other.alignment_repairs;
        self.unaligned_bound += other.unaligned_bound;
        self.entity_rules.merge(&other.entity_rules);
    }
}
