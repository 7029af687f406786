//! Gold-side queries the rules reason over: token alignments, subgraph
//! roots and undischarged head relations.

use std::collections::BTreeMap;

use crate::error::GraphError;
use crate::graph::{Amr, NodeId, RootPolicy};

/// Read-only view of a prepared gold graph with its token index built
/// once per sentence.
#[derive(Debug)]
pub struct Resolver<'a> {
    gold: &'a Amr,
    policy: RootPolicy,
    index: BTreeMap<NodeId, Vec<NodeId>>,
}

impl<'a> Resolver<'a> {
    pub fn new(gold: &'a Amr, policy: RootPolicy) -> Self {
        Resolver {
            gold,
            policy,
            index: gold.token_index(),
        }
    }

    pub fn gold(&self) -> &'a Amr {
        self.gold
    }

    /// Sorted gold nodes aligned to the token position of `item`.
    /// Synthesized items have none.
    pub fn alignment(&self, item: NodeId) -> &[NodeId] {
        self.index.get(&item).map_or(&[][..], Vec::as_slice)
    }

    /// The single node of an alignment, or the root of the subgraph it
    /// induces. `None` for an empty alignment.
    pub fn root_of(&self, alignment: &[NodeId]) -> Result<Option<NodeId>, GraphError> {
        match alignment {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            _ => Ok(Some(self.gold.find_subgraph(alignment, self.policy)?.root)),
        }
    }

    /// True when the two items realize overlapping gold material and
    /// belong in one span.
    pub fn merges(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return false;
        }
        let (first, second) = (self.alignment(a), self.alignment(b));
        if first.is_empty() || second.is_empty() {
            return false;
        }
        first == second || first.iter().any(|n| second.contains(n))
    }

    /// Label of a gold edge from root(x) to root(y) that `predicted`
    /// does not yet carry as `(x, label, y)`.
    ///
    /// Gold edges are scanned in order; the first undischarged one wins.
    pub fn is_head(&self, predicted: &Amr, x: NodeId, y: NodeId) -> Result<Option<&'a str>, GraphError> {
        let (x_align, y_align) = (self.alignment(x), self.alignment(y));
        if x_align.is_empty() || y_align.is_empty() {
            return Ok(None);
        }
        let (Some(source), Some(target)) = (self.root_of(x_align)?, self.root_of(y_align)?) else {
            return Ok(None);
        };
        let gold = self.gold;
        Ok(gold
            .edges
            .iter()
            .filter(|e| e.source == source && e.target == target)
            .find(|e| !predicted.has_edge(x, &e.label, y))
            .map(|e| e.label.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, ROOT_ID};
    use crate::preprocess::add_root;

    /// "the dog runs" with run-01 :ARG0 dog.
    fn dog_runs() -> Amr {
        let mut gold = Amr::new(vec!["the".into(), "dog".into(), "runs".into()]);
        gold.nodes.insert(0, "run-01".into());
        gold.nodes.insert(1, "dog".into());
        gold.alignments.insert(0, vec![3]);
        gold.alignments.insert(1, vec![2]);
        gold.edges.push(Edge::new(0, ":ARG0", 1));
        gold.root = Some(0);
        add_root(&mut gold);
        gold
    }

    #[test]
    fn alignments_follow_token_positions() {
        let gold = dog_runs();
        let r = Resolver::new(&gold, RootPolicy::Strict);
        assert!(r.alignment(1).is_empty());
        assert_eq!(r.alignment(2), &[1]);
        assert_eq!(r.alignment(ROOT_ID), &[ROOT_ID]);
        assert!(r.alignment(99).is_empty());
    }

    #[test]
    fn is_head_skips_discharged_edges() {
        let gold = dog_runs();
        let r = Resolver::new(&gold, RootPolicy::Strict);
        let mut predicted = Amr::new(gold.tokens.clone());
        assert_eq!(r.is_head(&predicted, 3, 2).unwrap(), Some(":ARG0"));
        assert_eq!(r.is_head(&predicted, 2, 3).unwrap(), None);
        assert_eq!(r.is_head(&predicted, ROOT_ID, 3).unwrap(), Some("root"));
        assert_eq!(r.is_head(&predicted, 1, 3).unwrap(), None);

        predicted.edges.push(Edge::new(3, ":ARG0", 2));
        assert_eq!(r.is_head(&predicted, 3, 2).unwrap(), None);
    }

    #[test]
    fn merges_on_shared_nodes() {
        let mut gold = Amr::new(vec!["New".into(), "York".into(), "City".into()]);
        gold.nodes.insert(0, "city".into());
        gold.nodes.insert(1, "name".into());
        gold.alignments.insert(0, vec![1, 2, 3]);
        gold.alignments.insert(1, vec![1, 2]);
        gold.edges.push(Edge::new(0, ":name", 1));
        let r = Resolver::new(&gold, RootPolicy::Strict);
        assert!(r.merges(1, 2));
        assert!(r.merges(2, 3));
        assert!(!r.merges(2, 2));
        assert!(!r.merges(2, 4));
        assert_eq!(r.root_of(r.alignment(1)).unwrap(), Some(0));
    }

    #[test]
    fn ambiguous_root_follows_policy() {
        let mut gold = Amr::new(vec!["x".into()]);
        gold.nodes.insert(0, "a".into());
        gold.nodes.insert(1, "b".into());
        gold.alignments.insert(0, vec![1]);
        gold.alignments.insert(1, vec![1]);
        let strict = Resolver::new(&gold, RootPolicy::Strict);
        assert!(matches!(
            strict.root_of(strict.alignment(1)),
            Err(GraphError::AmbiguousSubgraph { .. })
        ));
        let lowest = Resolver::new(&gold, RootPolicy::LowestId);
        assert_eq!(lowest.root_of(lowest.alignment(1)).unwrap(), Some(0));
    }
}
