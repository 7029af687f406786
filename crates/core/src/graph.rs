//! Aligned AMR graph shared by the gold side and the predicted side of
//! a derivation.
//!
//! Gold graphs use dense node ids assigned by the reader. Predicted
//! graphs reuse 1-based token positions as node ids and allocate fresh
//! ids above the token count for synthesized nodes. Id `-1` is the
//! synthetic root in both.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

pub type NodeId = i64;

/// Node id (and token position) of the synthetic root.
pub const ROOT_ID: NodeId = -1;
/// Surface form of the synthetic root token and label of its node.
pub const ROOT_TOKEN: &str = "<ROOT>";
/// Surface form of an injected placeholder token.
pub const UNALIGNED_TOKEN: &str = "<unaligned>";
/// Label of the sentinel edge attaching the true root.
pub const ROOT_EDGE: &str = "root";
/// Label of the internal link between an entity head and its surface.
pub const ENTITY_EDGE: &str = "entity";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub label: String,
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: NodeId, label: impl Into<String>, target: NodeId) -> Self {
        Edge {
            source,
            label: label.into(),
            target,
        }
    }
}

/// How to settle an alignment set that induces more than one root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootPolicy {
    /// Fail with [`GraphError::AmbiguousSubgraph`].
    #[default]
    Strict,
    /// Pick the smallest candidate id.
    LowestId,
}

/// Root and internal edges of the subgraph induced by a node set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubGraph {
    pub root: NodeId,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Amr {
    pub id: Option<String>,
    pub tokens: Vec<String>,
    pub nodes: BTreeMap<NodeId, String>,
    pub edges: Vec<Edge>,
    pub root: Option<NodeId>,
    /// node id -> 1-based token positions
    pub alignments: BTreeMap<NodeId, Vec<NodeId>>,
}

impl Amr {
    pub fn new(tokens: Vec<String>) -> Self {
        Amr {
            tokens,
            ..Default::default()
        }
    }

    pub fn label(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(String::as_str)
    }

    /// Sorted ids of the nodes aligned to token position `token`.
    pub fn alignments_token_to_node(&self, token: NodeId) -> Vec<NodeId> {
        self.alignments
            .iter()
            .filter(|(_, positions)| positions.contains(&token))
            .map(|(node, _)| *node)
            .collect()
    }

    /// Position -> aligned node ids, for every aligned position at once.
    pub fn token_index(&self) -> BTreeMap<NodeId, Vec<NodeId>> {
        let mut index: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (node, positions) in &self.alignments {
            for pos in positions {
                let entry = index.entry(*pos).or_default();
                if !entry.contains(node) {
                    entry.push(*node);
                }
            }
        }
        for nodes in index.values_mut() {
            nodes.sort_unstable();
        }
        index
    }

    pub fn is_aligned(&self, node: NodeId) -> bool {
        self.alignments.get(&node).is_some_and(|p| !p.is_empty())
    }

    pub fn has_edge(&self, source: NodeId, label: &str, target: NodeId) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target && e.label == label)
    }

    pub fn has_incident_edge(&self, node: NodeId) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == node || e.target == node)
    }

    /// Edges with both endpoints in `nodes`, in edge-list order.
    pub fn subgraph_edges(&self, nodes: &[NodeId]) -> Vec<Edge> {
        self.edges
            .iter()
            .filter(|e| nodes.contains(&e.source) && nodes.contains(&e.target))
            .cloned()
            .collect()
    }

    /// Root and internal edges of the subgraph induced by `nodes`.
    ///
    /// The root is the member with no incoming edge from another member.
    /// When every member has one, the member entered from outside the set
    /// is used instead. Anything else is resolved by `policy`. Every
    /// member must be a node of the graph.
    pub fn find_subgraph(&self, nodes: &[NodeId], policy: RootPolicy) -> Result<SubGraph, GraphError> {
        let edges = self.subgraph_edges(nodes);
        let members: BTreeSet<NodeId> = nodes.iter().copied().collect();
        if let Some(missing) = members.iter().find(|n| !self.nodes.contains_key(*n)) {
            return Err(GraphError::UnknownNode(*missing));
        }
        let Some(&lowest) = members.first() else {
            return Err(GraphError::AmbiguousSubgraph {
                nodes: Vec::new(),
                candidates: Vec::new(),
            });
        };

        let mut candidates: Vec<NodeId> = members
            .iter()
            .copied()
            .filter(|n| !edges.iter().any(|e| e.target == *n && e.source != *n))
            .collect();
        if candidates.is_empty() {
            candidates = members
                .iter()
                .copied()
                .filter(|n| {
                    self.edges
                        .iter()
                        .any(|e| e.target == *n && !members.contains(&e.source))
                })
                .collect();
        }

        let root = match (candidates.as_slice(), policy) {
            ([only], _) => *only,
            ([], RootPolicy::LowestId) => lowest,
            ([first, ..], RootPolicy::LowestId) => *first,
            (_, RootPolicy::Strict) => {
                return Err(GraphError::AmbiguousSubgraph {
                    nodes: members.into_iter().collect(),
                    candidates,
                })
            }
        };
        Ok(SubGraph { root, edges })
    }

    /// Next id above every node id and token position in use.
    pub fn next_free_id(&self) -> NodeId {
        let above_nodes = self.nodes.keys().next_back().copied().unwrap_or(0) + 1;
        let above_tokens = self.tokens.len() as NodeId + 1;
        above_nodes.max(above_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amr(nodes: &[(NodeId, &str)], edges: &[(NodeId, &str, NodeId)]) -> Amr {
        let mut g = Amr::new(vec![]);
        for (id, label) in nodes {
            g.nodes.insert(*id, label.to_string());
        }
        for (s, r, t) in edges {
            g.edges.push(Edge::new(*s, *r, *t));
        }
        g
    }

    #[test]
    fn token_alignment_is_sorted() {
        let mut g = amr(&[(0, "a"), (1, "b"), (2, "c")], &[]);
        g.alignments.insert(2, vec![1]);
        g.alignments.insert(0, vec![1, 2]);
        g.alignments.insert(1, vec![3]);
        assert_eq!(g.alignments_token_to_node(1), vec![0, 2]);
        assert_eq!(g.alignments_token_to_node(3), vec![1]);
        assert!(g.alignments_token_to_node(4).is_empty());
        assert_eq!(g.token_index()[&1], vec![0, 2]);
    }

    #[test]
    fn subgraph_root_is_node_without_internal_parent() {
        let g = amr(
            &[(0, "city"), (1, "name"), (2, "\"New\""), (3, "\"York\"")],
            &[(0, ":name", 1), (1, ":op1", 2), (1, ":op2", 3)],
        );
        let sub = g.find_subgraph(&[0, 1, 2, 3], RootPolicy::Strict).unwrap();
        assert_eq!(sub.root, 0);
        assert_eq!(sub.edges.len(), 3);
    }

    #[test]
    fn disconnected_set_is_ambiguous_when_strict() {
        let g = amr(&[(0, "a"), (1, "b"), (2, "c")], &[(0, ":ARG0", 1)]);
        let err = g.find_subgraph(&[1, 2, 0], RootPolicy::Strict).unwrap_err();
        assert_eq!(
            err,
            GraphError::AmbiguousSubgraph {
                nodes: vec![0, 1, 2],
                candidates: vec![0, 2],
            }
        );
        let sub = g.find_subgraph(&[1, 2, 0], RootPolicy::LowestId).unwrap();
        assert_eq!(sub.root, 0);
    }

    #[test]
    fn cycle_falls_back_to_entry_point() {
        let g = amr(
            &[(0, "x"), (1, "a"), (2, "b")],
            &[(1, ":ARG0", 2), (2, ":ARG1-of", 1), (0, ":ARG1", 1)],
        );
        let sub = g.find_subgraph(&[1, 2], RootPolicy::Strict).unwrap();
        assert_eq!(sub.root, 1);
    }

    #[test]
    fn members_must_exist() {
        let g = amr(&[(0, "a"), (1, "b")], &[(0, ":ARG0", 1)]);
        assert_eq!(
            g.find_subgraph(&[0, 1, 9], RootPolicy::LowestId),
            Err(GraphError::UnknownNode(9))
        );
    }

    #[test]
    fn cyclic_set_without_entry_takes_lowest_member() {
        let g = amr(&[(3, "a"), (5, "b")], &[(3, ":ARG0", 5), (5, ":ARG1", 3)]);
        assert!(g.find_subgraph(&[5, 3], RootPolicy::Strict).is_err());
        let sub = g.find_subgraph(&[5, 3], RootPolicy::LowestId).unwrap();
        assert_eq!(sub.root, 3);
    }

    #[test]
    fn next_free_id_clears_tokens_and_nodes() {
        let mut g = amr(&[(1, "a"), (7, "b")], &[]);
        g.tokens = vec!["x".into(); 9];
        assert_eq!(g.next_free_id(), 10);
    }
}
