//! Gold graph preparation before derivation: alignment repair,
//! placeholder tokens for unaligned concepts, sentinel root.

use log::debug;

use crate::config::OracleConfig;
use crate::graph::{Amr, Edge, NodeId, ROOT_EDGE, ROOT_ID, ROOT_TOKEN, UNALIGNED_TOKEN};

/// What preparation changed in one gold graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// Token-to-node links removed by the two-node repair.
    pub repaired: usize,
    /// Concepts bound to an `<unaligned>` token.
    pub bound_unaligned: Vec<NodeId>,
}

/// Prepare `gold` in place. Afterwards the token list ends with
/// `<ROOT>`, node `-1` exists and is aligned to position `-1`, and a
/// `root` edge runs from it to the true root.
pub fn prepare(gold: &mut Amr, config: &OracleConfig) -> PrepareReport {
    let mut report = PrepareReport {
        repaired: repair_alignments(gold),
        ..Default::default()
    };
    if config.add_unaligned > 0 {
        report.bound_unaligned =
            add_unaligned(gold, config.add_unaligned, &config.unaligned_whitelist);
    }
    add_root(gold);
    report
}

/// Unlink one of two nodes sharing a token when no gold edge joins them.
///
/// The second node loses the link unless its label starts with the
/// token's first two characters or the first node already has the
/// larger alignment, in which case the first node loses it.
pub fn repair_alignments(gold: &mut Amr) -> usize {
    let mut repaired = 0;
    for i in 0..gold.tokens.len() {
        let pos = i as NodeId + 1;
        let align = gold.alignments_token_to_node(pos);
        if align.len() != 2 {
            continue;
        }
        let (first, second) = (align[0], align[1]);
        let connected = gold.edges.iter().any(|e| {
            align.contains(&e.source) && align.contains(&e.target)
        });
        if connected {
            continue;
        }

        let prefix: String = gold.tokens[i].chars().take(2).collect();
        let second_matches = gold
            .label(second)
            .is_some_and(|label| label.starts_with(&prefix));
        let first_len = gold.alignments.get(&first).map_or(0, Vec::len);
        let second_len = gold.alignments.get(&second).map_or(0, Vec::len);
        let remove = if second_matches || first_len > second_len {
            first
        } else {
            second
        };

        if let Some(positions) = gold.alignments.get_mut(&remove) {
            positions.retain(|p| *p != pos);
        }
        debug!(
            "token {} '{}': unlinked node {} ({:?})",
            pos,
            gold.tokens[i],
            remove,
            gold.label(remove)
        );
        repaired += 1;
    }
    repaired
}

/// Append `count` placeholder tokens and bind whitelisted unaligned
/// concepts to them, one concept per token, first match in node order.
pub fn add_unaligned(gold: &mut Amr, count: usize, whitelist: &[String]) -> Vec<NodeId> {
    let mut bound = Vec::new();
    for _ in 0..count {
        gold.tokens.push(UNALIGNED_TOKEN.to_owned());
        let pos = gold.tokens.len() as NodeId;
        let candidate = gold
            .nodes
            .iter()
            .find(|(id, label)| !gold.is_aligned(**id) && whitelist.iter().any(|w| w == *label))
            .map(|(id, _)| *id);
        if let Some(node) = candidate {
            gold.alignments.insert(node, vec![pos]);
            bound.push(node);
        }
    }
    bound
}

/// Append the `<ROOT>` token and the sentinel node and edge.
pub fn add_root(gold: &mut Amr) {
    gold.tokens.push(ROOT_TOKEN.to_owned());
    gold.nodes.insert(ROOT_ID, ROOT_TOKEN.to_owned());
    if let Some(root) = gold.root {
        gold.edges.push(Edge::new(ROOT_ID, ROOT_EDGE, root));
    }
    gold.alignments.insert(ROOT_ID, vec![ROOT_ID]);
}
