//! Text output: JAMR metadata with a PENMAN body, oracle trace blocks,
//! and the flat sentence and action lines.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::action::Action;
use crate::graph::{Amr, NodeId, ROOT_TOKEN};

/// Edges whose targets are always printed as constants.
const CONSTANT_EDGES: [&str; 2] = [":polarity", ":mode"];

const INDENT: &str = "      ";

/// Tokens without a trailing `<ROOT>`.
fn surface_tokens(tokens: &[String]) -> &[String] {
    match tokens.split_last() {
        Some((last, rest)) if last == ROOT_TOKEN => rest,
        _ => tokens,
    }
}

/// JAMR metadata followed by the PENMAN body and a blank line. The
/// metadata lists every node; the body only what the root reaches.
pub fn amr_to_jamr(amr: &Amr) -> String {
    let mut out = String::new();
    if let Some(id) = &amr.id {
        let _ = writeln!(out, "# ::id {}", id);
    }
    let _ = writeln!(out, "# ::tok {}", surface_tokens(&amr.tokens).join(" "));
    for (id, label) in &amr.nodes {
        match amr.alignments.get(id).and_then(|p| span(p)) {
            Some((start, end)) => {
                let _ = writeln!(out, "# ::node\t{}\t{}\t{}-{}", id, label, start, end);
            }
            None => {
                let _ = writeln!(out, "# ::node\t{}\t{}", id, label);
            }
        }
    }
    if let Some(root) = amr.root {
        let _ = writeln!(out, "# ::root\t{}\t{}", root, amr.label(root).unwrap_or_default());
    }
    for e in &amr.edges {
        let _ = writeln!(
            out,
            "# ::edge\t{}\t{}\t{}\t{}\t{}",
            amr.label(e.source).unwrap_or_default(),
            e.label.trim_start_matches(':'),
            amr.label(e.target).unwrap_or_default(),
            e.source,
            e.target
        );
    }
    out.push_str(&penman(amr));
    out.push_str("\n\n");
    out
}

/// 0-based end-exclusive span covering 1-based `positions`.
fn span(positions: &[NodeId]) -> Option<(NodeId, NodeId)> {
    let start = positions.iter().copied().filter(|p| *p > 0).min()?;
    let end = positions.iter().copied().max()?;
    Some((start - 1, end))
}

/// PENMAN notation rooted at `amr.root`. Reentrant nodes after their
/// first occurrence are printed as variable references.
pub fn penman(amr: &Amr) -> String {
    let Some(root) = amr.root else {
        return "(a / amr-empty)".to_owned();
    };
    let vars = variables(amr);
    let mut out = String::new();
    let mut seen = BTreeSet::new();
    write_node(amr, &vars, root, 1, &mut seen, &mut out);
    out
}

fn write_node(
    amr: &Amr,
    vars: &BTreeMap<NodeId, String>,
    node: NodeId,
    depth: usize,
    seen: &mut BTreeSet<NodeId>,
    out: &mut String,
) {
    let var = vars.get(&node).map(String::as_str).unwrap_or("x");
    let label = amr.label(node).unwrap_or_default();
    seen.insert(node);
    let _ = write!(out, "({} / {}", var, label);
    for e in amr.edges.iter().filter(|e| e.source == node) {
        let _ = write!(out, "\n{}{} ", INDENT.repeat(depth), e.label);
        if is_constant(amr, e.target, &e.label) {
            out.push_str(amr.label(e.target).unwrap_or_default());
        } else if seen.contains(&e.target) {
            out.push_str(vars.get(&e.target).map(String::as_str).unwrap_or("x"));
        } else {
            write_node(amr, vars, e.target, depth + 1, seen, out);
        }
    }
    out.push(')');
}

/// Leaf holding a quoted string, a number, `-`/`+`, or anything under
/// `:polarity`/`:mode`.
fn is_constant(amr: &Amr, node: NodeId, edge: &str) -> bool {
    if amr.edges.iter().any(|e| e.source == node) {
        return false;
    }
    let label = amr.label(node).unwrap_or_default();
    CONSTANT_EDGES.contains(&edge)
        || label.starts_with('"')
        || label == "-"
        || label == "+"
        || (!label.is_empty() && label.parse::<f64>().is_ok())
}

/// First letter of the label, numbered from the second use on.
fn variables(amr: &Amr) -> BTreeMap<NodeId, String> {
    let mut used: BTreeMap<char, usize> = BTreeMap::new();
    let mut vars = BTreeMap::new();
    for (id, label) in &amr.nodes {
        let letter = label
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map_or('x', |c| c.to_ascii_lowercase());
        let n = used.entry(letter).or_insert(0);
        *n += 1;
        let var = if *n == 1 {
            letter.to_string()
        } else {
            format!("{}{}", letter, n)
        };
        vars.insert(*id, var);
    }
    vars
}

/// Trace block readable by `read_oracle_blocks`.
pub fn oracle_block(tokens: &[String], actions: &[Action]) -> String {
    let actions: Vec<String> = actions.iter().map(Action::to_string).collect();
    format!("{}\n{}\n\n", tokens.join("\t"), actions.join("\t"))
}

pub fn sentence_line(tokens: &[String]) -> String {
    format!("{}\n", surface_tokens(tokens).join(" "))
}

pub fn actions_line(actions: &[Action]) -> String {
    let actions: Vec<String> = actions.iter().map(Action::to_string).collect();
    format!("{}\n", actions.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::reader::{read_corpus, read_oracle_blocks};

    fn city() -> Amr {
        let mut amr = Amr::new(vec!["visit".into(), "New".into(), "York".into(), ROOT_TOKEN.into()]);
        amr.id = Some("s7".into());
        for (id, label) in [(1, "visit-01"), (3, "city"), (5, "name"), (6, "\"New\""), (7, "\"York\"")] {
            amr.nodes.insert(id, label.to_owned());
        }
        amr.alignments.insert(1, vec![1]);
        amr.alignments.insert(3, vec![2, 3]);
        amr.edges = vec![
            Edge::new(1, ":ARG1", 3),
            Edge::new(3, ":name", 5),
            Edge::new(5, ":op1", 6),
            Edge::new(5, ":op2", 7),
        ];
        amr.root = Some(1);
        amr
    }

    #[test]
    fn penman_nests_and_quotes() {
        assert_eq!(
            penman(&city()),
            "(v / visit-01\n      :ARG1 (c / city\n            :name (n / name\n                  :op1 \"New\"\n                  :op2 \"York\")))"
        );
    }

    #[test]
    fn reentrancy_prints_a_reference() {
        let mut amr = Amr::new(vec!["x".into()]);
        for (id, label) in [(0, "want-01"), (1, "boy"), (2, "go-02")] {
            amr.nodes.insert(id, label.to_owned());
        }
        amr.edges = vec![Edge::new(0, ":ARG0", 1), Edge::new(0, ":ARG1", 2), Edge::new(2, ":ARG0", 1)];
        amr.root = Some(0);
        let text = penman(&amr);
        assert!(text.ends_with(":ARG0 b))"), "{}", text);
        assert_eq!(text.matches("(b / boy)").count(), 1);
    }

    #[test]
    fn jamr_output_reads_back() {
        let text = amr_to_jamr(&city());
        assert!(text.starts_with("# ::id s7\n# ::tok visit New York\n"));
        let corpus = read_corpus(&text, "out.amr").unwrap();
        let back = &corpus.amrs[0];
        assert_eq!(back.tokens, ["visit", "New", "York"]);
        assert_eq!(back.nodes.len(), 5);
        assert_eq!(back.edges.len(), 4);
        assert_eq!(back.label(back.root.unwrap()), Some("visit-01"));
        let city = back.nodes.iter().find(|(_, l)| *l == "city").map(|(id, _)| *id).unwrap();
        assert_eq!(back.alignments[&city], vec![2, 3]);
    }

    #[test]
    fn oracle_block_reads_back() {
        let tokens: Vec<String> = vec!["New".into(), "York".into(), ROOT_TOKEN.into()];
        let actions = vec![Action::Shift, Action::Shift, Action::Merge, Action::Entity("city,name".into())];
        let blocks = read_oracle_blocks(&oracle_block(&tokens, &actions), "trace").unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].tokens, tokens);
        assert_eq!(blocks[0].actions, actions);
        assert_eq!(sentence_line(&tokens), "New York\n");
        assert_eq!(actions_line(&actions), "SHIFT SHIFT MERGE ENTITY(city,name)\n");
    }
}
