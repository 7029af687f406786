//! JAMR-style corpus reader.
//!
//! A corpus is a sequence of blocks separated by blank lines. Only the
//! metadata comments are read; the PENMAN body is skipped.
//!
//! ```text
//! # ::id s1
//! # ::tok The dog runs
//! # ::node	0	run-01	2-3
//! # ::node	1	dog	1-2
//! # ::root	0	run-01
//! # ::edge	run-01	ARG0	dog	0	1
//! (r / run-01 :ARG0 (d / dog))
//! ```
//!
//! Spans are 0-based and end-exclusive; they become 1-based positions.
//! Oracle trace blocks (`tokens` line, `actions` line) are read by
//! [`read_oracle_blocks`].

use std::collections::BTreeMap;
use std::path::Path;

use log::warn;

use crate::action::Action;
use crate::error::ReadError;
use crate::graph::{Amr, Edge, NodeId};

/// Gold graphs read from a corpus, plus per-reason counts of blocks that
/// were skipped.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub amrs: Vec<Amr>,
    pub skipped: BTreeMap<String, usize>,
}

/// A recorded derivation: the token line and the action line.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleBlock {
    pub tokens: Vec<String>,
    pub actions: Vec<Action>,
}

#[derive(Default)]
struct RawBlock {
    id: Option<String>,
    tokens: Option<Vec<String>>,
    nodes: Vec<RawNode>,
    root: Option<String>,
    edges: Vec<RawEdge>,
}

struct RawNode {
    id: String,
    label: String,
    span: Option<(usize, usize)>,
}

struct RawEdge {
    source: String,
    label: String,
    target: String,
    line: usize,
}

pub fn read_corpus_file(path: &Path) -> Result<Corpus, ReadError> {
    let name = path.display().to_string();
    let src = std::fs::read_to_string(path)
        .map_err(|e| ReadError::new(&name, 0, format!("cannot open file: {}", e)))?;
    read_corpus(&src, &name)
}

pub fn read_corpus(src: &str, filename: &str) -> Result<Corpus, ReadError> {
    let mut corpus = Corpus::default();
    let mut block: Option<RawBlock> = None;

    for (idx, raw_line) in src.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end_matches('\r');

        if line.trim().is_empty() {
            if let Some(done) = block.take() {
                finish_block(done, &mut corpus);
            }
            continue;
        }

        let current = block.get_or_insert_with(RawBlock::default);
        let Some(meta) = line.trim_start().strip_prefix("# ::") else {
            continue;
        };
        let (directive, rest) = split_directive(meta);
        match directive {
            "id" => {
                current.id = rest.split_whitespace().next().map(str::to_owned);
            }
            "tok" => {
                current.tokens = Some(rest.split_whitespace().map(str::to_owned).collect());
            }
            "node" => {
                let fields = fields(rest);
                if fields.len() < 2 {
                    return Err(ReadError::new(
                        filename,
                        line_no,
                        "node line needs an id and a label",
                    ));
                }
                let span = match fields.get(2).filter(|s| !s.is_empty()) {
                    Some(s) => Some(parse_span(s, filename, line_no)?),
                    None => None,
                };
                current.nodes.push(RawNode {
                    id: fields[0].to_owned(),
                    label: fields[1].to_owned(),
                    span,
                });
            }
            "root" => {
                let fields = fields(rest);
                let Some(id) = fields.first() else {
                    return Err(ReadError::new(filename, line_no, "root line needs an id"));
                };
                current.root = Some((*id).to_owned());
            }
            "edge" => {
                let fields = fields(rest);
                if fields.len() < 5 {
                    return Err(ReadError::new(
                        filename,
                        line_no,
                        format!("edge line needs 5 fields, found {}", fields.len()),
                    ));
                }
                current.edges.push(RawEdge {
                    source: fields[3].to_owned(),
                    label: relation(fields[1]),
                    target: fields[4].to_owned(),
                    line: line_no,
                });
            }
            _ => {}
        }
    }
    if let Some(done) = block.take() {
        finish_block(done, &mut corpus);
    }
    Ok(corpus)
}

fn split_directive(meta: &str) -> (&str, &str) {
    match meta.find(|c: char| c.is_whitespace()) {
        Some(pos) => (&meta[..pos], &meta[pos..]),
        None => (meta, ""),
    }
}

/// Tab separated fields; falls back to whitespace for hand-written files.
fn fields(rest: &str) -> Vec<&str> {
    let tabbed: Vec<&str> = rest
        .split('\t')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if tabbed.len() > 1 {
        tabbed
    } else {
        rest.split_whitespace().collect()
    }
}

fn relation(label: &str) -> String {
    if label.starts_with(':') {
        label.to_owned()
    } else {
        format!(":{}", label)
    }
}

fn parse_span(s: &str, filename: &str, line: usize) -> Result<(usize, usize), ReadError> {
    let bad = || ReadError::new(filename, line, format!("invalid token span '{}'", s));
    let (start, end) = s.split_once('-').ok_or_else(bad)?;
    let start: usize = start.parse().map_err(|_| bad())?;
    let end: usize = end.parse().map_err(|_| bad())?;
    if end <= start {
        return Err(bad());
    }
    Ok((start, end))
}

fn finish_block(block: RawBlock, corpus: &mut Corpus) {
    // A block with no metadata at all is a stray PENMAN body or comment.
    if block.tokens.is_none() && block.nodes.is_empty() && block.id.is_none() {
        return;
    }
    let label = block.id.clone().unwrap_or_else(|| "<no id>".to_owned());

    let tokens = block.tokens.unwrap_or_default();
    if tokens.is_empty() {
        warn!("skipping {}: no tokens", label);
        *corpus.skipped.entry("no-tokens".to_owned()).or_default() += 1;
        return;
    }

    let mut amr = Amr::new(tokens);
    amr.id = block.id;
    let mut ids: BTreeMap<String, NodeId> = BTreeMap::new();
    for node in block.nodes {
        let next = ids.len() as NodeId;
        let id = *ids.entry(node.id).or_insert(next);
        amr.nodes.insert(id, node.label);
        if let Some((start, end)) = node.span {
            let positions: Vec<NodeId> = (start + 1..=end)
                .filter(|p| *p <= amr.tokens.len())
                .map(|p| p as NodeId)
                .collect();
            if !positions.is_empty() {
                amr.alignments.insert(id, positions);
            }
        }
    }

    amr.root = block.root.and_then(|r| ids.get(&r).copied());
    if amr.root.is_none() {
        warn!("skipping {}: no root", label);
        *corpus.skipped.entry("no-root".to_owned()).or_default() += 1;
        return;
    }

    for edge in block.edges {
        match (ids.get(&edge.source), ids.get(&edge.target)) {
            (Some(s), Some(t)) => amr.edges.push(Edge::new(*s, edge.label, *t)),
            _ => {
                warn!(
                    "{}: dropping edge {} {} {} on line {}: node does not exist",
                    label, edge.source, edge.label, edge.target, edge.line
                );
                *corpus.skipped.entry("dangling-edge".to_owned()).or_default() += 1;
            }
        }
    }
    corpus.amrs.push(amr);
}

pub fn read_oracle_file(path: &Path) -> Result<Vec<OracleBlock>, ReadError> {
    let name = path.display().to_string();
    let src = std::fs::read_to_string(path)
        .map_err(|e| ReadError::new(&name, 0, format!("cannot open file: {}", e)))?;
    read_oracle_blocks(&src, &name)
}

/// Parse trace blocks: a tab separated token line, a tab separated
/// action line, then a blank line.
pub fn read_oracle_blocks(src: &str, filename: &str) -> Result<Vec<OracleBlock>, ReadError> {
    let mut blocks = Vec::new();
    let mut pending: Vec<(usize, &str)> = Vec::new();
    let lines = src.lines().map(|l| l.trim_end_matches('\r')).enumerate();

    for (idx, line) in lines.chain(std::iter::once((usize::MAX, ""))) {
        if !line.trim().is_empty() {
            pending.push((idx + 1, line));
            continue;
        }
        if pending.is_empty() {
            continue;
        }
        if pending.len() < 2 {
            return Err(ReadError::new(
                filename,
                pending[0].0,
                "trace block needs a token line and an action line",
            ));
        }
        let tokens = pending[0].1.split('\t').map(str::to_owned).collect();
        let (action_line, text) = pending[1];
        let actions = text
            .split('\t')
            .filter(|a| !a.is_empty())
            .map(|a| {
                a.parse::<Action>()
                    .map_err(|e| ReadError::new(filename, action_line, e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        blocks.push(OracleBlock { tokens, actions });
        pending.clear();
    }
    Ok(blocks)
}
