use serde::Serialize;

use crate::graph::NodeId;

/// Failures raised by gold-graph queries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The node set aligned to a token does not induce a single root.
    #[error("no unique subgraph root for nodes {nodes:?} (candidates {candidates:?})")]
    AmbiguousSubgraph {
        nodes: Vec<NodeId>,
        candidates: Vec<NodeId>,
    },

    /// A node id was referenced that the graph does not define.
    #[error("unknown node id {0}")]
    UnknownNode(NodeId),
}

/// A corpus read error, pinned to the 1-based line it was found on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{file}:{line}: {message}")]
pub struct ReadError {
    pub file: String,
    pub line: usize,
    pub message: String,
}

impl ReadError {
    pub fn new(file: &str, line: usize, message: impl Into<String>) -> Self {
        ReadError {
            file: file.to_owned(),
            line,
            message: message.into(),
        }
    }
}

/// An action could not be applied to the current parser configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("{action} needs {needed} stack item(s), found {found}")]
    StackTooShort {
        action: &'static str,
        needed: usize,
        found: usize,
    },

    #[error("{0} applied to an empty buffer")]
    EmptyBuffer(&'static str),

    #[error("INTRODUCE applied with no latent item at position {0}")]
    NoLatent(usize),

    #[error("unparseable action '{0}'")]
    BadAction(String),
}

/// Per-sentence derivation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("sentence has no tokens")]
    EmptySentence,

    #[error("gold graph has no root")]
    MissingRoot,
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Corpus-level failures. Per-sentence errors never end up here.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("could not start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
