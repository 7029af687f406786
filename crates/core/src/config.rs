//! Oracle configuration.
//!
//! Every field has a default, so an empty file (or no file) is valid.
//!
//! ```toml
//! add_unaligned = 2
//! use_entity_rules = true
//! root_tie_break = "lowest-id"
//! max_steps_factor = 4
//! threads = 8
//! unaligned_whitelist = ["-", "and", "person", "you"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph::RootPolicy;

/// Concepts that may be bound to an injected `<unaligned>` token.
pub const DEFAULT_UNALIGNED_WHITELIST: &[&str] = &[
    "-",
    "and",
    "multi-sentence",
    "person",
    "cause-01",
    "you",
    "more",
    "imperative",
    "1",
    "thing",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleConfig {
    /// Number of `<unaligned>` placeholder tokens appended per sentence.
    pub add_unaligned: usize,
    pub unaligned_whitelist: Vec<String>,
    /// Expand entity items with the entity rules at CLOSE.
    pub use_entity_rules: bool,
    pub root_tie_break: RootPolicy,
    /// Step budget is `max_steps_factor * (tokens + 1)^2`.
    pub max_steps_factor: usize,
    /// Worker threads for corpus runs; `None` uses the rayon default.
    pub threads: Option<usize>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            add_unaligned: 0,
            unaligned_whitelist: DEFAULT_UNALIGNED_WHITELIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            use_entity_rules: true,
            root_tie_break: RootPolicy::Strict,
            max_steps_factor: 4,
            threads: None,
        }
    }
}

impl OracleConfig {
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_owned(),
            source,
        })
    }

    /// Read and parse a TOML config file from `path`.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    pub fn step_budget(&self, tokens: usize) -> usize {
        let n = tokens + 1;
        self.max_steps_factor.max(1).saturating_mul(n.saturating_mul(n))
    }
}
