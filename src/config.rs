//! Configuration loading from YAML files.
//!
//! Lookup order:
//! 1. An explicit path (CLI `--config`)
//! 2. `$INFLUENCE_GRAPH_CONFIG`
//! 3. `<config dir>/influence-graph/config.yaml`
//! 4. Built-in defaults (everything is optional)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "INFLUENCE_GRAPH_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub similarity: SimilarityConfig,
    pub expansion: ExpansionConfig,
}

/// Name-similarity scoring used by the in-memory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Score for a case-insensitive exact name match
    pub exact_score: u8,
    /// Score when a stored name contains the queried name
    pub contains_score: u8,
    /// Score when the queried name contains a stored name
    pub contained_score: u8,
    /// Shortest name allowed to take part in a containment match
    pub min_fragment_len: usize,
    /// Candidates scoring below this are ignored (unless a creator matches)
    pub threshold: u8,
    /// Most candidates reported per entity
    pub max_candidates: usize,
}

/// Defaults for neighborhood expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub max_depth: usize,
    pub include_incoming: bool,
    pub include_outgoing: bool,
}

// --- Defaults ---

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            exact_score: 100,
            contains_score: 80,
            contained_score: 70,
            min_fragment_len: 4,
            threshold: 70,
            max_candidates: 3,
        }
    }
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            include_incoming: true,
            include_outgoing: true,
        }
    }
}

impl Config {
    /// Parse a YAML document
    pub fn from_yaml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content, path)
    }
}

/// Load config, falling back to defaults when no file exists.
///
/// An explicit path must exist; discovered paths are optional.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return Config::load_from(path);
    }
    match discovered_path() {
        Some(path) if path.exists() => {
            tracing::debug!(path = %path.display(), "loading config");
            Config::load_from(&path)
        }
        _ => Ok(Config::default()),
    }
}

fn discovered_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(p));
    }
    dirs::config_dir().map(|d| d.join("influence-graph").join("config.yaml"))
}
