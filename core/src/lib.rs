//! mtfeatures-core
//!
//! Shared building blocks for translation feature functions: word-to-cluster
//! lookup tables, n-gram language models with several storage formats, the
//! error taxonomy and configuration.
//!
//! Public API:
//! - `ClusterMap` - immutable word -> cluster id table with a sentinel fallback
//! - `LanguageModel` - `{begin_sentence_state, score}` capability used by scorers
//! - `LanguageModelHandle` - a loaded model, format picked from the file header
//! - `LmState` - opaque, copyable n-gram context
//! - `Config` - cluster lookup fallback settings
//! - `Error` / `Result`
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod error;
pub use error::{Error, Result};

pub mod cluster;
pub use cluster::ClusterMap;

pub mod lm;
pub use lm::{
    LanguageModel, LanguageModelHandle, LmState, ModelType, NgramEntry, NgramTable, Vocabulary,
    WordIndex,
};

/// Sentinel cluster id for words missing from a cluster map.
pub const NULL_CLUSTER: &str = "NULL";

/// Settings shared by every cluster map loaded in a process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Cluster id returned for words that are not in a map.
    pub unknown_cluster: String,
    /// Reserved key. When a map file defines it, its value replaces
    /// `unknown_cluster` for that map.
    pub unknown_cluster_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unknown_cluster: NULL_CLUSTER.to_string(),
            unknown_cluster_key: "<unk>".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Utility helpers.
pub mod utils {
    use ahash::RandomState;
    use std::hash::BuildHasher;

    // Fixed seeds: fingerprints must be identical across runs.
    const SEEDS: [u64; 4] = [
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    ];

    /// Split a line into whitespace separated tokens.
    pub fn tokenize(line: &str) -> impl Iterator<Item = &str> {
        line.split_whitespace()
    }

    /// Deterministic 64-bit hash of a token.
    pub fn stable_hash(token: &str) -> u64 {
        RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]).hash_one(token)
    }

    /// Order-sensitive combination of a running seed with another hash
    /// (the classic `hash_combine` mix).
    pub fn hash_combine(seed: u64, value: u64) -> u64 {
        seed ^ value
            .wrapping_add(0x9e37_79b9_7f4a_7c15)
            .wrapping_add(seed << 6)
            .wrapping_add(seed >> 2)
    }
}
