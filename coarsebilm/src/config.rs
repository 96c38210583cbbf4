//! Feature configuration.
//!
//! Read once at startup, either from TOML or from a Moses feature line
//! such as
//!
//! ```text
//! CoarseBiLM name=CoarseBiLM0 tgtWordToClusterId100=tgt.100 lmCoarseLM100=lm100.bin ...
//! ```
//!
//! The set of enabled scoring stages is derived from it once, by
//! [`CoarseBiLmConfig::stages`].

use crate::component::{Component, MapRole, NUM_COMPONENTS};
use mtfeatures_core::{Config, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Feature type token that starts a feature line.
pub const FEATURE_TYPE: &str = "CoarseBiLM";

/// When the source sentence is mapped to cluster ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// On the first extension of a hypothesis chain.
    #[default]
    Lazy,
    /// In the root state of every sentence.
    Eager,
}

impl FromStr for CachePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lazy" => Ok(CachePolicy::Lazy),
            "eager" => Ok(CachePolicy::Eager),
            other => Err(Error::Config(format!(
                "cachePolicy must be 'lazy' or 'eager', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CoarseBiLmConfig {
    /// Feature name; score labels are `<name>_0` .. `<name>_3`.
    pub name: String,
    pub tgt_word_to_cluster_id100: Option<PathBuf>,
    pub tgt_word_to_cluster_id1600: Option<PathBuf>,
    pub tgt_word_to_cluster_id400: Option<PathBuf>,
    pub src_word_to_cluster_id: Option<PathBuf>,
    pub bitoken_to_bitoken_id: Option<PathBuf>,
    pub bitoken_id_to_cluster_id: Option<PathBuf>,
    #[serde(rename = "lmCoarseLM100")]
    pub lm_coarse_lm100: Option<PathBuf>,
    #[serde(rename = "lmCoarseLM1600")]
    pub lm_coarse_lm1600: Option<PathBuf>,
    #[serde(rename = "biLMWithoutClustering")]
    pub bilm_without_clustering: Option<PathBuf>,
    #[serde(rename = "biLMWithClustering")]
    pub bilm_with_clustering: Option<PathBuf>,
    /// Longest n-gram consulted by every model. `None` uses each model's order.
    pub ngrams: Option<usize>,
    pub cache_policy: CachePolicy,
    /// Cluster id for words missing from a map.
    pub unknown_cluster: String,
    /// Reserved map key whose value replaces `unknown_cluster` for that map.
    pub unknown_cluster_key: String,
}

impl Default for CoarseBiLmConfig {
    fn default() -> Self {
        let clusters = Config::default();
        Self {
            name: FEATURE_TYPE.to_string(),
            tgt_word_to_cluster_id100: None,
            tgt_word_to_cluster_id1600: None,
            tgt_word_to_cluster_id400: None,
            src_word_to_cluster_id: None,
            bitoken_to_bitoken_id: None,
            bitoken_id_to_cluster_id: None,
            lm_coarse_lm100: None,
            lm_coarse_lm1600: None,
            bilm_without_clustering: None,
            bilm_with_clustering: None,
            ngrams: None,
            cache_policy: CachePolicy::default(),
            unknown_cluster: clusters.unknown_cluster,
            unknown_cluster_key: clusters.unknown_cluster_key,
        }
    }
}

impl CoarseBiLmConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.check_values()?;
        Ok(cfg)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Parse a `CoarseBiLM key=value ...` feature line.
    pub fn from_feature_line(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some(FEATURE_TYPE) => {}
            Some(other) => {
                return Err(Error::Config(format!(
                    "feature line starts with '{}', expected {}",
                    other, FEATURE_TYPE
                )))
            }
            None => return Err(Error::Config("empty feature line".to_string())),
        }
        let mut cfg = Self::default();
        for token in tokens {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("expected key=value, got '{}'", token)))?;
            cfg.set_parameter(key, value)?;
        }
        Ok(cfg)
    }

    /// Apply one decoder parameter.
    pub fn set_parameter(&mut self, key: &str, value: &str) -> Result<()> {
        let path = || Some(PathBuf::from(value));
        match key {
            "name" => self.name = value.to_string(),
            "tgtWordToClusterId100" => self.tgt_word_to_cluster_id100 = path(),
            "tgtWordToClusterId1600" => self.tgt_word_to_cluster_id1600 = path(),
            "tgtWordToClusterId400" => self.tgt_word_to_cluster_id400 = path(),
            "srcWordToClusterId" => self.src_word_to_cluster_id = path(),
            "bitokenToBitokenId" => self.bitoken_to_bitoken_id = path(),
            "bitokenIdToClusterId" => self.bitoken_id_to_cluster_id = path(),
            "lmCoarseLM100" => self.lm_coarse_lm100 = path(),
            "lmCoarseLM1600" => self.lm_coarse_lm1600 = path(),
            "biLMWithoutClustering" => self.bilm_without_clustering = path(),
            "biLMWithClustering" => self.bilm_with_clustering = path(),
            "ngrams" => {
                let n = value.parse::<usize>().map_err(|_| {
                    Error::Config(format!("ngrams must be an integer, got '{}'", value))
                })?;
                self.ngrams = Some(n);
            }
            "cachePolicy" => self.cache_policy = value.parse()?,
            "unknownCluster" => self.unknown_cluster = value.to_string(),
            "unknownClusterKey" => self.unknown_cluster_key = value.to_string(),
            "tuneable" | "verbosity" | "filterable" => {
                tracing::warn!(key, value, "ignoring decoder parameter");
            }
            _ => return Err(Error::Config(format!("unknown parameter '{}'", key))),
        }
        self.check_values()
    }

    fn check_values(&self) -> Result<()> {
        if self.ngrams == Some(0) {
            return Err(Error::Config("ngrams must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Sentinel settings handed to every cluster map.
    pub fn cluster_config(&self) -> Config {
        Config {
            unknown_cluster: self.unknown_cluster.clone(),
            unknown_cluster_key: self.unknown_cluster_key.clone(),
        }
    }

    pub fn map_path(&self, role: MapRole) -> Option<&Path> {
        match role {
            MapRole::Target100 => self.tgt_word_to_cluster_id100.as_deref(),
            MapRole::Target1600 => self.tgt_word_to_cluster_id1600.as_deref(),
            MapRole::Target400 => self.tgt_word_to_cluster_id400.as_deref(),
            MapRole::Source => self.src_word_to_cluster_id.as_deref(),
            MapRole::BitokenToId => self.bitoken_to_bitoken_id.as_deref(),
            MapRole::IdToCluster => self.bitoken_id_to_cluster_id.as_deref(),
        }
    }

    pub fn lm_path(&self, component: Component) -> Option<&Path> {
        match component {
            Component::CoarseLm100 => self.lm_coarse_lm100.as_deref(),
            Component::CoarseLm1600 => self.lm_coarse_lm1600.as_deref(),
            Component::BiLmWithoutClustering => self.bilm_without_clustering.as_deref(),
            Component::BiLmWithClustering => self.bilm_with_clustering.as_deref(),
        }
    }

    /// Stages enabled by this configuration, checked for missing maps.
    pub fn stages(&self) -> Result<ScoringStages> {
        let mut enabled = [false; NUM_COMPONENTS];
        for c in Component::ALL {
            enabled[c.index()] = self.lm_path(c).is_some();
        }
        let stages = ScoringStages { enabled };
        stages.validate(|role| self.map_path(role).is_some())?;
        for role in MapRole::ALL {
            if self.map_path(role).is_some() && !stages.uses_map(role) {
                tracing::warn!(key = role.key(), "cluster map configured but no stage uses it");
            }
        }
        Ok(stages)
    }
}

/// Which of the four language models take part in scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringStages {
    enabled: [bool; NUM_COMPONENTS],
}

impl ScoringStages {
    pub fn all() -> Self {
        Self {
            enabled: [true; NUM_COMPONENTS],
        }
    }

    pub fn from_components<I: IntoIterator<Item = Component>>(components: I) -> Self {
        let mut enabled = [false; NUM_COMPONENTS];
        for c in components {
            enabled[c.index()] = true;
        }
        Self { enabled }
    }

    pub fn is_enabled(&self, c: Component) -> bool {
        self.enabled[c.index()]
    }

    pub fn enabled(&self) -> impl Iterator<Item = Component> + '_ {
        Component::ALL.into_iter().filter(move |&c| self.is_enabled(c))
    }

    pub fn is_empty(&self) -> bool {
        self.enabled().next().is_none()
    }

    /// True when some enabled stage reads bitokens.
    pub fn needs_bitokens(&self) -> bool {
        self.enabled().any(Component::is_bilingual)
    }

    pub fn uses_map(&self, role: MapRole) -> bool {
        self.enabled().any(|c| c.required_maps().contains(&role))
    }

    /// Fails when nothing is enabled or an enabled stage lacks a map.
    pub fn validate<F: Fn(MapRole) -> bool>(&self, has_map: F) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Config(
                "no language model configured; set at least one of lmCoarseLM100, \
                 lmCoarseLM1600, biLMWithoutClustering, biLMWithClustering"
                    .to_string(),
            ));
        }
        for c in self.enabled() {
            if let Some(role) = c.required_maps().iter().find(|&&r| !has_map(r)) {
                return Err(Error::Config(format!(
                    "{} is set but {} is missing",
                    c.lm_key(),
                    role.key()
                )));
            }
        }
        Ok(())
    }
}
