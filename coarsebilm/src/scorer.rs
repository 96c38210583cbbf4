//! The bilingual coarse language model feature.
//!
//! For every target word added by a hypothesis expansion the scorer derives
//! up to four tokens:
//!
//! - the word's 100-cluster id, scored by the coarse 100 model
//! - the word's 1600-cluster id, scored by the coarse 1600 model
//! - its bitoken id (bitoken of the source clusters and the word's
//!   400-cluster id, mapped through `bitokenToBitokenId`), scored by the
//!   bilingual model without clustering
//! - the cluster of that bitoken id, scored by the bilingual model with
//!   clustering
//!
//! and advances the matching model contexts carried in [`ScorerState`].
//! The scorer itself holds only read-only tables, so one instance can serve
//! any number of threads.

use crate::alignment::Alignment;
use crate::bitoken::bitoken;
use crate::component::{Component, MapRole, ScoreVector, NUM_COMPONENTS};
use crate::config::{CachePolicy, CoarseBiLmConfig, ScoringStages};
use crate::state::ScorerState;
use mtfeatures_core::{
    ClusterMap, Config, Error, LanguageModel, LanguageModelHandle, LmState, Result,
};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub struct CoarseBiLm {
    name: String,
    stages: ScoringStages,
    cache_policy: CachePolicy,
    maps: [Arc<ClusterMap>; MapRole::COUNT],
    lms: [Option<Arc<dyn LanguageModel>>; NUM_COMPONENTS],
}

/// Assembles a [`CoarseBiLm`] from already loaded tables.
pub struct CoarseBiLmBuilder {
    name: String,
    cache_policy: CachePolicy,
    cluster_config: Config,
    maps: [Option<Arc<ClusterMap>>; MapRole::COUNT],
    lms: [Option<Arc<dyn LanguageModel>>; NUM_COMPONENTS],
}

impl Default for CoarseBiLmBuilder {
    fn default() -> Self {
        Self {
            name: crate::config::FEATURE_TYPE.to_string(),
            cache_policy: CachePolicy::default(),
            cluster_config: Config::default(),
            maps: Default::default(),
            lms: Default::default(),
        }
    }
}

impl CoarseBiLmBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Sentinel settings for the empty maps of unused roles.
    pub fn cluster_config(mut self, cfg: Config) -> Self {
        self.cluster_config = cfg;
        self
    }

    pub fn map(mut self, role: MapRole, map: impl Into<Arc<ClusterMap>>) -> Self {
        self.maps[role.index()] = Some(map.into());
        self
    }

    /// Enable `component`, scored by `lm`.
    pub fn language_model(mut self, component: Component, lm: Arc<dyn LanguageModel>) -> Self {
        self.lms[component.index()] = Some(lm);
        self
    }

    /// Fails with [`Error::Config`] when no model is set or an enabled
    /// component lacks one of its maps.
    pub fn build(self) -> Result<CoarseBiLm> {
        let stages = ScoringStages::from_components(
            Component::ALL
                .into_iter()
                .filter(|c| self.lms[c.index()].is_some()),
        );
        stages.validate(|role| self.maps[role.index()].is_some())?;
        let empty = Arc::new(ClusterMap::with_config(&self.cluster_config));
        let maps = self
            .maps
            .map(|m| m.unwrap_or_else(|| Arc::clone(&empty)));
        Ok(CoarseBiLm {
            name: self.name,
            stages,
            cache_policy: self.cache_policy,
            maps,
            lms: self.lms,
        })
    }
}

impl CoarseBiLm {
    pub fn builder() -> CoarseBiLmBuilder {
        CoarseBiLmBuilder::default()
    }

    /// Load every cluster map and model named by `cfg`.
    ///
    /// Only the tables of enabled stages are read. Any failure is fatal.
    pub fn load(cfg: &CoarseBiLmConfig) -> Result<Self> {
        let stages = cfg.stages()?;
        let cluster_config = cfg.cluster_config();
        let mut builder = Self::builder()
            .name(cfg.name.clone())
            .cache_policy(cfg.cache_policy)
            .cluster_config(cluster_config.clone());

        for role in MapRole::ALL.into_iter().filter(|&r| stages.uses_map(r)) {
            let path = cfg
                .map_path(role)
                .ok_or_else(|| Error::Config(format!("{} is missing", role.key())))?;
            builder = builder.map(role, ClusterMap::load_with_config(path, &cluster_config)?);
        }
        for c in stages.enabled() {
            let path = cfg
                .lm_path(c)
                .ok_or_else(|| Error::Config(format!("{} is missing", c.lm_key())))?;
            let mut lm = LanguageModelHandle::construct(path)?;
            if let Some(n) = cfg.ngrams {
                lm = lm.with_max_order(n);
            }
            builder = builder.language_model(c, Arc::new(lm));
        }
        let scorer = builder.build()?;
        tracing::info!(name = %scorer.name, stages = ?scorer.stages, "feature ready");
        Ok(scorer)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> ScoringStages {
        self.stages
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// Labels of the dense scores, `<name>_0` .. `<name>_3`.
    pub fn feature_names(&self) -> Vec<String> {
        (0..NUM_COMPONENTS)
            .map(|i| format!("{}_{}", self.name, i))
            .collect()
    }

    fn map(&self, role: MapRole) -> &ClusterMap {
        &self.maps[role.index()]
    }

    fn enabled_lms(&self) -> impl Iterator<Item = (Component, &dyn LanguageModel)> + '_ {
        Component::ALL
            .into_iter()
            .filter_map(move |c| self.lms[c.index()].as_deref().map(|lm| (c, lm)))
    }

    /// Cluster ids of a source sentence.
    pub fn source_cluster_ids<S: AsRef<str>>(&self, source: &[S]) -> Vec<String> {
        let map = self.map(MapRole::Source);
        source
            .iter()
            .map(|w| map.lookup(w.as_ref()).to_string())
            .collect()
    }

    fn sentence_clusters<S: AsRef<str>>(&self, source: &[S]) -> Arc<[String]> {
        if !self.stages.needs_bitokens() {
            return Arc::from(Vec::new());
        }
        tracing::debug!(words = source.len(), "mapping source sentence to clusters");
        self.source_cluster_ids(source).into()
    }

    fn begin_states(&self) -> [LmState; NUM_COMPONENTS] {
        let mut lm_states = [LmState::empty(); NUM_COMPONENTS];
        for (c, lm) in self.enabled_lms() {
            lm_states[c.index()] = lm.begin_sentence_state();
        }
        lm_states
    }

    /// Root state of a sentence.
    pub fn empty_state<S: AsRef<str>>(&self, source: &[S]) -> ScorerState {
        let source_clusters = match self.cache_policy {
            CachePolicy::Eager => self.sentence_clusters(source),
            CachePolicy::Lazy => Arc::from(Vec::new()),
        };
        ScorerState::new(Vec::new(), source_clusters, self.begin_states())
    }

    /// Tokens fed to each component for one target word; disabled slots
    /// are empty.
    fn word_tokens<'a>(
        &'a self,
        source_clusters: &[String],
        word: &str,
        links: Option<&BTreeSet<usize>>,
    ) -> [&'a str; NUM_COMPONENTS] {
        let mut tokens = [""; NUM_COMPONENTS];
        if self.stages.is_enabled(Component::CoarseLm100) {
            tokens[0] = self.map(MapRole::Target100).lookup(word);
        }
        if self.stages.is_enabled(Component::CoarseLm1600) {
            tokens[1] = self.map(MapRole::Target1600).lookup(word);
        }
        if self.stages.needs_bitokens() {
            let target = self.map(MapRole::Target400).lookup(word);
            let bitoken = bitoken(source_clusters, links, target);
            let id = self.map(MapRole::BitokenToId).lookup(&bitoken);
            tokens[2] = id;
            if self.stages.is_enabled(Component::BiLmWithClustering) {
                tokens[3] = self.map(MapRole::IdToCluster).lookup(id);
            }
        }
        tokens
    }

    /// Token that identifies a word in the state: the input of the last
    /// enabled component.
    fn key_token<'a>(&self, tokens: &[&'a str; NUM_COMPONENTS]) -> &'a str {
        self.enabled_lms()
            .last()
            .map_or("", |(c, _)| tokens[c.index()])
    }

    /// Score the target words appended by one hypothesis expansion.
    ///
    /// `prev` is the state of the hypothesis being extended, `None` at the
    /// start of a sentence. `alignment` maps positions of `target_words` to
    /// positions of `source`. `prev` is only read.
    pub fn extend<S: AsRef<str>, T: AsRef<str>>(
        &self,
        prev: Option<&ScorerState>,
        source: &[S],
        target_words: &[T],
        alignment: &Alignment,
    ) -> (ScoreVector, ScorerState) {
        let source_clusters = match prev.and_then(ScorerState::shared_source_clusters) {
            Some(cached) => cached,
            None => self.sentence_clusters(source),
        };
        let mut lm_states = match prev {
            Some(p) => *p.lm_states(),
            None => self.begin_states(),
        };

        let mut scores = ScoreVector::default();
        let mut recent = Vec::with_capacity(target_words.len());
        for (i, word) in target_words.iter().enumerate() {
            let tokens = self.word_tokens(&source_clusters, word.as_ref(), alignment.sources(i));
            for (c, lm) in self.enabled_lms() {
                let slot = c.index();
                let (p, next) = lm.score(&lm_states[slot], tokens[slot]);
                scores[c] += p;
                lm_states[slot] = next;
            }
            recent.push(self.key_token(&tokens).to_string());
        }
        (scores, ScorerState::new(recent, source_clusters, lm_states))
    }

    /// Score of closing the sentence after `state`.
    pub fn end_of_sentence(&self, state: &ScorerState) -> ScoreVector {
        let mut scores = ScoreVector::default();
        for (c, lm) in self.enabled_lms() {
            scores[c] = lm.end_of_sentence(state.lm_state(c));
        }
        scores
    }

    /// Context-free estimate of a phrase pair, used for future cost.
    ///
    /// Both sides and `alignment` are phrase-local.
    pub fn estimate_in_isolation<S: AsRef<str>, T: AsRef<str>>(
        &self,
        source_phrase: &[S],
        target_phrase: &[T],
        alignment: &Alignment,
    ) -> ScoreVector {
        let source_clusters = self.sentence_clusters(source_phrase);
        let mut per_component: [Vec<&str>; NUM_COMPONENTS] = Default::default();
        for (i, word) in target_phrase.iter().enumerate() {
            let tokens = self.word_tokens(&source_clusters, word.as_ref(), alignment.sources(i));
            for (slot, token) in tokens.into_iter().enumerate() {
                per_component[slot].push(token);
            }
        }
        let mut scores = ScoreVector::default();
        for (c, lm) in self.enabled_lms() {
            scores[c] = lm.estimate(&per_component[c.index()]);
        }
        scores
    }
}

impl fmt::Debug for CoarseBiLm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoarseBiLm")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("cache_policy", &self.cache_policy)
            .finish()
    }
}
