//! Per-hypothesis scorer state.

use crate::component::{Component, NUM_COMPONENTS};
use mtfeatures_core::utils::{hash_combine, stable_hash};
use mtfeatures_core::LmState;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Immutable state carried from one hypothesis to its extensions.
///
/// Two states compare equal only when the tokens scored by their last
/// expansion and all four language model contexts are equal. The
/// fingerprint is compared first, so unequal states usually separate on a
/// single integer, but a fingerprint collision never merges them. The
/// cached source cluster ids are shared by every state of one sentence and
/// take no part in comparisons.
#[derive(Debug, Clone)]
pub struct ScorerState {
    fingerprint: u64,
    recent: Arc<[String]>,
    source_clusters: Arc<[String]>,
    lm_states: [LmState; NUM_COMPONENTS],
}

/// Order-sensitive hash of a token sequence.
pub fn fingerprint<S: AsRef<str>>(tokens: &[S]) -> u64 {
    tokens
        .iter()
        .fold(0, |seed, t| hash_combine(seed, stable_hash(t.as_ref())))
}

impl ScorerState {
    pub(crate) fn new(
        recent: Vec<String>,
        source_clusters: Arc<[String]>,
        lm_states: [LmState; NUM_COMPONENTS],
    ) -> Self {
        Self {
            fingerprint: fingerprint(&recent),
            recent: recent.into(),
            source_clusters,
            lm_states,
        }
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Tokens scored by the expansion that produced this state.
    pub fn recent_tokens(&self) -> &[String] {
        &self.recent
    }

    /// Source sentence cluster ids, empty until first computed.
    pub fn source_clusters(&self) -> &[String] {
        &self.source_clusters
    }

    pub(crate) fn shared_source_clusters(&self) -> Option<Arc<[String]>> {
        (!self.source_clusters.is_empty()).then(|| Arc::clone(&self.source_clusters))
    }

    pub fn lm_state(&self, c: Component) -> &LmState {
        &self.lm_states[c.index()]
    }

    pub fn lm_states(&self) -> &[LmState; NUM_COMPONENTS] {
        &self.lm_states
    }
}

impl Ord for ScorerState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fingerprint
            .cmp(&other.fingerprint)
            .then_with(|| self.recent.cmp(&other.recent))
            .then_with(|| self.lm_states.cmp(&other.lm_states))
    }
}

impl PartialOrd for ScorerState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScorerState {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScorerState {}

impl Hash for ScorerState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
        self.recent.hash(state);
        self.lm_states.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(tokens: &[&str], lm: LmState) -> ScorerState {
        ScorerState::new(
            tokens.iter().map(|s| s.to_string()).collect(),
            Arc::from(Vec::<String>::new()),
            [lm; NUM_COMPONENTS],
        )
    }

    #[test]
    fn fingerprint_is_order_sensitive_and_stable() {
        assert_eq!(fingerprint(&["a", "b"]), fingerprint(&["a", "b"]));
        assert_ne!(fingerprint(&["a", "b"]), fingerprint(&["b", "a"]));
        assert_eq!(fingerprint::<&str>(&[]), 0);
    }

    #[test]
    fn equality_needs_equal_tokens_and_contexts() {
        let a = state(&["x", "y"], LmState::from_recent(&[1, 2]));
        let b = state(&["x", "y"], LmState::from_recent(&[1, 2]));
        let c = state(&["x", "y"], LmState::from_recent(&[1, 3]));
        let d = state(&["y", "x"], LmState::from_recent(&[1, 2]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.cmp(&c), c.cmp(&a).reverse());
    }

    #[test]
    fn source_cache_does_not_affect_equality() {
        let a = state(&["x"], LmState::empty());
        let mut b = a.clone();
        b.source_clusters = Arc::from(vec!["S".to_string()]);
        assert_eq!(a, b);
        assert!(a.shared_source_clusters().is_none());
        assert_eq!(b.shared_source_clusters().unwrap().len(), 1);
    }
}
