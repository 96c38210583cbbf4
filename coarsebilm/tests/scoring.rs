use coarsebilm::state::fingerprint;
use coarsebilm::{Alignment, CachePolicy, CoarseBiLm, Component, MapRole, ScoreVector};
use mtfeatures_core::{ClusterMap, LanguageModel, LmState};
use std::collections::HashMap;
use std::sync::Arc;

/// Same log-probability for every word in every context.
struct Flat(f32);

impl LanguageModel for Flat {
    fn begin_sentence_state(&self) -> LmState {
        LmState::empty()
    }

    fn score(&self, _state: &LmState, _word: &str) -> (f32, LmState) {
        (self.0, LmState::empty())
    }
}

/// Scripted per-word scores; remembers the last five words it saw.
struct Scripted {
    scores: HashMap<&'static str, f32>,
    ids: HashMap<&'static str, u32>,
}

impl Scripted {
    fn new(scores: &[(&'static str, f32)]) -> Self {
        Self {
            scores: scores.iter().copied().collect(),
            ids: scores
                .iter()
                .enumerate()
                .map(|(i, (w, _))| (*w, i as u32 + 1))
                .collect(),
        }
    }
}

impl LanguageModel for Scripted {
    fn begin_sentence_state(&self) -> LmState {
        LmState::empty()
    }

    fn score(&self, state: &LmState, word: &str) -> (f32, LmState) {
        let mut recent = vec![self.ids.get(word).copied().unwrap_or(0)];
        recent.extend_from_slice(state.words());
        (
            self.scores.get(word).copied().unwrap_or(-10.0),
            LmState::from_recent(&recent),
        )
    }
}

fn identity(words: &[&str]) -> ClusterMap {
    ClusterMap::from_pairs(words.iter().map(|w| (*w, *w)))
}

const SOURCE: [&str; 3] = ["le", "chat", "noir"];
const TARGET: [&str; 3] = ["the", "black", "cat"];

fn scene_alignment() -> Alignment {
    Alignment::from_links([(0, 0), (1, 2), (2, 1)])
}

fn scene_scorer(policy: CachePolicy, lm: impl Fn() -> Arc<dyn LanguageModel>) -> CoarseBiLm {
    let bitokens = ["le-the", "noir-black", "chat-cat"];
    let mut words: Vec<&str> = SOURCE.iter().chain(TARGET.iter()).copied().collect();
    words.extend(bitokens);
    let mut builder = CoarseBiLm::builder().cache_policy(policy);
    for role in MapRole::ALL {
        builder = builder.map(role, identity(&words));
    }
    for c in Component::ALL {
        builder = builder.language_model(c, lm());
    }
    builder.build().unwrap()
}

fn flat_scorer(policy: CachePolicy) -> CoarseBiLm {
    scene_scorer(policy, || -> Arc<dyn LanguageModel> { Arc::new(Flat(-1.0)) })
}

#[test]
fn end_to_end_sentence_scores_each_model() {
    let scorer = flat_scorer(CachePolicy::Lazy);
    let root = scorer.empty_state(&SOURCE);
    let (scores, state) = scorer.extend(Some(&root), &SOURCE, &TARGET, &scene_alignment());

    assert_eq!(scores, ScoreVector([-3.0, -3.0, -3.0, -3.0]));
    assert_eq!(
        state.recent_tokens(),
        &["le-the".to_string(), "noir-black".to_string(), "chat-cat".to_string()]
    );
    assert_eq!(
        state.fingerprint(),
        fingerprint(&["le-the", "noir-black", "chat-cat"])
    );

    // a second, independently built scorer reproduces everything
    let again = flat_scorer(CachePolicy::Lazy);
    let (scores2, state2) = again.extend(None, &SOURCE, &TARGET, &scene_alignment());
    assert_eq!(scores2, scores);
    assert_eq!(state2.fingerprint(), state.fingerprint());
    assert_eq!(state2, state);
}

#[test]
fn step_scores_are_summed() {
    let scorer = CoarseBiLm::builder()
        .map(MapRole::Target100, identity(&["a", "b", "c"]))
        .language_model(
            Component::CoarseLm100,
            Arc::new(Scripted::new(&[("a", -1.2), ("b", -0.5), ("c", -2.0)])),
        )
        .build()
        .unwrap();
    let (scores, _) = scorer.extend(None, &["x"], &["a", "b", "c"], &Alignment::new());
    assert!((scores[Component::CoarseLm100] - (-3.7)).abs() < 1e-5, "{:?}", scores);
    assert_eq!(scores[Component::CoarseLm1600], 0.0);
}

#[test]
fn lazy_and_eager_caches_are_identical() {
    let lazy = flat_scorer(CachePolicy::Lazy);
    let eager = flat_scorer(CachePolicy::Eager);

    let lazy_root = lazy.empty_state(&SOURCE);
    assert!(lazy_root.source_clusters().is_empty());
    let eager_root = eager.empty_state(&SOURCE);
    assert_eq!(eager_root.source_clusters(), lazy.source_cluster_ids(&SOURCE).as_slice());

    let first = Alignment::from_links([(0, 0)]);
    let (s1, lazy_state) = lazy.extend(Some(&lazy_root), &SOURCE, &TARGET[..1], &first);
    let (s2, eager_state) = eager.extend(Some(&eager_root), &SOURCE, &TARGET[..1], &first);
    assert_eq!(lazy_state.source_clusters(), eager_state.source_clusters());
    assert_eq!(s1, s2);
    assert_eq!(lazy_state, eager_state);
}

#[test]
fn cached_source_clusters_are_reused_by_descendants() {
    let scorer = flat_scorer(CachePolicy::Lazy);
    let (_, first) = scorer.extend(None, &SOURCE, &TARGET[..1], &Alignment::from_links([(0, 0)]));
    // a different source passed later must not change the cached ids
    let (_, second) = scorer.extend(
        Some(&first),
        &["ignored", "words", "here"],
        &TARGET[1..2],
        &Alignment::from_links([(0, 2)]),
    );
    assert_eq!(second.source_clusters(), first.source_clusters());
    assert_eq!(second.recent_tokens(), &["noir-black".to_string()]);
}

#[test]
fn unaligned_and_unknown_words_fall_back() {
    let scorer = flat_scorer(CachePolicy::Lazy);
    let (scores, state) = scorer.extend(None, &SOURCE, &["the", "zebra"], &Alignment::new());
    assert_eq!(scores, ScoreVector([-2.0; 4]));
    // "NULL-the" and "NULL-NULL" are not in the bitoken map either
    assert_eq!(state.recent_tokens(), &["NULL".to_string(), "NULL".to_string()]);
}

#[test]
fn different_histories_never_compare_equal() {
    let lm = || -> Arc<dyn LanguageModel> {
        Arc::new(Scripted::new(&[
            ("le-the", -1.0),
            ("noir-black", -1.0),
            ("chat-cat", -1.0),
        ]))
    };
    let scorer = scene_scorer(CachePolicy::Lazy, lm);
    let root = scorer.empty_state(&SOURCE);
    let to_le = Alignment::from_links([(0, 0)]);
    let to_noir = Alignment::from_links([(0, 2)]);
    let (_, via_the) = scorer.extend(Some(&root), &SOURCE, &TARGET[..1], &to_le);
    let (_, via_black) = scorer.extend(Some(&root), &SOURCE, &TARGET[1..2], &to_noir);

    let last = Alignment::from_links([(0, 1)]);
    let (_, a) = scorer.extend(Some(&via_the), &SOURCE, &TARGET[2..], &last);
    let (_, b) = scorer.extend(Some(&via_black), &SOURCE, &TARGET[2..], &last);
    // same tokens in the last expansion, same fingerprint, different contexts
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_ne!(a, b);

    let (_, a2) = scorer.extend(Some(&via_the), &SOURCE, &TARGET[2..], &last);
    assert_eq!(a, a2);
}

#[test]
fn siblings_do_not_disturb_their_parent() {
    let scorer = flat_scorer(CachePolicy::Lazy);
    let (_, parent) = scorer.extend(None, &SOURCE, &TARGET[..1], &Alignment::from_links([(0, 0)]));
    let snapshot = parent.clone();

    let to_noir = Alignment::from_links([(0, 2)]);
    let to_chat = Alignment::from_links([(0, 1)]);
    let expected_black = scorer.extend(Some(&parent), &SOURCE, &["black"], &to_noir);
    let expected_cat = scorer.extend(Some(&parent), &SOURCE, &["cat"], &to_chat);

    std::thread::scope(|s| {
        for _ in 0..4 {
            let black = s.spawn(|| scorer.extend(Some(&parent), &SOURCE, &["black"], &to_noir));
            let cat = s.spawn(|| scorer.extend(Some(&parent), &SOURCE, &["cat"], &to_chat));
            let black = black.join().unwrap();
            let cat = cat.join().unwrap();
            assert_eq!(black.0, expected_black.0);
            assert_eq!(black.1, expected_black.1);
            assert_eq!(cat.1, expected_cat.1);
            assert_ne!(black.1, cat.1);
        }
    });

    assert_eq!(parent, snapshot);
    assert_eq!(parent.fingerprint(), snapshot.fingerprint());
    assert_eq!(parent.lm_states(), snapshot.lm_states());
    assert_eq!(parent.source_clusters(), snapshot.source_clusters());
}

#[test]
fn isolation_estimate_uses_phrase_local_alignment() {
    let scorer = flat_scorer(CachePolicy::Lazy);
    let crossed = Alignment::from_links([(0, 1), (1, 0)]);
    let est = scorer.estimate_in_isolation(&["chat", "noir"], &["black", "cat"], &crossed);
    assert_eq!(est, ScoreVector([-2.0; 4]));
    let eos = scorer.end_of_sentence(&scorer.empty_state(&SOURCE));
    assert_eq!(eos, ScoreVector([-1.0; 4]));
}
