//! N-gram language models.
//!
//! A [`LanguageModelHandle`] wraps one loaded model. The storage format is
//! picked from the file header (see [`recognize_binary`]); files without a
//! header are read as ARPA text into the probing format. Scoring follows the
//! usual ARPA backoff rule on log10 probabilities:
//!
//! ```text
//! log P(w | c_1..c_k) = prob(longest match) + sum of backoff(c_1..c_j)
//!                       for every context c_1..c_j longer than the match
//! ```
//!
//! Scorers only see the [`LanguageModel`] trait, so tests can plug in toy
//! models.

pub mod arpa;
mod format;
mod probing;
mod table;
mod trie;
mod vocab;

pub use format::{recognize_binary, ModelType, FORMAT_VERSION, MAGIC};
pub use table::{NgramEntry, NgramTable, UNKNOWN_MISSING_LOGPROB};
pub use vocab::{Vocabulary, WordIndex, BEGIN_SENTENCE, END_SENTENCE, UNK, UNK_WORD};

use crate::{Error, Result};
use probing::ProbingModel;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trie::{IndexKind, TrieModel};

/// Highest n-gram order any backend accepts.
pub const MAX_ORDER: usize = 6;

/// Left context of a model: the last words scored, most recent first.
///
/// A plain value. Unused slots are always zero so the derived comparisons
/// only depend on the live words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LmState {
    length: u8,
    words: [WordIndex; MAX_ORDER - 1],
}

impl LmState {
    /// State with no context.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from words given most recent first; extra words are dropped.
    pub fn from_recent(words: &[WordIndex]) -> Self {
        let mut state = Self::default();
        let n = words.len().min(MAX_ORDER - 1);
        state.words[..n].copy_from_slice(&words[..n]);
        state.length = n as u8;
        state
    }

    /// Context words, most recent first.
    pub fn words(&self) -> &[WordIndex] {
        &self.words[..self.length as usize]
    }

    pub fn len(&self) -> usize {
        self.length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// What a scorer needs from a language model.
pub trait LanguageModel: Send + Sync {
    /// Context holding only `<s>`.
    fn begin_sentence_state(&self) -> LmState;

    /// Context for text whose left side is unknown.
    fn null_context_state(&self) -> LmState {
        LmState::empty()
    }

    /// Log10 probability of `word` after `state`, and the state that follows.
    fn score(&self, state: &LmState, word: &str) -> (f32, LmState);

    /// Log10 probability of `</s>` after `state`.
    fn end_of_sentence(&self, state: &LmState) -> f32 {
        self.score(state, END_SENTENCE).0
    }

    /// Score a fragment with no left context.
    fn estimate(&self, words: &[&str]) -> f32 {
        let mut state = self.null_context_state();
        let mut total = 0.0;
        for word in words {
            let (p, next) = self.score(&state, word);
            total += p;
            state = next;
        }
        total
    }
}

#[derive(Debug)]
pub(crate) enum Backend {
    Probing(ProbingModel),
    Trie(TrieModel),
}

impl Backend {
    fn build(table: NgramTable, model_type: ModelType) -> std::result::Result<Self, String> {
        Ok(match model_type {
            ModelType::Probing => Backend::Probing(ProbingModel::from_table(table, false)),
            ModelType::RestProbing => Backend::Probing(ProbingModel::from_table(table, true)),
            ModelType::Trie => Backend::Trie(TrieModel::from_table(table, IndexKind::Fst, false)?),
            ModelType::QuantTrie => {
                Backend::Trie(TrieModel::from_table(table, IndexKind::Fst, true)?)
            }
            ModelType::ArrayTrie => {
                Backend::Trie(TrieModel::from_table(table, IndexKind::Array, false)?)
            }
            ModelType::QuantArrayTrie => {
                Backend::Trie(TrieModel::from_table(table, IndexKind::Array, true)?)
            }
        })
    }

    pub(crate) fn model_type(&self) -> ModelType {
        match self {
            Backend::Probing(m) if m.has_rest() => ModelType::RestProbing,
            Backend::Probing(_) => ModelType::Probing,
            Backend::Trie(m) => m.model_type(),
        }
    }

    fn order(&self) -> usize {
        match self {
            Backend::Probing(m) => m.order(),
            Backend::Trie(m) => m.order(),
        }
    }

    fn vocabulary(&self) -> &Vocabulary {
        match self {
            Backend::Probing(m) => m.vocabulary(),
            Backend::Trie(m) => m.vocabulary(),
        }
    }

    fn lookup(&self, ngram: &[WordIndex]) -> Option<NgramEntry> {
        match self {
            Backend::Probing(m) => m.lookup(ngram),
            Backend::Trie(m) => m.lookup(ngram),
        }
    }

    fn rest_cost(&self, ngram: &[WordIndex]) -> Option<f32> {
        match self {
            Backend::Probing(m) if m.has_rest() => m.rest_cost(ngram),
            _ => None,
        }
    }

    fn to_table(&self) -> NgramTable {
        match self {
            Backend::Probing(m) => m.to_table(),
            Backend::Trie(m) => m.to_table(),
        }
    }
}

/// A loaded model. Cheap to clone; clones share the read-only storage.
#[derive(Clone)]
pub struct LanguageModelHandle {
    backend: Arc<Backend>,
    max_context: usize,
    begin: LmState,
}

impl LanguageModelHandle {
    /// Load a model, choosing the storage format from the file header.
    ///
    /// Files without the binary magic are legacy ARPA text and load into
    /// the probing format.
    pub fn construct<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let backend = match recognize_binary(path)? {
            Some(model_type) => format::read_backend(path, model_type)?,
            None => {
                tracing::debug!(path = %path.display(), "no binary header, reading ARPA text");
                Backend::Probing(ProbingModel::from_table(arpa::load_arpa(path)?, false))
            }
        };
        tracing::info!(
            path = %path.display(),
            format = %backend.model_type(),
            order = backend.order(),
            vocab = backend.vocabulary().len(),
            "loaded language model"
        );
        Ok(Self::from_backend(backend))
    }

    /// Build a model of the given storage format from an in-memory table.
    pub fn from_table(table: NgramTable, model_type: ModelType) -> Result<Self> {
        let backend = Backend::build(table, model_type)
            .map_err(|reason| Error::model_load(format!("<{}>", model_type), reason))?;
        Ok(Self::from_backend(backend))
    }

    /// Parse ARPA text into a probing model.
    pub fn from_arpa_str(text: &str) -> Result<Self> {
        let table = arpa::read_arpa(text.as_bytes())
            .map_err(|reason| Error::model_load(PathBuf::from("<memory>"), reason))?;
        Self::from_table(table, ModelType::Probing)
    }

    fn from_backend(backend: Backend) -> Self {
        let max_context = backend.order().saturating_sub(1);
        let begin = backend
            .vocabulary()
            .begin_sentence()
            .map(|bos| LmState::from_recent(&[bos]))
            .unwrap_or_default();
        let mut handle = Self {
            backend: Arc::new(backend),
            max_context,
            begin,
        };
        handle.begin = handle.truncate(begin);
        handle
    }

    /// Limit scoring to n-grams of at most `ngrams` words.
    ///
    /// Values above the model order have no effect; 0 behaves like 1.
    pub fn with_max_order(mut self, ngrams: usize) -> Self {
        self.max_context = ngrams
            .saturating_sub(1)
            .min(self.backend.order().saturating_sub(1));
        self.begin = self.truncate(self.begin);
        self
    }

    fn truncate(&self, state: LmState) -> LmState {
        if state.len() <= self.max_context {
            state
        } else {
            LmState::from_recent(&state.words()[..self.max_context])
        }
    }

    pub fn model_type(&self) -> ModelType {
        self.backend.model_type()
    }

    pub fn order(&self) -> usize {
        self.backend.order()
    }

    /// Longest n-gram consulted while scoring.
    pub fn effective_order(&self) -> usize {
        self.max_context + 1
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        self.backend.vocabulary()
    }

    /// Export the model as a format-neutral table.
    ///
    /// Quantized formats export their decoded (approximate) values.
    pub fn to_table(&self) -> NgramTable {
        self.backend.to_table()
    }

    /// Write the model in `model_type` binary format.
    pub fn write_binary<P: AsRef<Path>>(&self, path: P, model_type: ModelType) -> Result<()> {
        let path = path.as_ref();
        if model_type == self.model_type() {
            return format::write_backend(path, &self.backend);
        }
        let backend = Backend::build(self.to_table(), model_type)
            .map_err(|reason| Error::model_load(path, reason))?;
        format::write_backend(path, &backend)
    }

    /// Score a word id after `state`.
    pub fn score_index(&self, state: &LmState, word: WordIndex) -> (f32, LmState) {
        self.score_with(state, word, false)
    }

    fn score_with(&self, state: &LmState, word: WordIndex, use_rest: bool) -> (f32, LmState) {
        let context = &state.words()[..state.len().min(self.max_context)];
        let mut ngram = [0 as WordIndex; MAX_ORDER];

        // ngram[MAX_ORDER - 1 - k..] holds the match with k context words
        let last = MAX_ORDER - 1;
        ngram[last] = word;
        let unigram = self.backend.lookup(&ngram[last..]);
        let mut prob = unigram.map_or(UNKNOWN_MISSING_LOGPROB, |e| e.prob);
        let mut matched = 0;
        for (k, &w) in context.iter().enumerate() {
            ngram[last - k - 1] = w;
            match self.backend.lookup(&ngram[last - k - 1..]) {
                Some(e) => {
                    prob = e.prob;
                    matched = k + 1;
                }
                None => break,
            }
        }
        if use_rest {
            if let Some(rest) = self.backend.rest_cost(&ngram[last - matched..]) {
                prob = rest;
            }
        }

        // backoffs of the contexts longer than the match; ngram[..last]
        // holds them oldest first once filled
        let mut backoff = 0.0;
        for k in matched..context.len() {
            ngram[last - k - 1] = context[k];
            match self.backend.lookup(&ngram[last - k - 1..last]) {
                Some(e) => backoff += e.backoff,
                None => break,
            }
        }

        let next = if word == UNK {
            LmState::empty()
        } else {
            let mut recent = [0 as WordIndex; MAX_ORDER];
            recent[0] = word;
            recent[1..=matched].copy_from_slice(&context[..matched]);
            LmState::from_recent(&recent[..(matched + 1).min(self.max_context)])
        };
        (prob + backoff, next)
    }
}

impl LanguageModel for LanguageModelHandle {
    fn begin_sentence_state(&self) -> LmState {
        self.begin
    }

    fn score(&self, state: &LmState, word: &str) -> (f32, LmState) {
        self.score_index(state, self.vocabulary().index(word))
    }

    /// Uses rest costs for words whose left context lies outside the
    /// fragment when the model carries them.
    fn estimate(&self, words: &[&str]) -> f32 {
        let mut state = LmState::empty();
        let mut total = 0.0;
        for (i, word) in words.iter().enumerate() {
            let id = self.vocabulary().index(word);
            let (p, next) = self.score_with(&state, id, i < self.max_context);
            total += p;
            state = next;
        }
        total
    }
}

impl fmt::Debug for LanguageModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageModelHandle")
            .field("model_type", &self.model_type())
            .field("order", &self.order())
            .field("effective_order", &self.effective_order())
            .field("vocab", &self.vocabulary().len())
            .finish()
    }
}
