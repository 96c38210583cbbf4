//! Format-neutral n-gram table.
//!
//! Every storage backend is built from, and can be exported back to, an
//! `NgramTable`. N-grams are word id sequences in natural (oldest first)
//! order, kept sorted so that lower orders and prefixes come first.

use super::vocab::{Vocabulary, WordIndex, UNK};
use super::MAX_ORDER;
use serde::{Deserialize, Serialize};

/// Log10 probability assigned when a model lacks `<unk>`.
pub const UNKNOWN_MISSING_LOGPROB: f32 = -100.0;

/// Probability and backoff weight of one n-gram (log10).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NgramEntry {
    pub prob: f32,
    pub backoff: f32,
}

impl NgramEntry {
    pub fn new(prob: f32, backoff: f32) -> Self {
        Self { prob, backoff }
    }
}

#[derive(Debug, Clone)]
pub struct NgramTable {
    order: usize,
    vocab: Vocabulary,
    grams: Vec<(Vec<WordIndex>, NgramEntry)>,
}

/// On-disk shape of a table inside binary model files.
#[derive(Serialize, Deserialize)]
pub(crate) struct TablePayload {
    pub order: usize,
    pub words: Vec<String>,
    pub grams: Vec<(Vec<WordIndex>, NgramEntry)>,
}

impl NgramTable {
    /// Build from unsorted entries; sorts, drops duplicates (last wins) and
    /// guarantees a `<unk>` unigram.
    pub fn from_entries(
        order: usize,
        vocab: Vocabulary,
        grams: Vec<(Vec<WordIndex>, NgramEntry)>,
    ) -> Result<Self, String> {
        if order == 0 || order > MAX_ORDER {
            return Err(format!("order {} outside 1..={}", order, MAX_ORDER));
        }
        let mut table = Self { order, vocab, grams };
        for (words, _) in &table.grams {
            if words.is_empty() || words.len() > order {
                return Err(format!("n-gram of length {} in an order {} model", words.len(), order));
            }
            if let Some(&bad) = words.iter().find(|&&w| w as usize >= table.vocab.len()) {
                return Err(format!("word id {} outside vocabulary", bad));
            }
        }
        table.grams.reverse();
        table.grams.sort_by(|a, b| a.0.cmp(&b.0));
        table.grams.dedup_by(|a, b| a.0 == b.0);
        if table.get(&[UNK]).is_none() {
            table
                .grams
                .insert(0, (vec![UNK], NgramEntry::new(UNKNOWN_MISSING_LOGPROB, 0.0)));
        }
        Ok(table)
    }

    /// Entries exported from a model that was built from a validated table.
    pub(crate) fn from_trusted(
        order: usize,
        vocab: Vocabulary,
        mut grams: Vec<(Vec<WordIndex>, NgramEntry)>,
    ) -> Self {
        grams.sort_by(|a, b| a.0.cmp(&b.0));
        Self { order, vocab, grams }
    }

    pub(crate) fn from_payload(p: TablePayload) -> Result<Self, String> {
        let vocab = Vocabulary::from_words(p.words)?;
        Self::from_entries(p.order, vocab, p.grams)
    }

    pub(crate) fn into_payload(self) -> TablePayload {
        TablePayload {
            order: self.order,
            words: self.vocab.words().to_vec(),
            grams: self.grams,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn len(&self) -> usize {
        self.grams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grams.is_empty()
    }

    pub fn get(&self, ngram: &[WordIndex]) -> Option<NgramEntry> {
        self.grams
            .binary_search_by(|(k, _)| k.as_slice().cmp(ngram))
            .ok()
            .map(|i| self.grams[i].1)
    }

    /// Entries in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&[WordIndex], NgramEntry)> + '_ {
        self.grams.iter().map(|(k, e)| (k.as_slice(), *e))
    }

    /// Number of n-grams of each order, index 0 = unigrams.
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.order];
        for (k, _) in &self.grams {
            counts[k.len() - 1] += 1;
        }
        counts
    }

    /// Rest costs aligned with `iter()`.
    ///
    /// The rest cost of an n-gram is the best probability that any of its
    /// left extensions (direct or transitive) assigns to the same last
    /// word, or its own probability when that is higher. It is an
    /// optimistic stand-in for words whose left context is not known yet.
    pub fn rest_costs(&self) -> Vec<f32> {
        let mut rest: Vec<f32> = self.grams.iter().map(|(_, e)| e.prob).collect();
        for n in (2..=self.order).rev() {
            for (i, (k, _)) in self.grams.iter().enumerate() {
                if k.len() != n {
                    continue;
                }
                if let Ok(j) = self
                    .grams
                    .binary_search_by(|(s, _)| s.as_slice().cmp(&k[1..]))
                {
                    rest[j] = rest[j].max(rest[i]);
                }
            }
        }
        rest
    }

    pub(crate) fn into_parts(self) -> (usize, Vocabulary, Vec<(Vec<WordIndex>, NgramEntry)>) {
        (self.order, self.vocab, self.grams)
    }
}
