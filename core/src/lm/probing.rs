//! Hash table storage, optionally carrying rest costs.

use super::table::{NgramEntry, NgramTable, TablePayload};
use super::vocab::{Vocabulary, WordIndex};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
struct Slot {
    entry: NgramEntry,
    rest: f32,
}

#[derive(Debug)]
pub(crate) struct ProbingModel {
    order: usize,
    vocab: Vocabulary,
    grams: AHashMap<Vec<WordIndex>, Slot>,
    has_rest: bool,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ProbingPayload {
    table: TablePayload,
    rest: Option<Vec<f32>>,
}

impl ProbingModel {
    pub fn from_table(table: NgramTable, with_rest: bool) -> Self {
        let rest = with_rest.then(|| table.rest_costs());
        Self::assemble(table, rest)
    }

    fn assemble(table: NgramTable, rest: Option<Vec<f32>>) -> Self {
        let has_rest = rest.is_some();
        let (order, vocab, grams) = table.into_parts();
        let mut map = AHashMap::with_capacity(grams.len());
        for (i, (key, entry)) in grams.into_iter().enumerate() {
            let rest = rest
                .as_ref()
                .and_then(|r| r.get(i).copied())
                .unwrap_or(entry.prob);
            map.insert(key, Slot { entry, rest });
        }
        Self {
            order,
            vocab,
            grams: map,
            has_rest,
        }
    }

    pub fn from_payload(p: ProbingPayload) -> Result<Self, String> {
        let table = NgramTable::from_payload(p.table)?;
        if let Some(r) = &p.rest {
            if r.len() != table.len() {
                return Err(format!("{} rest costs for {} n-grams", r.len(), table.len()));
            }
        }
        Ok(Self::assemble(table, p.rest))
    }

    pub fn to_payload(&self) -> ProbingPayload {
        let table = self.to_table();
        let rest = self.has_rest.then(|| {
            table
                .iter()
                .map(|(k, e)| self.grams.get(k).map(|s| s.rest).unwrap_or(e.prob))
                .collect()
        });
        ProbingPayload {
            table: table.into_payload(),
            rest,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn has_rest(&self) -> bool {
        self.has_rest
    }

    pub fn lookup(&self, ngram: &[WordIndex]) -> Option<NgramEntry> {
        self.grams.get(ngram).map(|s| s.entry)
    }

    pub fn rest_cost(&self, ngram: &[WordIndex]) -> Option<f32> {
        self.grams.get(ngram).map(|s| s.rest)
    }

    pub fn to_table(&self) -> NgramTable {
        let grams = self.grams.iter().map(|(k, s)| (k.clone(), s.entry)).collect();
        NgramTable::from_trusted(self.order, self.vocab.clone(), grams)
    }
}
