//! Sorted-key storage: an `fst` index (trie) or a bisected array, over
//! plain or quantized values.

use super::table::{NgramEntry, NgramTable};
use super::vocab::{Vocabulary, WordIndex};
use super::{ModelType, MAX_ORDER};
use fst::Map;
use serde::{Deserialize, Serialize};

/// Bits per quantized value.
pub const QUANT_BITS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexKind {
    Fst,
    Array,
}

#[derive(Debug)]
enum TrieIndex {
    Fst(Map<Vec<u8>>),
    Array(Vec<Vec<WordIndex>>),
}

#[derive(Serialize, Deserialize)]
enum IndexPayload {
    Fst(Vec<u8>),
    Array(Vec<Vec<WordIndex>>),
}

/// Equal-population codebook: sorted bin centers.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Codebook {
    centers: Vec<f32>,
}

impl Codebook {
    fn train(values: &[f32], bins: usize) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f32::total_cmp);
        if sorted.is_empty() {
            return Self { centers: vec![0.0] };
        }
        let bins = bins.clamp(1, sorted.len());
        let mut centers = Vec::with_capacity(bins);
        for b in 0..bins {
            let chunk = &sorted[b * sorted.len() / bins..(b + 1) * sorted.len() / bins];
            if !chunk.is_empty() {
                centers.push(chunk.iter().sum::<f32>() / chunk.len() as f32);
            }
        }
        centers.dedup();
        Self { centers }
    }

    fn encode(&self, v: f32) -> u8 {
        let i = self.centers.partition_point(|&c| c < v);
        let best = if i == 0 {
            0
        } else if i == self.centers.len() {
            i - 1
        } else if (v - self.centers[i - 1]).abs() <= (self.centers[i] - v).abs() {
            i - 1
        } else {
            i
        };
        best as u8
    }

    fn decode(&self, code: u8) -> f32 {
        self.centers[code as usize]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum ValueStore {
    Plain(Vec<NgramEntry>),
    Quantized {
        prob: Codebook,
        backoff: Codebook,
        codes: Vec<[u8; 2]>,
    },
}

impl ValueStore {
    fn len(&self) -> usize {
        match self {
            ValueStore::Plain(v) => v.len(),
            ValueStore::Quantized { codes, .. } => codes.len(),
        }
    }

    fn get(&self, i: usize) -> Option<NgramEntry> {
        match self {
            ValueStore::Plain(v) => v.get(i).copied(),
            ValueStore::Quantized {
                prob,
                backoff,
                codes,
            } => codes
                .get(i)
                .map(|c| NgramEntry::new(prob.decode(c[0]), backoff.decode(c[1]))),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if let ValueStore::Quantized {
            prob,
            backoff,
            codes,
        } = self
        {
            if prob.centers.is_empty() || backoff.centers.is_empty() {
                return Err("empty quantization codebook".to_string());
            }
            if codes.iter().any(|c| {
                c[0] as usize >= prob.centers.len() || c[1] as usize >= backoff.centers.len()
            }) {
                return Err("quantization code outside codebook".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct TriePayload {
    order: usize,
    words: Vec<String>,
    index: IndexPayload,
    values: ValueStore,
}

#[derive(Debug)]
pub(crate) struct TrieModel {
    order: usize,
    vocab: Vocabulary,
    index: TrieIndex,
    values: ValueStore,
}

/// Big-endian encoding keeps byte order equal to word id order.
fn encode_key<'a>(ngram: &[WordIndex], buf: &'a mut [u8; MAX_ORDER * 4]) -> &'a [u8] {
    for (i, w) in ngram.iter().enumerate() {
        buf[i * 4..i * 4 + 4].copy_from_slice(&w.to_be_bytes());
    }
    &buf[..ngram.len() * 4]
}

fn decode_key(bytes: &[u8]) -> Vec<WordIndex> {
    bytes
        .chunks_exact(4)
        .map(|c| WordIndex::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// A stored n-gram must fit the model order and only use known word ids.
fn check_key(key: &[WordIndex], order: usize, vocab_len: usize) -> Result<(), String> {
    if key.is_empty() || key.len() > order {
        return Err(format!(
            "n-gram of length {} in an order {} model",
            key.len(),
            order
        ));
    }
    if let Some(&bad) = key.iter().find(|&&w| w as usize >= vocab_len) {
        return Err(format!("word id {} outside vocabulary", bad));
    }
    Ok(())
}

fn check_fst_keys(
    map: &Map<Vec<u8>>,
    order: usize,
    vocab_len: usize,
    values: usize,
) -> Result<(), String> {
    use fst::Streamer;
    let mut stream = map.stream();
    while let Some((bytes, idx)) = stream.next() {
        if bytes.len() % 4 != 0 {
            return Err(format!("fst key of {} bytes", bytes.len()));
        }
        check_key(&decode_key(bytes), order, vocab_len)?;
        if idx as usize >= values {
            return Err(format!("fst value index {} past {} values", idx, values));
        }
    }
    Ok(())
}

impl TrieModel {
    pub fn from_table(table: NgramTable, kind: IndexKind, quantize: bool) -> Result<Self, String> {
        let (order, vocab, grams) = table.into_parts();
        let entries: Vec<NgramEntry> = grams.iter().map(|(_, e)| *e).collect();
        let values = if quantize {
            let bins = 1usize << QUANT_BITS;
            let probs: Vec<f32> = entries.iter().map(|e| e.prob).collect();
            let backoffs: Vec<f32> = entries.iter().map(|e| e.backoff).collect();
            let prob = Codebook::train(&probs, bins);
            let backoff = Codebook::train(&backoffs, bins);
            let codes = entries
                .iter()
                .map(|e| [prob.encode(e.prob), backoff.encode(e.backoff)])
                .collect();
            ValueStore::Quantized {
                prob,
                backoff,
                codes,
            }
        } else {
            ValueStore::Plain(entries)
        };
        let index = match kind {
            IndexKind::Fst => {
                let mut builder = fst::MapBuilder::memory();
                let mut buf = [0u8; MAX_ORDER * 4];
                for (i, (key, _)) in grams.iter().enumerate() {
                    builder
                        .insert(encode_key(key, &mut buf), i as u64)
                        .map_err(|e| format!("fst build: {}", e))?;
                }
                let bytes = builder.into_inner().map_err(|e| format!("fst build: {}", e))?;
                TrieIndex::Fst(Map::new(bytes).map_err(|e| format!("fst: {}", e))?)
            }
            IndexKind::Array => TrieIndex::Array(grams.into_iter().map(|(k, _)| k).collect()),
        };
        Ok(Self {
            order,
            vocab,
            index,
            values,
        })
    }

    pub fn from_payload(p: TriePayload) -> Result<Self, String> {
        if p.order == 0 || p.order > MAX_ORDER {
            return Err(format!("order {} outside 1..={}", p.order, MAX_ORDER));
        }
        let vocab = Vocabulary::from_words(p.words)?;
        p.values.validate()?;
        let index = match p.index {
            IndexPayload::Fst(bytes) => {
                let map = Map::new(bytes).map_err(|e| format!("fst: {}", e))?;
                check_fst_keys(&map, p.order, vocab.len(), p.values.len())?;
                TrieIndex::Fst(map)
            }
            IndexPayload::Array(keys) => {
                if keys.windows(2).any(|w| w[0] >= w[1]) {
                    return Err("array index is not strictly sorted".to_string());
                }
                for key in &keys {
                    check_key(key, p.order, vocab.len())?;
                }
                TrieIndex::Array(keys)
            }
        };
        let n = match &index {
            TrieIndex::Fst(m) => m.len(),
            TrieIndex::Array(k) => k.len(),
        };
        if n != p.values.len() {
            return Err(format!("{} keys but {} values", n, p.values.len()));
        }
        Ok(Self {
            order: p.order,
            vocab,
            index,
            values: p.values,
        })
    }

    pub fn to_payload(&self) -> TriePayload {
        let index = match &self.index {
            TrieIndex::Fst(m) => IndexPayload::Fst(m.as_fst().as_bytes().to_vec()),
            TrieIndex::Array(k) => IndexPayload::Array(k.clone()),
        };
        TriePayload {
            order: self.order,
            words: self.vocab.words().to_vec(),
            index,
            values: self.values.clone(),
        }
    }

    pub fn model_type(&self) -> ModelType {
        let quant = matches!(self.values, ValueStore::Quantized { .. });
        match (&self.index, quant) {
            (TrieIndex::Fst(_), false) => ModelType::Trie,
            (TrieIndex::Fst(_), true) => ModelType::QuantTrie,
            (TrieIndex::Array(_), false) => ModelType::ArrayTrie,
            (TrieIndex::Array(_), true) => ModelType::QuantArrayTrie,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn lookup(&self, ngram: &[WordIndex]) -> Option<NgramEntry> {
        let idx = match &self.index {
            TrieIndex::Fst(m) => {
                let mut buf = [0u8; MAX_ORDER * 4];
                m.get(encode_key(ngram, &mut buf))? as usize
            }
            TrieIndex::Array(keys) => keys
                .binary_search_by(|k| k.as_slice().cmp(ngram))
                .ok()?,
        };
        self.values.get(idx)
    }

    pub fn to_table(&self) -> NgramTable {
        let grams = match &self.index {
            TrieIndex::Fst(m) => {
                use fst::Streamer;
                let mut out = Vec::with_capacity(m.len());
                let mut stream = m.stream();
                while let Some((key, idx)) = stream.next() {
                    if let Some(e) = self.values.get(idx as usize) {
                        out.push((decode_key(key), e));
                    }
                }
                out
            }
            TrieIndex::Array(keys) => keys
                .iter()
                .enumerate()
                .filter_map(|(i, k)| self.values.get(i).map(|e| (k.clone(), e)))
                .collect(),
        };
        NgramTable::from_trusted(self.order, self.vocab.clone(), grams)
    }
}
