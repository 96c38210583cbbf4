use ahash::AHashMap;

/// Integer id of a vocabulary word.
pub type WordIndex = u32;

/// Id reserved for `<unk>`.
pub const UNK: WordIndex = 0;

pub const UNK_WORD: &str = "<unk>";
pub const BEGIN_SENTENCE: &str = "<s>";
pub const END_SENTENCE: &str = "</s>";

/// Bidirectional word <-> id table. `<unk>` is always id 0.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: Vec<String>,
    index: AHashMap<String, WordIndex>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

impl Vocabulary {
    pub fn new() -> Self {
        let mut v = Self {
            words: Vec::new(),
            index: AHashMap::new(),
        };
        v.insert(UNK_WORD);
        v
    }

    /// Rebuild a vocabulary from its id-ordered word list.
    ///
    /// The first word must be `<unk>` and words must be unique.
    pub fn from_words(words: Vec<String>) -> Result<Self, String> {
        if words.first().map(String::as_str) != Some(UNK_WORD) {
            return Err(format!("vocabulary must start with {}", UNK_WORD));
        }
        let mut index = AHashMap::with_capacity(words.len());
        for (i, w) in words.iter().enumerate() {
            if index.insert(w.clone(), i as WordIndex).is_some() {
                return Err(format!("duplicate vocabulary word '{}'", w));
            }
        }
        Ok(Self { words, index })
    }

    /// Add `word` if needed and return its id.
    pub fn insert(&mut self, word: &str) -> WordIndex {
        if let Some(&id) = self.index.get(word) {
            return id;
        }
        let id = self.words.len() as WordIndex;
        self.words.push(word.to_string());
        self.index.insert(word.to_string(), id);
        id
    }

    /// Id of `word`, `UNK` when absent.
    pub fn index(&self, word: &str) -> WordIndex {
        self.get(word).unwrap_or(UNK)
    }

    pub fn get(&self, word: &str) -> Option<WordIndex> {
        self.index.get(word).copied()
    }

    pub fn word(&self, id: WordIndex) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    pub fn begin_sentence(&self) -> Option<WordIndex> {
        self.get(BEGIN_SENTENCE)
    }

    pub fn end_sentence(&self) -> Option<WordIndex> {
        self.get(END_SENTENCE)
    }

    /// Words in id order.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
