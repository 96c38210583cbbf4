//! Binary model header and storage format recognition.
//!
//! Layout: 8-byte magic, little-endian `u32` version, one model-type byte,
//! then a bincode payload whose shape depends on the model type. Files
//! without the magic are legacy text models.

use super::probing::{ProbingModel, ProbingPayload};
use super::trie::{TrieModel, TriePayload};
use super::Backend;
use crate::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

pub const MAGIC: &[u8; 8] = b"MTLMBIN\0";
pub const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 13;

/// Storage format of a binary model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    Probing,
    RestProbing,
    Trie,
    QuantTrie,
    ArrayTrie,
    QuantArrayTrie,
}

impl ModelType {
    pub const ALL: [ModelType; 6] = [
        ModelType::Probing,
        ModelType::RestProbing,
        ModelType::Trie,
        ModelType::QuantTrie,
        ModelType::ArrayTrie,
        ModelType::QuantArrayTrie,
    ];

    pub fn tag(self) -> u8 {
        match self {
            ModelType::Probing => 0,
            ModelType::RestProbing => 1,
            ModelType::Trie => 2,
            ModelType::QuantTrie => 3,
            ModelType::ArrayTrie => 4,
            ModelType::QuantArrayTrie => 5,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            ModelType::Probing => "probing",
            ModelType::RestProbing => "rest-probing",
            ModelType::Trie => "trie",
            ModelType::QuantTrie => "quant-trie",
            ModelType::ArrayTrie => "array-trie",
            ModelType::QuantArrayTrie => "quant-array-trie",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|t| t.name()).collect();
                format!("unknown model type '{}' (expected one of {})", s, names.join(", "))
            })
    }
}

fn parse_header(bytes: &[u8]) -> std::result::Result<Option<ModelType>, String> {
    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Ok(None);
    }
    if bytes.len() < HEADER_LEN {
        return Err("truncated header".to_string());
    }
    let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if version != FORMAT_VERSION {
        return Err(format!(
            "format version {} (this build reads {})",
            version, FORMAT_VERSION
        ));
    }
    ModelType::from_tag(bytes[12])
        .map(Some)
        .ok_or_else(|| format!("unknown model type tag {}", bytes[12]))
}

/// Inspect the header of `path`.
///
/// `Ok(None)` means the file has no binary header and should be read as
/// ARPA text. A header that is present but not understood is
/// [`Error::UnsupportedFormat`].
pub fn recognize_binary<P: AsRef<Path>>(path: P) -> Result<Option<ModelType>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64)
        .read_to_end(&mut header)
        .map_err(|e| Error::io(path, e))?;
    parse_header(&header).map_err(|reason| Error::UnsupportedFormat {
        path: path.to_path_buf(),
        reason,
    })
}

pub(crate) fn read_backend(path: &Path, model_type: ModelType) -> Result<Backend> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .map_err(|e| Error::io(path, e))?;

    let corrupt = |e: String| Error::model_load(path, e);
    let backend = match model_type {
        ModelType::Probing | ModelType::RestProbing => {
            let payload: ProbingPayload =
                bincode::deserialize_from(&mut reader).map_err(|e| corrupt(e.to_string()))?;
            Backend::Probing(ProbingModel::from_payload(payload).map_err(corrupt)?)
        }
        _ => {
            let payload: TriePayload =
                bincode::deserialize_from(&mut reader).map_err(|e| corrupt(e.to_string()))?;
            Backend::Trie(TrieModel::from_payload(payload).map_err(corrupt)?)
        }
    };
    if backend.model_type() != model_type {
        return Err(corrupt(format!(
            "header declares {} but payload holds {}",
            model_type,
            backend.model_type()
        )));
    }
    Ok(backend)
}

pub(crate) fn write_backend(path: &Path, backend: &Backend) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut w = BufWriter::new(file);
    let io_err = |e: std::io::Error| Error::io(path, e);
    w.write_all(MAGIC).map_err(io_err)?;
    w.write_all(&FORMAT_VERSION.to_le_bytes()).map_err(io_err)?;
    w.write_all(&[backend.model_type().tag()]).map_err(io_err)?;
    let written = match backend {
        Backend::Probing(m) => bincode::serialize_into(&mut w, &m.to_payload()),
        Backend::Trie(m) => bincode::serialize_into(&mut w, &m.to_payload()),
    };
    written.map_err(|e| Error::io(path, std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    w.flush().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_parsing() {
        assert_eq!(parse_header(b"\\data\\\nngram 1=3"), Ok(None));
        assert_eq!(parse_header(b""), Ok(None));

        let mut good = MAGIC.to_vec();
        good.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        good.push(ModelType::QuantTrie.tag());
        assert_eq!(parse_header(&good), Ok(Some(ModelType::QuantTrie)));

        let mut bad_tag = good.clone();
        bad_tag[12] = 42;
        assert!(parse_header(&bad_tag).is_err());

        let mut bad_version = good.clone();
        bad_version[8] = 9;
        assert!(parse_header(&bad_version).is_err());

        assert!(parse_header(&good[..10]).is_err());
    }

    #[test]
    fn model_type_names_roundtrip() {
        for t in ModelType::ALL {
            assert_eq!(t.name().parse::<ModelType>().unwrap(), t);
            assert_eq!(ModelType::from_tag(t.tag()), Some(t));
        }
        assert!("hash".parse::<ModelType>().is_err());
    }
}
