//! Word to cluster id lookup tables.
//!
//! A cluster map file is plain UTF-8 text with one `<word> <clusterId>` pair
//! per line. Lines that do not split into exactly two whitespace separated
//! fields are reported and skipped. The table is read-only once built and is
//! shared between scorers behind an `Arc`.

use crate::{Config, Error, Result};
use ahash::AHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Immutable word -> cluster id table.
///
/// `lookup` never fails: words that are absent resolve to the map's unknown
/// cluster, which is `"NULL"` unless the file defines the reserved
/// unknown key (see [`Config::unknown_cluster_key`]).
#[derive(Debug, Clone)]
pub struct ClusterMap {
    map: AHashMap<String, String>,
    unknown: String,
}

impl Default for ClusterMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterMap {
    /// Create an empty map. Every lookup returns `"NULL"`.
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Create an empty map using the sentinel from `cfg`.
    pub fn with_config(cfg: &Config) -> Self {
        Self {
            map: AHashMap::new(),
            unknown: cfg.unknown_cluster.clone(),
        }
    }

    /// Build a map from in-memory pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let cfg = Config::default();
        let mut m = Self::with_config(&cfg);
        for (k, v) in pairs {
            m.insert(k, v);
        }
        m.resolve_unknown(&cfg.unknown_cluster_key);
        m
    }

    /// Take the fallback from the reserved key when the table defines it.
    fn resolve_unknown(&mut self, key: &str) {
        if let Some(unk) = self.map.get(key) {
            self.unknown = unk.clone();
        }
    }

    /// Insert (or replace) a mapping.
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, word: K, cluster: V) {
        self.map.insert(word.into(), cluster.into());
    }

    /// Load a map file with the default sentinel settings.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_config(path, &Config::default())
    }

    /// Load a map file.
    ///
    /// Fails with [`Error::Io`] when the file cannot be opened or read.
    pub fn load_with_config<P: AsRef<Path>>(path: P, cfg: &Config) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let map = Self::from_reader(BufReader::new(file), cfg)
            .map_err(|e| Error::io(path, e))?;
        tracing::info!(
            path = %path.display(),
            entries = map.len(),
            unknown = %map.unknown,
            "loaded cluster map"
        );
        Ok(map)
    }

    /// Parse `<word> <clusterId>` lines from any reader.
    pub fn from_reader<R: BufRead>(reader: R, cfg: &Config) -> std::io::Result<Self> {
        let mut out = Self::with_config(cfg);
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next(), fields.next()) {
                (Some(word), Some(cluster), None) => out.insert(word, cluster),
                _ => {
                    tracing::warn!(
                        line = idx + 1,
                        content = %line,
                        "skipping malformed cluster map line"
                    );
                }
            }
        }
        out.resolve_unknown(&cfg.unknown_cluster_key);
        Ok(out)
    }

    /// Cluster id for `word`, or the unknown cluster when absent.
    pub fn lookup(&self, word: &str) -> &str {
        match self.map.get(word) {
            Some(c) => c,
            None => {
                tracing::trace!(word, fallback = %self.unknown, "cluster lookup miss");
                &self.unknown
            }
        }
    }

    /// Cluster id for `word` without the fallback.
    pub fn get(&self, word: &str) -> Option<&str> {
        self.map.get(word).map(String::as_str)
    }

    /// The value returned for unknown words.
    pub fn unknown_cluster(&self) -> &str {
        &self.unknown
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_pairs_and_skips_malformed_lines() {
        let text = "the 12\ncat 7\nbroken\ntoo many fields\n\nblack 3\n";
        let m = ClusterMap::from_reader(Cursor::new(text), &Config::default()).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.lookup("the"), "12");
        assert_eq!(m.lookup("black"), "3");
        assert_eq!(m.get("broken"), None);
    }

    #[test]
    fn unknown_words_resolve_to_null() {
        let m = ClusterMap::from_pairs([("a", "1")]);
        assert_eq!(m.lookup("zzz"), "NULL");
        assert_eq!(m.lookup(""), "NULL");
    }

    #[test]
    fn reserved_unknown_key_overrides_sentinel() {
        let text = "<unk> 999\nthe 1\n";
        let m = ClusterMap::from_reader(Cursor::new(text), &Config::default()).unwrap();
        assert_eq!(m.unknown_cluster(), "999");
        assert_eq!(m.lookup("never-seen"), "999");
    }

    #[test]
    fn reserved_unknown_key_applies_to_in_memory_pairs() {
        let m = ClusterMap::from_pairs([("<unk>", "999"), ("the", "1")]);
        assert_eq!(m.unknown_cluster(), "999");
        assert_eq!(m.lookup("x"), "999");
        assert_eq!(m.lookup("the"), "1");
    }

    #[test]
    fn configured_sentinel_is_used() {
        let cfg = Config {
            unknown_cluster: "UNK".to_string(),
            ..Config::default()
        };
        let m = ClusterMap::from_reader(Cursor::new("x 1\n"), &cfg).unwrap();
        assert_eq!(m.lookup("y"), "UNK");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ClusterMap::load("/definitely/not/here.clusters").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src.clusters");
        std::fs::write(&path, "le 4\nchat 9\n").unwrap();
        let m = ClusterMap::load(&path).unwrap();
        assert_eq!(m.lookup("chat"), "9");
        assert_eq!(m.lookup("chien"), "NULL");
    }
}
