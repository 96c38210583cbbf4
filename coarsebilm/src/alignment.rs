//! Word alignments of one phrase pair or sentence.
//!
//! Links are stored per target position as an ordered set of source
//! positions. The Moses text form lists `src-tgt` pairs separated by
//! whitespace, e.g. `"0-0 2-1 1-2"`.

use mtfeatures_core::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    links: BTreeMap<usize, BTreeSet<usize>>,
}

impl Alignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(target, source)` links.
    pub fn from_links<I: IntoIterator<Item = (usize, usize)>>(links: I) -> Self {
        let mut a = Self::new();
        for (target, source) in links {
            a.insert(target, source);
        }
        a
    }

    /// Parse Moses `src-tgt` pairs. `line` is only used in error messages.
    pub fn parse_at(text: &str, line: usize) -> Result<Self> {
        let mut a = Self::new();
        for pair in text.split_whitespace() {
            let parsed = pair
                .split_once('-')
                .and_then(|(s, t)| Some((s.parse::<usize>().ok()?, t.parse::<usize>().ok()?)));
            match parsed {
                Some((source, target)) => a.insert(target, source),
                None => {
                    return Err(Error::format(
                        line,
                        format!("bad alignment pair '{}' (expected src-tgt)", pair),
                    ))
                }
            }
        }
        Ok(a)
    }

    pub fn insert(&mut self, target: usize, source: usize) {
        self.links.entry(target).or_default().insert(source);
    }

    /// Source positions linked to `target`, ascending.
    pub fn sources(&self, target: usize) -> Option<&BTreeSet<usize>> {
        self.links.get(&target).filter(|s| !s.is_empty())
    }

    pub fn is_aligned(&self, target: usize) -> bool {
        self.sources(target).is_some()
    }

    /// Add `offset` to every source position.
    pub fn shift_source(&self, offset: usize) -> Self {
        let links = self
            .links
            .iter()
            .map(|(&t, s)| (t, s.iter().map(|&p| p + offset).collect()))
            .collect();
        Self { links }
    }

    /// Links of the target positions in `window`, re-based so that
    /// `window.start` becomes target position 0. Source positions are kept.
    pub fn target_window(&self, window: Range<usize>) -> Self {
        let links = self
            .links
            .range(window.clone())
            .map(|(&t, s)| (t - window.start, s.clone()))
            .collect();
        Self { links }
    }

    /// Number of `(target, source)` links.
    pub fn len(&self) -> usize {
        self.links.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(source, target)` links in target order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.links
            .iter()
            .flat_map(|(&t, s)| s.iter().map(move |&src| (src, t)))
    }
}

impl FromStr for Alignment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_at(s, 1)
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (src, tgt) in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}-{}", src, tgt)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_moses_pairs_by_target() {
        let a: Alignment = "0-0 3-2 0-2 2-1".parse().unwrap();
        assert_eq!(a.len(), 4);
        let two: Vec<usize> = a.sources(2).unwrap().iter().copied().collect();
        assert_eq!(two, vec![0, 3]);
        assert!(!a.is_aligned(5));
        assert_eq!(a.to_string(), "0-0 2-1 0-2 3-2");
    }

    #[test]
    fn malformed_pair_reports_line() {
        let err = Alignment::parse_at("0-0 1:2", 7).unwrap_err();
        match err {
            Error::Format { line, reason } => {
                assert_eq!(line, 7);
                assert!(reason.contains("1:2"));
            }
            other => panic!("unexpected error {other}"),
        }
        assert!("a-1".parse::<Alignment>().is_err());
    }

    #[test]
    fn window_rebases_targets_only() {
        let a = Alignment::from_links([(0, 0), (3, 4), (4, 1), (5, 2)]);
        let w = a.target_window(3..5);
        assert_eq!(w, Alignment::from_links([(0, 4), (1, 1)]));
        assert_eq!(a.target_window(6..9), Alignment::new());
    }

    #[test]
    fn shift_moves_source_positions() {
        let a = Alignment::from_links([(0, 0), (1, 2)]);
        assert_eq!(a.shift_source(3), Alignment::from_links([(0, 3), (1, 5)]));
    }

    #[test]
    fn empty_text_is_empty_alignment() {
        let a: Alignment = "  ".parse().unwrap();
        assert!(a.is_empty());
    }
}
