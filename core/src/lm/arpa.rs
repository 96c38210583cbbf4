//! ARPA text format reader and writer.
//!
//! ```text
//! \data\
//! ngram 1=3
//! ngram 2=1
//!
//! \1-grams:
//! -1.0	<s>	-0.3
//! ...
//! \end\
//! ```
//! Probabilities and backoffs are log10 values. Files without the binary
//! header are read through here.

use super::table::{NgramEntry, NgramTable};
use super::vocab::{Vocabulary, WordIndex};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

enum Section {
    Preamble,
    Counts,
    Grams(usize),
    End,
}

fn section_header(line: &str) -> Option<usize> {
    line.strip_prefix('\\')?
        .strip_suffix("-grams:")?
        .parse()
        .ok()
}

/// Parse an ARPA model. Errors carry the offending line number.
pub fn read_arpa<R: BufRead>(reader: R) -> std::result::Result<NgramTable, String> {
    let mut section = Section::Preamble;
    let mut declared: Vec<usize> = Vec::new();
    let mut seen: Vec<usize> = Vec::new();
    let mut vocab = Vocabulary::new();
    let mut grams: Vec<(Vec<WordIndex>, NgramEntry)> = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.map_err(|e| format!("line {}: {}", lineno, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if lineno % 1_000_000 == 0 {
            tracing::debug!(lineno, "reading ARPA");
        }

        match section {
            Section::Preamble => {
                if line == "\\data\\" {
                    section = Section::Counts;
                }
            }
            Section::Counts => {
                if let Some(spec) = line.strip_prefix("ngram ") {
                    let (n, count) = spec
                        .split_once('=')
                        .and_then(|(n, c)| {
                            let n = n.trim().parse::<usize>().ok()?;
                            let c = c.trim().parse::<usize>().ok()?;
                            Some((n, c))
                        })
                        .ok_or_else(|| format!("line {}: bad count line '{}'", lineno, line))?;
                    if n != declared.len() + 1 {
                        return Err(format!(
                            "line {}: expected count for order {}",
                            lineno,
                            declared.len() + 1
                        ));
                    }
                    declared.push(count);
                } else if section_header(line) == Some(1) && !declared.is_empty() {
                    if declared.len() > super::MAX_ORDER {
                        return Err(format!(
                            "order {} exceeds maximum {}",
                            declared.len(),
                            super::MAX_ORDER
                        ));
                    }
                    seen = vec![0; declared.len()];
                    section = Section::Grams(1);
                } else {
                    return Err(format!(
                        "line {}: unexpected '{}' in \\data\\ section",
                        lineno, line
                    ));
                }
            }
            Section::Grams(n) => {
                if line == "\\end\\" {
                    section = Section::End;
                    continue;
                }
                if let Some(next) = section_header(line) {
                    if next != n + 1 || next > declared.len() {
                        return Err(format!(
                            "line {}: unexpected section \\{}-grams:",
                            lineno, next
                        ));
                    }
                    section = Section::Grams(next);
                    continue;
                }
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() != n + 1 && fields.len() != n + 2 {
                    return Err(format!("line {}: expected {} words in '{}'", lineno, n, line));
                }
                let prob: f32 = fields[0]
                    .parse()
                    .map_err(|_| format!("line {}: bad probability '{}'", lineno, fields[0]))?;
                let backoff: f32 = match fields.get(n + 1) {
                    Some(b) => b
                        .parse()
                        .map_err(|_| format!("line {}: bad backoff '{}'", lineno, b))?,
                    None => 0.0,
                };
                let mut ids = Vec::with_capacity(n);
                for w in &fields[1..=n] {
                    let id = if n == 1 {
                        vocab.insert(w)
                    } else {
                        vocab
                            .get(w)
                            .ok_or_else(|| format!("line {}: '{}' is not a unigram", lineno, w))?
                    };
                    ids.push(id);
                }
                grams.push((ids, NgramEntry::new(prob, backoff)));
                seen[n - 1] += 1;
            }
            Section::End => break,
        }
    }

    if !matches!(section, Section::End) {
        return Err("missing \\end\\ marker".to_string());
    }
    for (i, (want, got)) in declared.iter().zip(&seen).enumerate() {
        if want != got {
            return Err(format!("declared {} {}-grams but found {}", want, i + 1, got));
        }
    }
    NgramTable::from_entries(declared.len(), vocab, grams)
}

/// Read an ARPA file from disk.
pub fn load_arpa<P: AsRef<Path>>(path: P) -> Result<NgramTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    read_arpa(BufReader::new(file)).map_err(|reason| Error::model_load(path, reason))
}

/// Write `table` in ARPA format.
pub fn write_arpa<W: Write>(table: &NgramTable, mut out: W) -> std::io::Result<()> {
    let vocab = table.vocabulary();
    let order = table.order();
    writeln!(out, "\\data\\")?;
    for (i, c) in table.counts().iter().enumerate() {
        writeln!(out, "ngram {}={}", i + 1, c)?;
    }
    for n in 1..=order {
        writeln!(out)?;
        writeln!(out, "\\{}-grams:", n)?;
        for (key, e) in table.iter().filter(|(k, _)| k.len() == n) {
            let words: Vec<&str> = key
                .iter()
                .map(|&id| vocab.word(id).unwrap_or("<unk>"))
                .collect();
            if n < order && e.backoff != 0.0 {
                writeln!(out, "{}\t{}\t{}", e.prob, words.join(" "), e.backoff)?;
            } else {
                writeln!(out, "{}\t{}", e.prob, words.join(" "))?;
            }
        }
    }
    writeln!(out)?;
    writeln!(out, "\\end\\")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SMALL: &str = "\\data\\
ngram 1=4
ngram 2=2

\\1-grams:
-99\t<s>\t-0.5
-1.0\t</s>
-0.6\tthe\t-0.2
-0.9\tcat

\\2-grams:
-0.2\t<s> the
-0.4\tthe cat

\\end\\
";

    #[test]
    fn reads_counts_probabilities_and_backoffs() {
        let t = read_arpa(Cursor::new(SMALL)).unwrap();
        assert_eq!(t.order(), 2);
        // <unk> is added on top of the four declared unigrams
        assert_eq!(t.counts(), vec![5, 2]);
        let v = t.vocabulary();
        let the = v.get("the").unwrap();
        let e = t.get(&[the]).unwrap();
        assert_eq!(e.prob, -0.6);
        assert_eq!(e.backoff, -0.2);
        let bos = v.begin_sentence().unwrap();
        assert_eq!(t.get(&[bos, the]).unwrap().prob, -0.2);
    }

    #[test]
    fn count_mismatch_is_an_error() {
        let bad = SMALL.replace("ngram 2=2", "ngram 2=3");
        let err = read_arpa(Cursor::new(bad)).unwrap_err();
        assert!(err.contains("declared 3 2-grams"), "{}", err);
    }

    #[test]
    fn unknown_word_in_bigram_is_an_error() {
        let bad = SMALL.replace("the cat", "the dog");
        let err = read_arpa(Cursor::new(bad)).unwrap_err();
        assert!(err.contains("'dog' is not a unigram"), "{}", err);
    }

    #[test]
    fn truncated_file_is_an_error() {
        let cut = SMALL.replace("\\end\\", "");
        assert!(read_arpa(Cursor::new(cut)).is_err());
    }

    #[test]
    fn written_arpa_reads_back_identically() {
        let t = read_arpa(Cursor::new(SMALL)).unwrap();
        let mut buf = Vec::new();
        write_arpa(&t, &mut buf).unwrap();
        let again = read_arpa(Cursor::new(buf)).unwrap();
        assert_eq!(again.counts(), t.counts());
        for ((k1, e1), (k2, e2)) in t.iter().zip(again.iter()) {
            assert_eq!(k1, k2);
            assert_eq!(e1, e2);
        }
    }
}
