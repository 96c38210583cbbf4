use ahash::AHashSet;
use anyhow::{Context, Result};
use clap::Parser;
use mtfeatures_core::utils::tokenize;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Count test-corpus tokens and types that never occur in a training corpus.
#[derive(Parser)]
struct Args {
    /// Whitespace tokenised training corpus
    train: PathBuf,

    /// Whitespace tokenised test corpus
    test: PathBuf,

    /// Print every OOV token occurrence before the summary
    #[arg(long)]
    words: bool,
}

#[derive(Debug, Default, PartialEq)]
struct OovReport {
    total_tokens: usize,
    oov_tokens: usize,
    total_types: usize,
    oov_types: usize,
}

fn ratio(part: usize, whole: usize) -> f32 {
    if whole == 0 {
        0.0
    } else {
        part as f32 / whole as f32
    }
}

impl fmt::Display for OovReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "totalToks={} oovToks={}({}) totalTypes={} oovTypes={}({})",
            self.total_tokens,
            self.oov_tokens,
            ratio(self.oov_tokens, self.total_tokens),
            self.total_types,
            self.oov_types,
            ratio(self.oov_types, self.total_types)
        )
    }
}

fn read_vocab<R: BufRead>(reader: R) -> io::Result<AHashSet<String>> {
    let mut vocab = AHashSet::new();
    for line in reader.lines() {
        let line = line?;
        vocab.extend(tokenize(&line).map(str::to_string));
    }
    Ok(vocab)
}

/// Scan `test`, calling `on_oov` for each OOV token occurrence.
fn count_oov<R: BufRead>(
    vocab: &AHashSet<String>,
    test: R,
    mut on_oov: impl FnMut(&str) -> io::Result<()>,
) -> io::Result<OovReport> {
    let mut report = OovReport::default();
    let mut oov_types = AHashSet::new();
    let mut found_types = AHashSet::new();
    for line in test.lines() {
        let line = line?;
        for tok in tokenize(&line) {
            report.total_tokens += 1;
            if vocab.contains(tok) {
                found_types.insert(tok.to_string());
            } else {
                report.oov_tokens += 1;
                on_oov(tok)?;
                oov_types.insert(tok.to_string());
            }
        }
    }
    report.oov_types = oov_types.len();
    report.total_types = oov_types.len() + found_types.len();
    Ok(report)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();

    let train = File::open(&args.train).with_context(|| format!("open {}", args.train.display()))?;
    let vocab = read_vocab(BufReader::new(train))
        .with_context(|| format!("read {}", args.train.display()))?;
    tracing::info!(types = vocab.len(), "training vocabulary built");

    let test = File::open(&args.test).with_context(|| format!("open {}", args.test.display()))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let report = count_oov(&vocab, BufReader::new(test), |tok| {
        if args.words {
            write!(out, "{} ", tok)?;
        }
        Ok(())
    })
    .with_context(|| format!("read {}", args.test.display()))?;

    if args.words {
        writeln!(out)?;
    }
    writeln!(out, "{}", report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn counts_tokens_and_types() {
        let vocab = read_vocab(Cursor::new("the cat sat\non the mat\n")).unwrap();
        let mut seen = Vec::new();
        let report = count_oov(&vocab, Cursor::new("the dog sat\nthe dog ran\n"), |t| {
            seen.push(t.to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(
            report,
            OovReport {
                total_tokens: 6,
                oov_tokens: 3,
                total_types: 4,
                oov_types: 2,
            }
        );
        assert_eq!(seen, vec!["dog", "dog", "ran"]);
        assert_eq!(
            report.to_string(),
            "totalToks=6 oovToks=3(0.5) totalTypes=4 oovTypes=2(0.5)"
        );
    }

    #[test]
    fn empty_test_corpus_reports_zero_ratios() {
        let vocab = read_vocab(Cursor::new("a b\n")).unwrap();
        let report = count_oov(&vocab, Cursor::new(""), |_| Ok(())).unwrap();
        assert_eq!(
            report.to_string(),
            "totalToks=0 oovToks=0(0) totalTypes=0 oovTypes=0(0)"
        );
    }
}
