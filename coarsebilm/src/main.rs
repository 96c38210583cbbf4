use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use coarsebilm::{Alignment, CoarseBiLm, CoarseBiLmConfig, ScoreVector};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Score parallel sentences with the bilingual coarse LM feature, replaying
/// each target sentence as a chain of phrase expansions.
#[derive(Parser)]
struct Args {
    /// TOML configuration file
    #[arg(long, conflicts_with = "feature_line")]
    config: Option<PathBuf>,

    /// Moses feature line, e.g. "CoarseBiLM lmCoarseLM100=... ..."
    #[arg(long)]
    feature_line: Option<String>,

    /// Source sentences, one per line
    #[arg(long)]
    source: PathBuf,

    /// Target sentences, one per line
    #[arg(long)]
    target: PathBuf,

    /// Moses `src-tgt` alignments, one line per sentence
    #[arg(long)]
    alignment: Option<PathBuf>,

    /// Target words per simulated expansion
    #[arg(long, default_value_t = 3)]
    phrase_len: usize,

    /// Add the end-of-sentence score
    #[arg(long)]
    end_of_sentence: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Tsv)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Tsv,
    Json,
}

#[derive(Serialize)]
struct SentenceReport<'a> {
    sentence: usize,
    features: &'a [String],
    scores: ScoreVector,
    fingerprint: u64,
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    BufReader::new(file)
        .lines()
        .collect::<io::Result<Vec<_>>>()
        .with_context(|| format!("read {}", path.display()))
}

fn load_config(args: &Args) -> Result<CoarseBiLmConfig> {
    match (&args.config, &args.feature_line) {
        (Some(path), None) => CoarseBiLmConfig::load_toml(path)
            .with_context(|| format!("load configuration {}", path.display())),
        (None, Some(line)) => {
            CoarseBiLmConfig::from_feature_line(line).context("parse feature line")
        }
        _ => bail!("pass exactly one of --config or --feature-line"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    if args.phrase_len == 0 {
        bail!("--phrase-len must be at least 1");
    }
    let cfg = load_config(&args)?;
    let scorer = CoarseBiLm::load(&cfg).context("load feature tables")?;
    let features = scorer.feature_names();

    let sources = read_lines(&args.source)?;
    let targets = read_lines(&args.target)?;
    let alignments = match &args.alignment {
        Some(p) => read_lines(p)?,
        None => vec![String::new(); targets.len()],
    };
    if sources.len() != targets.len() || alignments.len() != targets.len() {
        bail!(
            "line counts differ: {} source, {} target, {} alignment",
            sources.len(),
            targets.len(),
            alignments.len()
        );
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.format == OutputFormat::Tsv {
        writeln!(out, "sentence\t{}\tfingerprint", features.join("\t"))?;
    }

    for (idx, ((src, tgt), align)) in sources.iter().zip(&targets).zip(&alignments).enumerate() {
        let source: Vec<&str> = src.split_whitespace().collect();
        let target: Vec<&str> = tgt.split_whitespace().collect();
        let alignment = Alignment::parse_at(align, idx + 1)
            .with_context(|| format!("alignment file {:?}", args.alignment))?;

        let mut state = scorer.empty_state(&source);
        let mut total = ScoreVector::default();
        let mut start = 0;
        for phrase in target.chunks(args.phrase_len) {
            let window = alignment.target_window(start..start + phrase.len());
            let (scores, next) = scorer.extend(Some(&state), &source, phrase, &window);
            total += scores;
            state = next;
            start += phrase.len();
        }
        if args.end_of_sentence {
            total += scorer.end_of_sentence(&state);
        }
        tracing::debug!(sentence = idx + 1, words = target.len(), "scored");

        match args.format {
            OutputFormat::Tsv => {
                let cols: Vec<String> = total.as_array().iter().map(|v| v.to_string()).collect();
                writeln!(out, "{}\t{}\t{:016x}", idx + 1, cols.join("\t"), state.fingerprint())?;
            }
            OutputFormat::Json => {
                let report = SentenceReport {
                    sentence: idx + 1,
                    features: &features,
                    scores: total,
                    fingerprint: state.fingerprint(),
                };
                serde_json::to_writer(&mut out, &report)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
