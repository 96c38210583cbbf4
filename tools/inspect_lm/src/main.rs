use anyhow::{Context, Result};
use clap::Parser;
use mtfeatures_core::lm::{arpa, recognize_binary};
use mtfeatures_core::{LanguageModel, LanguageModelHandle};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Show a language model's format and sizes, score sentences, or export it
/// as ARPA text.
#[derive(Parser)]
struct Args {
    /// Model file (ARPA text or binary)
    model: PathBuf,

    /// Sentence to score with <s> and </s>; may be repeated
    #[arg(long = "score")]
    sentences: Vec<String>,

    /// Write the model as ARPA text to this path
    #[arg(long)]
    arpa: Option<PathBuf>,
}

/// Per-word log10 probabilities of `sentence`, `</s>` last.
fn score_sentence(lm: &dyn LanguageModel, sentence: &str) -> Vec<(String, f32)> {
    let mut state = lm.begin_sentence_state();
    let mut out = Vec::new();
    for word in sentence.split_whitespace() {
        let (p, next) = lm.score(&state, word);
        out.push((word.to_string(), p));
        state = next;
    }
    out.push(("</s>".to_string(), lm.end_of_sentence(&state)));
    out
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();

    let header = recognize_binary(&args.model)
        .with_context(|| format!("inspect {}", args.model.display()))?;
    let lm = LanguageModelHandle::construct(&args.model)
        .with_context(|| format!("load {}", args.model.display()))?;
    let table = lm.to_table();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match header {
        Some(t) => writeln!(out, "format: {} (binary)", t)?,
        None => writeln!(out, "format: arpa (loaded as {})", lm.model_type())?,
    }
    writeln!(out, "order: {}", lm.order())?;
    writeln!(out, "vocabulary: {}", lm.vocabulary().len())?;
    for (i, c) in table.counts().iter().enumerate() {
        writeln!(out, "ngram {}={}", i + 1, c)?;
    }

    for sentence in &args.sentences {
        let scores = score_sentence(&lm, sentence);
        let total: f32 = scores.iter().map(|(_, p)| p).sum();
        writeln!(out, "{}\ttotal={}", sentence, total)?;
        for (word, p) in scores {
            writeln!(out, "\t{}\t{}", word, p)?;
        }
    }

    if let Some(path) = &args.arpa {
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        arpa::write_arpa(&table, BufWriter::new(file))
            .with_context(|| format!("write {}", path.display()))?;
        tracing::info!(path = %path.display(), "exported ARPA");
    }
    Ok(())
}
