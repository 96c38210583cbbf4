use anyhow::{Context, Result};
use clap::Parser;
use mtfeatures_core::{LanguageModelHandle, ModelType};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Convert a language model (ARPA text or any binary format) into a binary
/// storage format.
#[derive(Parser)]
struct Args {
    /// Input model
    #[arg(long)]
    input: PathBuf,

    /// Output binary model
    #[arg(long)]
    output: PathBuf,

    /// probing, rest-probing, trie, quant-trie, array-trie or quant-array-trie
    #[arg(long, default_value = "trie")]
    format: ModelType,
}

fn convert(input: &Path, output: &Path, format: ModelType) -> Result<LanguageModelHandle> {
    let lm = LanguageModelHandle::construct(input)
        .with_context(|| format!("load {}", input.display()))?;
    tracing::info!(
        from = %lm.model_type(),
        to = %format,
        order = lm.order(),
        counts = ?lm.to_table().counts(),
        "converting"
    );
    lm.write_binary(output, format)
        .with_context(|| format!("write {}", output.display()))?;
    tracing::info!(path = %output.display(), "wrote binary model");
    Ok(lm)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    convert(&args.input, &args.output, args.format)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtfeatures_core::lm::recognize_binary;
    use mtfeatures_core::LanguageModel;

    const BIGRAM: &str = "\\data\\
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
    fn converts_arpa_to_each_format_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let arpa = dir.path().join("model.arpa");
        std::fs::write(&arpa, BIGRAM).unwrap();

        let mut previous = arpa.clone();
        for format in ModelType::ALL {
            let out = dir.path().join(format!("model.{}", format));
            convert(&previous, &out, format).unwrap();
            assert_eq!(recognize_binary(&out).unwrap(), Some(format));
            let lm = LanguageModelHandle::construct(&out).unwrap();
            let (p, _) = lm.score(&lm.begin_sentence_state(), "the");
            assert!((p - (-0.2)).abs() < 1e-5);
            previous = out;
        }
    }

    #[test]
    fn format_names_parse_from_the_command_line() {
        let args = Args::try_parse_from([
            "build_lm", "--input", "a.arpa", "--output", "a.bin", "--format", "quant-array-trie",
        ])
        .unwrap();
        assert_eq!(args.format, ModelType::QuantArrayTrie);
        assert!(Args::try_parse_from([
            "build_lm", "--input", "a", "--output", "b", "--format", "hash"
        ])
        .is_err());
    }
}
