use coarsebilm::{Alignment, CoarseBiLm, CoarseBiLmConfig, Component};
use mtfeatures_core::{Error, LanguageModelHandle, ModelType};
use std::path::Path;
use tempfile::TempDir;

fn unigram_arpa(tokens: &[&str]) -> String {
    let mut text = format!("\\data\\\nngram 1={}\n\n\\1-grams:\n", tokens.len() + 2);
    text.push_str("-99\t<s>\n-1.0\t</s>\n");
    for t in tokens {
        text.push_str(&format!("-0.5\t{}\n", t));
    }
    text.push_str("\n\\end\\\n");
    text
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

/// Cluster maps and unigram models for "le chat noir" / "the black cat".
fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let d = dir.path();
    write(d, "tgt100", "the C1\nblack C2\ncat C3\n");
    write(d, "tgt1600", "the D1\nblack D2\ncat D3\n");
    write(d, "tgt400", "the T1\nblack T2\ncat T3\n");
    write(d, "src400", "le S1\nchat S2\nnoir S3\nbroken-line\n");
    write(d, "bitoken", "S1-T1 B1\nS3-T2 B2\nS2-T3 B3\n");
    write(d, "bitoken-cluster", "B1 K1\nB2 K1\nB3 K2\n");
    write(d, "lm100.arpa", &unigram_arpa(&["C1", "C2", "C3"]));
    write(d, "lm1600.arpa", &unigram_arpa(&["D1", "D2", "D3"]));
    write(d, "bilm.arpa", &unigram_arpa(&["B1", "B2", "B3"]));
    let clustered = LanguageModelHandle::from_arpa_str(&unigram_arpa(&["K1", "K2"])).unwrap();
    clustered.write_binary(d.join("bilmc.bin"), ModelType::QuantTrie).unwrap();
    dir
}

fn feature_line(d: &Path) -> String {
    let p = |name: &str| d.join(name).display().to_string();
    format!(
        "CoarseBiLM name=CoarseBiLM0 \
         tgtWordToClusterId100={} tgtWordToClusterId1600={} tgtWordToClusterId400={} \
         srcWordToClusterId={} bitokenToBitokenId={} bitokenIdToClusterId={} \
         lmCoarseLM100={} lmCoarseLM1600={} biLMWithoutClustering={} biLMWithClustering={}",
        p("tgt100"),
        p("tgt1600"),
        p("tgt400"),
        p("src400"),
        p("bitoken"),
        p("bitoken-cluster"),
        p("lm100.arpa"),
        p("lm1600.arpa"),
        p("bilm.arpa"),
        p("bilmc.bin"),
    )
}

#[test]
fn loads_tables_from_feature_line_and_scores() {
    let dir = fixture();
    let cfg = CoarseBiLmConfig::from_feature_line(&feature_line(dir.path())).unwrap();
    let scorer = CoarseBiLm::load(&cfg).unwrap();
    assert_eq!(scorer.name(), "CoarseBiLM0");

    let source = ["le", "chat", "noir"];
    let alignment: Alignment = "0-0 2-1 1-2".parse().unwrap();
    let root = scorer.empty_state(&source);
    let (scores, state) = scorer.extend(Some(&root), &source, &["the", "black", "cat"], &alignment);

    for v in scores.as_array() {
        assert!((v - (-1.5)).abs() < 1e-5, "{:?}", scores);
    }
    assert_eq!(
        state.recent_tokens(),
        &["K1".to_string(), "K1".to_string(), "K2".to_string()]
    );
    assert_eq!(state.source_clusters(), &["S1".to_string(), "S2".to_string(), "S3".to_string()]);

    let eos = scorer.end_of_sentence(&state);
    for v in eos.as_array() {
        assert!((v - (-1.0)).abs() < 1e-5, "{:?}", eos);
    }

    let est = scorer.estimate_in_isolation(&["noir"], &["black"], &Alignment::from_links([(0, 0)]));
    for v in est.as_array() {
        assert!((v - (-0.5)).abs() < 1e-5, "{:?}", est);
    }
}

#[test]
fn toml_configuration_matches_feature_line() {
    let dir = fixture();
    let cfg = CoarseBiLmConfig::from_feature_line(&feature_line(dir.path())).unwrap();
    let toml_path = dir.path().join("feature.toml");
    std::fs::write(&toml_path, cfg.to_toml_string().unwrap()).unwrap();
    let from_toml = CoarseBiLmConfig::load_toml(&toml_path).unwrap();
    assert_eq!(from_toml, cfg);

    let a = CoarseBiLm::load(&cfg).unwrap();
    let b = CoarseBiLm::load(&from_toml).unwrap();
    let source = ["le", "chat", "noir"];
    let align = Alignment::from_links([(0, 2)]);
    let (sa, xa) = a.extend(None, &source, &["black"], &align);
    let (sb, xb) = b.extend(None, &source, &["black"], &align);
    assert_eq!(sa, sb);
    assert_eq!(xa, xb);
}

#[test]
fn partial_configuration_enables_only_its_stages() {
    let dir = fixture();
    let d = dir.path();
    let line = format!(
        "CoarseBiLM tgtWordToClusterId1600={} lmCoarseLM1600={}",
        d.join("tgt1600").display(),
        d.join("lm1600.arpa").display()
    );
    let scorer = CoarseBiLm::load(&CoarseBiLmConfig::from_feature_line(&line).unwrap()).unwrap();
    assert!(scorer.stages().is_enabled(Component::CoarseLm1600));
    assert!(!scorer.stages().needs_bitokens());
    let (scores, _) = scorer.extend(None, &["le"], &["the", "dog"], &Alignment::new());
    // "dog" maps to NULL, which the model does not know: <unk> scores -100
    assert_eq!(scores[Component::CoarseLm100], 0.0);
    assert!((scores[Component::CoarseLm1600] - (-100.5)).abs() < 1e-4, "{:?}", scores);
    assert_eq!(scores[Component::BiLmWithClustering], 0.0);
}

#[test]
fn missing_files_abort_loading() {
    let dir = fixture();
    let d = dir.path();

    let path = |name: &str| d.join(name).display().to_string();
    let line = feature_line(d).replace(&path("src400"), &path("nope"));
    let err = CoarseBiLm::load(&CoarseBiLmConfig::from_feature_line(&line).unwrap()).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{}", err);

    let line = feature_line(d).replace(&path("bilm.arpa"), &path("nope.arpa"));
    let err = CoarseBiLm::load(&CoarseBiLmConfig::from_feature_line(&line).unwrap()).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{}", err);
}

#[test]
fn ngrams_option_is_applied_to_every_model() {
    let dir = fixture();
    let line = format!("{} ngrams=1", feature_line(dir.path()));
    let cfg = CoarseBiLmConfig::from_feature_line(&line).unwrap();
    assert_eq!(cfg.ngrams, Some(1));
    let scorer = CoarseBiLm::load(&cfg).unwrap();
    let root = scorer.empty_state(&["le"]);
    assert!(root.lm_states().iter().all(|s| s.is_empty()));
}
