use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const CORPUS: &str = "I have a pen\nI have an apple\napple pen\nthe pen is on the table\n";

fn temp_workspace() -> TempDir {
    tempfile::tempdir().expect("create tempdir")
}

fn spvocab() -> Command {
    Command::cargo_bin("spvocab").expect("binary exists")
}

fn train_char_model(workspace: &TempDir) {
    fs::write(workspace.path().join("corpus.txt"), CORPUS).expect("write corpus");
    spvocab()
        .current_dir(workspace.path())
        .args([
            "--quiet",
            "train",
            "corpus.txt",
            "-o",
            "char",
            "--model-type",
            "char",
            "--vocab-size",
            "100",
            "--self-test-sample-size",
            "2",
            "--no-progress",
        ])
        .assert()
        .success();
}

#[test]
fn train_writes_model_and_vocab() {
    let workspace = temp_workspace();
    train_char_model(&workspace);

    assert!(workspace.path().join("char.model").exists());
    let vocab = fs::read_to_string(workspace.path().join("char.vocab")).expect("read vocab");
    let pieces: Vec<&str> = vocab
        .lines()
        .map(|line| line.split('\t').next().unwrap_or_default())
        .collect();
    assert_eq!(&pieces[..4], &["<unk>", "<s>", "</s>", "\u{2581}"]);
    assert!(vocab.lines().all(|line| line.contains('\t')));
}

#[test]
fn encode_emits_pieces_and_ids() {
    let workspace = temp_workspace();
    train_char_model(&workspace);

    let output = spvocab()
        .current_dir(workspace.path())
        .args(["--quiet", "encode", "-m", "char.model", "a pen", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let record: Value = serde_json::from_slice(&output).expect("encode output is JSON");
    let pieces: Vec<&str> = record["pieces"]
        .as_array()
        .expect("pieces array")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(pieces, vec!["\u{2581}", "a", "\u{2581}", "p", "e", "n"]);
    assert_eq!(record["ids"].as_array().map(Vec::len), Some(6));

    spvocab()
        .current_dir(workspace.path())
        .args(["--quiet", "encode", "-m", "char.model", "--ids"])
        .write_stdin("pen\n")
        .assert()
        .success();
}

#[test]
fn info_and_verify_read_the_model() {
    let workspace = temp_workspace();
    train_char_model(&workspace);

    let output = spvocab()
        .current_dir(workspace.path())
        .args(["--quiet", "info", "-m", "char.model", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: Value = serde_json::from_slice(&output).expect("info output is JSON");
    assert_eq!(summary["model_type"], "char");
    assert_eq!(summary["self_test_samples"], 2);
    assert_eq!(summary["meta_pieces"].as_array().map(Vec::len), Some(3));

    spvocab()
        .current_dir(workspace.path())
        .args(["--quiet", "verify", "-m", "char.model"])
        .assert()
        .success();
}

#[test]
fn train_accepts_json_spec() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("words.tsv"), "hello\t5\nworld\t3\nhola\t1\n")
        .expect("write tsv");
    fs::write(
        workspace.path().join("spec.json"),
        r#"{
            "trainer": {
                "model_prefix": "words",
                "inputs": ["words.tsv"],
                "input_format": "tsv",
                "model_type": "word",
                "vocab_size": 5,
                "show_progress": false
            },
            "normalizer": {"rule": "identity"}
        }"#,
    )
    .expect("write spec");

    spvocab()
        .current_dir(workspace.path())
        .args(["--quiet", "train", "--config", "spec.json", "--metrics-json", "metrics.json"])
        .assert()
        .success();

    let vocab = fs::read_to_string(workspace.path().join("words.vocab")).expect("read vocab");
    let pieces: Vec<&str> = vocab
        .lines()
        .map(|line| line.split('\t').next().unwrap_or_default())
        .collect();
    assert_eq!(pieces, vec!["<unk>", "<s>", "</s>", "\u{2581}hello", "\u{2581}world"]);

    let metrics: Value = serde_json::from_str(
        &fs::read_to_string(workspace.path().join("metrics.json")).expect("read metrics"),
    )
    .expect("metrics JSON");
    assert_eq!(metrics["load"]["selected"], 3);
}

#[test]
fn no_shuffle_flag_applies_to_spec_sentence_limit() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("words.tsv"), "hello\t5\nworld\t3\nhola\t1\n")
        .expect("write tsv");
    fs::write(
        workspace.path().join("spec.json"),
        r#"{
            "trainer": {
                "model_prefix": "head",
                "inputs": ["words.tsv"],
                "input_format": "tsv",
                "model_type": "word",
                "vocab_size": 5,
                "input_sentence_size": 2,
                "show_progress": false
            },
            "normalizer": {"rule": "identity"}
        }"#,
    )
    .expect("write spec");

    spvocab()
        .current_dir(workspace.path())
        .args([
            "--quiet",
            "train",
            "--config",
            "spec.json",
            "--no-shuffle",
            "--metrics-json",
            "metrics.json",
        ])
        .assert()
        .success();

    let metrics: Value = serde_json::from_str(
        &fs::read_to_string(workspace.path().join("metrics.json")).expect("read metrics"),
    )
    .expect("metrics JSON");
    assert_eq!(metrics["load"]["candidates"], 2);
    assert_eq!(metrics["load"]["selected"], 2);

    let vocab = fs::read_to_string(workspace.path().join("head.vocab")).expect("read vocab");
    let pieces: Vec<&str> = vocab
        .lines()
        .map(|line| line.split('\t').next().unwrap_or_default())
        .collect();
    assert_eq!(pieces, vec!["<unk>", "<s>", "</s>", "\u{2581}hello", "\u{2581}world"]);
}

#[test]
fn invalid_configuration_fails() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("corpus.txt"), CORPUS).expect("write corpus");
    spvocab()
        .current_dir(workspace.path())
        .args([
            "--quiet",
            "train",
            "corpus.txt",
            "-o",
            "bad",
            "--character-coverage",
            "0.5",
            "--no-progress",
        ])
        .assert()
        .failure();
    assert!(!workspace.path().join("bad.model").exists());
}
