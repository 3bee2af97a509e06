//! End-to-end tests for the `ragrelay` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn ragrelay() -> Command {
    let mut cmd = Command::cargo_bin("ragrelay").unwrap_or_else(|_| unreachable!());
    for var in [
        "GENERATION_BACKEND",
        "EMBEDDING_BACKEND",
        "OPENAI_API_KEY",
        "OPENAI_API_URL",
        "EMBEDDING_MODEL_ID",
        "EMBEDDING_MODEL_SIZE",
        "RAGRELAY_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn documents_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap_or_else(|_| unreachable!());
    assert!(write!(file, r#"[{{"text": "The fee is 500.", "score": 0.9}}]"#).is_ok());
    file
}

#[test]
fn test_help_lists_commands() {
    ragrelay()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("embed"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("sanitize"));
}

#[test]
fn test_sanitize_from_stdin() {
    ragrelay()
        .arg("sanitize")
        .write_stdin("### Content: leaked\nالرسوم 500 ريال.\n#\n")
        .assert()
        .success()
        .stdout("الرسوم 500 ريال.\n");
}

#[test]
fn test_sanitize_json_output() {
    ragrelay()
        .args(["--format", "json", "sanitize", "--language", "en"])
        .write_stdin("see the do#c for details\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"answer\""))
        .stdout(predicate::str::contains("Sorry"));
}

#[test]
fn test_ask_without_api_key_fails() {
    let docs = documents_file();
    ragrelay()
        .arg("ask")
        .arg("What is the fee?")
        .arg("--documents")
        .arg(docs.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn test_ask_with_unsupported_backend_fails() {
    let docs = documents_file();
    ragrelay()
        .env("GENERATION_BACKEND", "cohere")
        .env("OPENAI_API_KEY", "sk-test")
        .arg("ask")
        .arg("What is the fee?")
        .arg("--documents")
        .arg(docs.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported provider"));
}

#[test]
fn test_unknown_backend_is_config_error() {
    ragrelay()
        .env("GENERATION_BACKEND", "bogus")
        .args(["generate", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown provider"));
}

#[test]
fn test_embed_requires_model() {
    ragrelay()
        .env("OPENAI_API_KEY", "sk-test")
        .arg("embed")
        .write_stdin("hello\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("EMBEDDING_MODEL_ID"));
}
