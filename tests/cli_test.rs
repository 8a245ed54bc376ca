use std::fs;
use std::path::Path;

use assert_cmd::prelude::*;
use predicates::str::{contains, is_empty, PredicateStrExt};
use std::process::Command;
use tempfile::TempDir;

fn write_ops(dir: &Path, name: &str, json: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, json).unwrap();
    path.to_string_lossy().into_owned()
}

// `txseq` with no args should exit with a non-zero code.
#[test]
fn cli_no_args() {
    Command::cargo_bin("txseq").unwrap().assert().failure();
}

// `txseq -V` should print the version
#[test]
fn cli_version() {
    Command::cargo_bin("txseq")
        .unwrap()
        .args(&["-V"])
        .assert()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_run_then_get() {
    let temp_dir = TempDir::new().unwrap();
    let ops = write_ops(
        temp_dir.path(),
        "ops.json",
        r#"[
            {"statement": {"set": {"key": "user:1:age", "value": "18"}}, "expect": 1},
            {"statement": {"incr": {"key": "visits", "by": 3}}, "expect": 1}
        ]"#,
    );

    Command::cargo_bin("txseq")
        .unwrap()
        .args(&["run", &ops])
        .current_dir(&temp_dir)
        .assert()
        .success()
        .stdout(contains("committed 2 operation(s)"));

    Command::cargo_bin("txseq")
        .unwrap()
        .args(&["get", "user:1:age"])
        .current_dir(&temp_dir)
        .assert()
        .success()
        .stdout(eq_line("18"));

    Command::cargo_bin("txseq")
        .unwrap()
        .args(&["get", "visits"])
        .current_dir(&temp_dir)
        .assert()
        .success()
        .stdout(eq_line("3"));
}

#[test]
fn cli_failed_sequence_exits_non_zero() {
    let temp_dir = TempDir::new().unwrap();
    let ops = write_ops(
        temp_dir.path(),
        "ops.json",
        r#"[
            {"statement": {"set": {"key": "user:1:age", "value": "18"}}, "expect": 1},
            {"statement": {"update": {"key": "user:2:age", "value": "20"}}, "expect": 1}
        ]"#,
    );

    Command::cargo_bin("txseq")
        .unwrap()
        .args(&["run", &ops])
        .current_dir(&temp_dir)
        .assert()
        .code(1)
        .stdout(is_empty())
        .stderr(contains("effect mismatch on operation #2"));

    Command::cargo_bin("txseq")
        .unwrap()
        .args(&["get", "user:1:age"])
        .current_dir(&temp_dir)
        .assert()
        .success()
        .stdout(eq_line("Key not found"));
}

#[test]
fn cli_memory_engine_forgets() {
    let temp_dir = TempDir::new().unwrap();
    let ops = write_ops(
        temp_dir.path(),
        "ops.json",
        r#"[{"statement": {"insert": {"key": "k", "value": "v"}}, "expect": 1}]"#,
    );
    Command::cargo_bin("txseq")
        .unwrap()
        .args(&["--engine", "memory", "run", &ops])
        .current_dir(&temp_dir)
        .assert()
        .success();
    Command::cargo_bin("txseq")
        .unwrap()
        .args(&["--engine", "memory", "get", "k"])
        .current_dir(&temp_dir)
        .assert()
        .success()
        .stdout(eq_line("Key not found"));
}

#[test]
fn cli_rejects_malformed_operations() {
    let temp_dir = TempDir::new().unwrap();
    let ops = write_ops(temp_dir.path(), "ops.json", "set k v");
    Command::cargo_bin("txseq")
        .unwrap()
        .args(&["run", &ops])
        .current_dir(&temp_dir)
        .assert()
        .failure();
}

#[test]
fn cli_invalid_engine() {
    let temp_dir = TempDir::new().unwrap();
    Command::cargo_bin("txseq")
        .unwrap()
        .args(&["--engine", "postgres", "get", "k"])
        .current_dir(&temp_dir)
        .assert()
        .failure();
}

fn eq_line(line: &str) -> impl predicates::Predicate<str> {
    predicates::str::similar(line.to_owned()).trim()
}
