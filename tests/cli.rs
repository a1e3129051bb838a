//! Tests for the `triseek` command line.

mod common;

use common::{Fixture, brute_force};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

fn run(args: &[&str], dir: &Path) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_triseek"))
        .args(args)
        .args(["--path", dir.to_str().unwrap(), "--no-color"])
        .env("TRISEEK_LOG", "off")
        .output()
        .expect("Failed to run triseek");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_search_output_format() {
    let fixture = Fixture::sample();
    let (stdout, stderr, ok) = run(&["search", "helper"], fixture.path());
    assert!(ok, "stderr: {stderr}");

    let expected = brute_force(&fixture.canonical(), "helper");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), expected.len());
    for (line, m) in lines.iter().zip(&expected) {
        let prefix = format!("{}:{}:{}:", m.path.display(), m.line, m.column);
        assert!(line.starts_with(&prefix), "{line:?} does not start with {prefix:?}");
        assert!(line.contains("helper"));
    }
}

#[test]
fn test_files_with_matches_and_count() {
    let fixture = Fixture::sample();

    let (stdout, _, ok) = run(&["search", "pub fn", "-l"], fixture.path());
    assert!(ok);
    let files: Vec<&str> = stdout.lines().collect();
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|f| f.ends_with("lib.rs")));
    assert!(files.iter().any(|f| f.ends_with("utils.rs")));

    let (stdout, _, ok) = run(&["search", "pub fn", "--count"], fixture.path());
    assert!(ok);
    assert!(stdout.lines().all(|l| l.ends_with(":2")), "{stdout}");
}

#[test]
fn test_json_output() {
    let fixture = Fixture::sample();
    let (stdout, _, ok) = run(&["search", "aaa", "--json"], fixture.path());
    assert!(ok);

    let columns: Vec<u64> = stdout
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["column"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(columns, vec![1, 2, 3, 4]);
}

#[test]
fn test_max_count() {
    let fixture = Fixture::sample();
    let (stdout, _, ok) = run(&["search", "fn ", "-m", "2"], fixture.path());
    assert!(ok);
    assert_eq!(stdout.lines().count(), 2);
}

#[test]
fn test_short_token_fails() {
    let fixture = Fixture::sample();
    let (stdout, stderr, ok) = run(&["search", "ab"], fixture.path());
    assert!(!ok);
    assert!(stdout.is_empty());
    assert!(stderr.contains("shorter than 3"), "{stderr}");
}

#[test]
fn test_index_and_stats() {
    let fixture = Fixture::sample();
    let output = Command::new(env!("CARGO_BIN_EXE_triseek"))
        .args(["stats", fixture.path().to_str().unwrap(), "--no-color"])
        .env("TRISEEK_LOG", "off")
        .output()
        .expect("Failed to run triseek");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("files:    5"), "{stdout}");
}

#[test]
fn test_watch_answers_tokens_from_stdin() {
    let fixture = Fixture::sample();
    let mut child = Command::new(env!("CARGO_BIN_EXE_triseek"))
        .args(["watch", fixture.path().to_str().unwrap(), "--no-color"])
        .env("TRISEEK_LOG", "off")
        .env("TRISEEK_WATCH", "false")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to run triseek");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"multiply\nno\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.contains("lib.rs:5:8:"), "{stdout}");
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid argument"));
}
