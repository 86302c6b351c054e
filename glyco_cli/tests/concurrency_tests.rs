//! Concurrency tests for the glyco CLI.
//!
//! These tests verify that multiple processes can safely:
//! - Append to the entries journal simultaneously (file locking)
//! - Read the journal while it is being written

use assert_cmd::Command;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn cli() -> Command {
    Command::cargo_bin("glyco").expect("Failed to find glyco binary")
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn add_command(data_dir: &PathBuf, glycemia: f64) -> Command {
    let mut cmd = cli();
    cmd.env("XDG_CONFIG_HOME", data_dir.join("config"))
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--today")
        .arg("2026-05-20")
        .arg("add")
        .arg("--time")
        .arg("08:00")
        .arg("--glycemia")
        .arg(glycemia.to_string());
    cmd
}

#[test]
fn test_sequential_appends() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    for i in 0..5 {
        thread::sleep(Duration::from_millis(i * 5));
        add_command(&data_dir, 1.0 + i as f64 / 10.0).assert().success();
    }

    let journal = data_dir.join("users/default/entries.jsonl");
    let contents = std::fs::read_to_string(&journal).expect("Failed to read journal");
    let entry_count = contents.lines().count();
    assert_eq!(entry_count, 5, "Expected 5 entries, got {}", entry_count);
}

#[test]
fn test_parallel_appends_keep_every_line() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                add_command(&data_dir, 1.0 + i as f64 / 100.0).assert().success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let journal = data_dir.join("users/default/entries.jsonl");
    let contents = std::fs::read_to_string(&journal).expect("Failed to read journal");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 8);

    for line in lines {
        let entry: serde_json::Value =
            serde_json::from_str(line).expect("Every line should be a complete entry");
        assert!(entry["glycemia"].is_number());
    }
}

#[test]
fn test_concurrent_reads_and_writes() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    add_command(&data_dir, 1.0).assert().success();

    let writer_dir = data_dir.clone();
    let writer = thread::spawn(move || {
        for i in 0..3 {
            add_command(&writer_dir, 1.1 + i as f64 / 10.0).assert().success();
        }
    });

    let reader_dir = data_dir.clone();
    let reader = thread::spawn(move || {
        for _ in 0..3 {
            cli()
                .env("XDG_CONFIG_HOME", reader_dir.join("config"))
                .arg("--data-dir")
                .arg(&reader_dir)
                .arg("--today")
                .arg("2026-05-20")
                .arg("stats")
                .arg("--json")
                .assert()
                .success();
        }
    });

    writer.join().expect("Writer thread panicked");
    reader.join().expect("Reader thread panicked");

    let journal = data_dir.join("users/default/entries.jsonl");
    let contents = std::fs::read_to_string(&journal).expect("Failed to read journal");
    assert_eq!(contents.lines().count(), 4);
}
