//! End-to-end runs of the `mxr` binary against a temporary state directory.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};

use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

fn mxr(state_dir: &Path, args: &[&str]) -> Output {
    Command::new(assert_cmd::cargo::cargo_bin!("mxr"))
        .arg("--state-dir")
        .arg(state_dir)
        .args(args)
        .env_remove("MXR_STATE_DIR")
        .env("RUST_LOG", "warn")
        .output()
        .expect("run mxr")
}

fn json_data(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "mxr failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let root: Value = serde_json::from_slice(&output.stdout).expect("json output");
    root["data"].clone()
}

fn envelope(message: Value) -> String {
    json!({ "Type": "Notification", "Message": message.to_string() }).to_string()
}

fn stream_lines() -> String {
    let mut lines = vec![
        envelope(json!({
            "type": "new matrix generated",
            "matrix": { "id": "a", "rows": 2, "columns": 2 }
        })),
        envelope(json!({
            "type": "new matrix generated",
            "matrix": { "id": "b", "rows": 2, "columns": 2 }
        })),
        "not json at all".to_string(),
        envelope(json!({
            "type": "result matrix created",
            "result_matrix_id": "r1",
            "multiplicand_matrix_id": "a",
            "multiplier_matrix_id": "b"
        })),
    ];
    for (row, column, value) in [(0, 0, 19.0), (0, 1, 22.0), (1, 0, 43.0), (1, 1, 50.0)] {
        lines.push(envelope(json!({
            "type": "entry result",
            "result_matrix_id": "r1",
            "row_index": row,
            "column_index": column,
            "value": value
        })));
    }
    lines.join("\n")
}

#[test]
fn help_lists_commands_and_flags() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("mxr"))
        .arg("--help")
        .output()
        .expect("run help");
    assert!(output.status.success(), "--help should succeed");
    let text = String::from_utf8_lossy(&output.stdout);
    for needle in ["consume", "progress", "cells", "--state-dir", "--json"] {
        assert!(
            predicate::str::contains(needle).eval(&text),
            "help output should contain '{needle}'"
        );
    }
}

#[test]
fn request_generate_prints_body() {
    let dir = TempDir::new().unwrap();
    let output = mxr(dir.path(), &["request", "generate", "--rows", "2", "--columns", "3"]);
    assert!(output.status.success());
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body, json!({ "rows": 2, "columns": 3 }));
}

#[test]
fn request_generate_rejects_empty_shape() {
    let dir = TempDir::new().unwrap();
    let output = mxr(dir.path(), &["request", "generate", "--rows", "0", "--columns", "3"]);
    assert!(!output.status.success());
}

#[test]
fn start_consume_progress_round_trip() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state");

    let started = json_data(&mxr(
        &state,
        &["--json", "start", "--multiplicand", "a:2x2", "--multiplier", "b:2x2"],
    ));
    assert_eq!(started["calculation"]["multiplicand_id"], "a");
    assert_eq!(
        started["request"],
        json!({ "multiplicand": { "id": "a" }, "multiplier": { "id": "b" } })
    );

    let again = mxr(
        &state,
        &["start", "--multiplicand", "a:2x2", "--multiplier", "b:2x2"],
    );
    assert!(!again.status.success(), "second start must be refused");

    let input = dir.path().join("stream.txt");
    std::fs::write(&input, stream_lines()).unwrap();
    let consumed = json_data(&mxr(
        &state,
        &["--json", "consume", "--input", input.to_str().unwrap()],
    ));
    assert_eq!(consumed["stats"]["events"], 7);
    assert_eq!(consumed["stats"]["dropped"], 1);
    assert_eq!(consumed["matrices"].as_array().unwrap().len(), 2);
    assert_eq!(consumed["progress"]["received"], 4);

    let progress = json_data(&mxr(&state, &["--json", "progress"]));
    assert_eq!(progress["progress"]["fraction"], 1.0);
    assert_eq!(progress["progress"]["calculation"]["result_matrix_id"], "r1");

    let cells = json_data(&mxr(&state, &["--json", "cells"]));
    assert_eq!(cells["cells"], json!([[19.0, 22.0], [43.0, 50.0]]));

    let reset = json_data(&mxr(&state, &["--json", "reset"]));
    assert_eq!(reset["reset"]["result_matrix_id"], "r1");

    let after = json_data(&mxr(&state, &["--json", "progress"]));
    assert!(after["progress"].is_null());

    // Cells survive a reset and stay reachable by id.
    let kept = json_data(&mxr(
        &state,
        &["--json", "cells", "--result", "r1", "--rows", "2", "--columns", "2"],
    ));
    assert_eq!(kept["received"], 4);
}

#[test]
fn consume_reports_worker_errors() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state");
    let input = dir.path().join("stream.txt");
    let errors = dir.path().join("errors.txt");
    std::fs::write(&input, "").unwrap();
    std::fs::write(
        &errors,
        envelope(json!({ "error": { "code": 500, "message": "worker crashed" } })),
    )
    .unwrap();

    let output = mxr(
        &state,
        &[
            "--json",
            "consume",
            "--input",
            input.to_str().unwrap(),
            "--errors",
            errors.to_str().unwrap(),
        ],
    );
    let root: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert!(output.status.success());
    assert!(root["warnings"].is_array());
    assert_eq!(root["data"]["stats"]["events"], 0);
    assert_eq!(
        root["data"]["errors"],
        json!([{ "code": "500", "message": "worker crashed" }])
    );
}

#[test]
fn writers_are_refused_while_consume_runs() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state");

    let mut consume = Command::new(assert_cmd::cargo::cargo_bin!("mxr"))
        .arg("--state-dir")
        .arg(&state)
        .args(["--json", "consume"])
        .env_remove("MXR_STATE_DIR")
        .env("RUST_LOG", "info")
        .env("NO_COLOR", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn consume");

    // The consumer only starts once the state dir lock is held.
    let stderr = consume.stderr.take().expect("stderr");
    let mut lines = BufReader::new(stderr).lines();
    loop {
        let line = lines
            .next()
            .expect("consume exited before starting")
            .expect("read stderr");
        if line.contains("stream consumer started") {
            break;
        }
    }

    let start = mxr(
        &state,
        &["start", "--multiplicand", "a:1x1", "--multiplier", "b:1x1"],
    );
    assert!(!start.status.success(), "start must not run beside consume");
    assert!(
        predicate::str::contains("in use").eval(&String::from_utf8_lossy(&start.stderr)),
        "stderr: {}",
        String::from_utf8_lossy(&start.stderr)
    );
    let reset = mxr(&state, &["reset"]);
    assert!(!reset.status.success(), "reset must not run beside consume");

    // Readers are not blocked.
    assert!(json_data(&mxr(&state, &["--json", "progress"]))["progress"].is_null());

    let mut stdin = consume.stdin.take().expect("stdin");
    writeln!(
        stdin,
        "{}",
        envelope(json!({
            "type": "new matrix generated",
            "matrix": { "id": "a", "rows": 1, "columns": 1 }
        }))
    )
    .unwrap();
    drop(stdin);
    let consumed = json_data(&consume.wait_with_output().expect("wait consume"));
    assert_eq!(consumed["stats"]["events"], 1);

    // Once consume has exited the state dir is free again.
    let started = json_data(&mxr(
        &state,
        &["--json", "start", "--multiplicand", "a:1x1", "--multiplier", "b:1x1"],
    ));
    assert_eq!(started["calculation"]["total_cells"], 1);
}

#[test]
fn start_with_mismatched_shapes_saves_nothing() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state");

    let refused = mxr(
        &state,
        &["start", "--multiplicand", "a:2x3", "--multiplier", "b:2x2"],
    );
    assert!(!refused.status.success());
    assert!(
        predicate::str::contains("inner dimensions differ")
            .eval(&String::from_utf8_lossy(&refused.stderr))
    );

    let progress = json_data(&mxr(&state, &["--json", "progress"]));
    assert!(progress["progress"].is_null());
    assert!(progress["selection"]["firstMatrix"].is_null());
    assert!(progress["selection"]["secondMatrix"].is_null());
}
