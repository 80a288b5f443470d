//! CLI tests for `inspector replay`.
//!
//! Spawns the inspector binary on trace files and verifies printed events and
//! exit codes.

use std::fs;
use std::process::Command;

use inspector::exit_codes;
use inspector::io::trace_store::{Step, Trace};
use inspector::memory::WalkerMode;
use inspector::test_support::{TraceDir, sample_document};

fn trace(mode: WalkerMode, steps: Vec<Step>) -> Trace {
    Trace {
        mode,
        view: true,
        tree: sample_document(),
        steps,
    }
}

fn select(node: &str) -> Step {
    Step::Select {
        node: Some(node.to_string()),
        reason: Some("cli".to_string()),
    }
}

#[test]
fn replay_prints_events_and_reports_disconnection() {
    let dir = TraceDir::new(&trace(
        WalkerMode::Local,
        vec![
            select("a"),
            Step::Remove {
                node: "a".to_string(),
            },
        ],
    ))
    .expect("trace");

    let output = Command::new(env!("CARGO_BIN_EXE_inspector"))
        .arg("replay")
        .arg(&dir.trace_path)
        .output()
        .expect("inspector replay");

    assert_eq!(output.status.code(), Some(exit_codes::DISCONNECTED));
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "before-new-node node=- incoming=a reason=cli",
            "before-new-node-front node=- incoming=a reason=cli",
            "new-node node=- reason=cli",
            "new-node-front node=- reason=cli",
            "detached node=div",
            "detached-front node=div",
        ]
    );
}

#[test]
fn replay_json_with_config_disabling_detachment() {
    let dir = TraceDir::new(&trace(
        WalkerMode::Remote,
        vec![
            select("a"),
            Step::Remove {
                node: "a".to_string(),
            },
        ],
    ))
    .expect("trace");
    let config_path = dir.path().join("inspector.toml");
    fs::write(&config_path, "[tracking]\ndetached = false\n").expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_inspector"))
        .arg("replay")
        .arg(&dir.trace_path)
        .arg("--config")
        .arg(&config_path)
        .arg("--json")
        .output()
        .expect("inspector replay");

    assert_eq!(output.status.code(), Some(exit_codes::DISCONNECTED));
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let kinds: Vec<&str> = outcome["events"]
        .as_array()
        .expect("events")
        .iter()
        .map(|event| event["kind"].as_str().expect("kind"))
        .collect();
    assert_eq!(
        kinds,
        vec![
            "before-new-node",
            "before-new-node-front",
            "new-node",
            "new-node-front",
        ]
    );
    assert_eq!(outcome["selected"], "a");
    assert_eq!(outcome["connected"], false);
}

#[test]
fn replay_rejects_invalid_trace() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("trace.json");
    fs::write(&path, r#"{"steps": []}"#).expect("write");

    let output = Command::new(env!("CARGO_BIN_EXE_inspector"))
        .arg("replay")
        .arg(&path)
        .output()
        .expect("inspector replay");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8(output.stderr).expect("utf8");
    assert!(stderr.contains("trace schema validation failed"));
}

#[test]
fn schema_command_prints_trace_schema() {
    let output = Command::new(env!("CARGO_BIN_EXE_inspector"))
        .arg("schema")
        .output()
        .expect("inspector schema");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(schema["title"], "Selection replay trace v1");
}
