//! Replay trace load/save helpers with schema validation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::{NodeSpec, WalkerMode};

/// JSON Schema every trace must satisfy.
pub const TRACE_SCHEMA: &str = include_str!("../../../schemas/trace/v1.schema.json");

fn default_view() -> bool {
    true
}

/// A scripted session: an initial tree and the steps applied to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trace {
    #[serde(default)]
    pub mode: WalkerMode,
    /// Whether the document starts with an open view.
    #[serde(default = "default_view")]
    pub view: bool,
    /// Document element, appended under the document node.
    pub tree: NodeSpec,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One replay step. Structural steps queue mutation records; `flush`
/// publishes everything queued so far as one batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Select {
        node: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    SetAttribute {
        node: String,
        name: String,
        value: String,
    },
    Append {
        parent: String,
        node: NodeSpec,
    },
    Move {
        node: String,
        parent: String,
    },
    Remove {
        node: String,
    },
    Invalidate {
        node: String,
    },
    Release {
        node: String,
    },
    Flush,
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::Select { .. } => "select",
            Step::SetAttribute { .. } => "set_attribute",
            Step::Append { .. } => "append",
            Step::Move { .. } => "move",
            Step::Remove { .. } => "remove",
            Step::Invalidate { .. } => "invalidate",
            Step::Release { .. } => "release",
            Step::Flush => "flush",
        }
    }
}

/// Load and validate a trace from disk.
pub fn load_trace(path: &Path) -> Result<Trace> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read trace {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse trace {}", path.display()))?;
    validate_schema(&value)?;
    serde_json::from_value(value).with_context(|| format!("deserialize trace {}", path.display()))
}

/// Write a trace as pretty JSON.
pub fn write_trace(path: &Path, trace: &Trace) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(trace)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write trace {}", path.display()))
}

fn validate_schema(trace: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(TRACE_SCHEMA).context("parse trace schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(trace) {
        let messages = compiled
            .iter_errors(trace)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "trace schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_document;

    #[test]
    fn write_then_load_keeps_steps() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("trace.json");
        let trace = Trace {
            mode: WalkerMode::Remote,
            view: true,
            tree: sample_document(),
            steps: vec![
                Step::Select {
                    node: Some("a".to_string()),
                    reason: Some("test".to_string()),
                },
                Step::Remove {
                    node: "div".to_string(),
                },
                Step::Flush,
            ],
        };
        write_trace(&path, &trace).expect("write");
        assert_eq!(load_trace(&path).expect("load"), trace);
    }

    #[test]
    fn defaults_apply_to_minimal_trace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("trace.json");
        fs::write(
            &path,
            r#"{"tree": {"id": "html", "type": "element"}, "steps": [{"op": "select", "node": null}]}"#,
        )
        .expect("write");
        let trace = load_trace(&path).expect("load");
        assert_eq!(trace.mode, WalkerMode::Local);
        assert!(trace.view);
        assert_eq!(
            trace.steps,
            vec![Step::Select {
                node: None,
                reason: None
            }]
        );
    }

    #[test]
    fn schema_rejects_unknown_ops() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("trace.json");
        fs::write(
            &path,
            r#"{"tree": {"id": "html", "type": "element"}, "steps": [{"op": "explode"}]}"#,
        )
        .expect("write");
        let err = load_trace(&path).expect_err("invalid");
        assert!(format!("{err:#}").contains("trace schema validation failed"));
    }
}
