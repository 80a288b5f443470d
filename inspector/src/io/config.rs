//! Tracker configuration stored as TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::connectivity::DEFAULT_MAX_ANCESTOR_DEPTH;
use crate::core::types::TrackingOptions;

/// Tracker configuration (TOML).
///
/// Missing fields fall back to the defaults, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Which derived events are computed and emitted.
    pub tracking: TrackingOptions,

    /// Parent steps taken by the remote connectivity walk before giving up.
    pub max_ancestor_depth: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingOptions::default(),
            max_ancestor_depth: DEFAULT_MAX_ANCESTOR_DEPTH,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_ancestor_depth == 0 {
            return Err(anyhow!("max_ancestor_depth must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TrackerConfig::default()`.
pub fn load_config(path: &Path) -> Result<TrackerConfig> {
    if !path.exists() {
        let cfg = TrackerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TrackerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Write config to disk via temp file + rename.
pub fn write_config(path: &Path, cfg: &TrackerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, TrackerConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("inspector.toml");
        fs::write(&path, "[tracking]\ndetached = false\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(cfg.tracking.attributes);
        assert!(!cfg.tracking.detached);
        assert_eq!(cfg.max_ancestor_depth, DEFAULT_MAX_ANCESTOR_DEPTH);
    }

    #[test]
    fn zero_depth_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("inspector.toml");
        fs::write(&path, "max_ancestor_depth = 0\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(err.to_string().contains("max_ancestor_depth"));
    }

    #[test]
    fn write_then_load_preserves_settings() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("inspector.toml");
        let cfg = TrackerConfig {
            tracking: TrackingOptions {
                attributes: false,
                detached: true,
            },
            max_ancestor_depth: 32,
        };
        write_config(&path, &cfg).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }
}
