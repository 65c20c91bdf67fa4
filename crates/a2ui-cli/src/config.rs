//! CLI configuration read from `a2ui.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "a2ui.toml";

/// CLI configuration (TOML). Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CliConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,

    pub fs: FsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FsConfig {
    /// Directory the local filesystem probe is confined to.
    pub root: PathBuf,

    /// Upper bound applied to every probe depth.
    pub max_tree_depth: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            max_tree_depth: 8,
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_filter: "warn".to_string(),
            fs: FsConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn validate(&self) -> Result<()> {
        if self.log_filter.trim().is_empty() {
            return Err(anyhow!("log_filter must not be empty"));
        }
        if self.fs.max_tree_depth == 0 {
            return Err(anyhow!("fs.max_tree_depth must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CliConfig::default()`.
pub fn load_config(path: &Path) -> Result<CliConfig> {
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CliConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, CliConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "[fs]\nroot = \"workspace\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.log_filter, "warn");
        assert_eq!(cfg.fs.root, PathBuf::from("workspace"));
        assert_eq!(cfg.fs.max_tree_depth, 8);
    }

    #[test]
    fn rejects_zero_depth_cap() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "log_filter = \"debug\"\n[fs]\nmax_tree_depth = 0\n").expect("write");
        let err = load_config(&path).expect_err("zero depth");
        assert!(format!("{err:#}").contains("max_tree_depth"));
    }

    #[test]
    fn rejects_empty_filter() {
        let cfg = CliConfig {
            log_filter: "  ".to_string(),
            ..CliConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_toml_reports_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "log_filter = [").expect("write");
        let err = load_config(&path).expect_err("parse error");
        assert!(format!("{err:#}").contains("parse"));
    }
}
