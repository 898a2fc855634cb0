// CLI configuration

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings for the `tripledger` binary. Everything has a sensible default;
/// a YAML file and CLI flags can override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory holding both store database files.
    pub data_dir: PathBuf,
    /// Page size used when `--limit` is not given.
    pub default_page_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tripledger");
        Self {
            data_dir,
            default_page_size: 25,
        }
    }
}

impl LedgerConfig {
    /// Load configuration. An explicit path must exist; otherwise the
    /// platform config location is used if present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let Some(default) = Self::default_path() else {
                    return Ok(Self::default());
                };
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        debug!(path = ?path, "loading config file");
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tripledger").join("config.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.default_page_size, 25);
        assert!(config.data_dir.ends_with("tripledger"));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "data_dir: /tmp/ledger\ndefault_page_size: 50\n").unwrap();

        let config = LedgerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ledger"));
        assert_eq!(config.default_page_size, 50);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "data_dir: /tmp/ledger\n").unwrap();

        let config = LedgerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.default_page_size, 25);
    }

    #[test]
    fn test_missing_explicit_file_errors() {
        let temp = TempDir::new().unwrap();
        assert!(LedgerConfig::load(Some(&temp.path().join("nope.yaml"))).is_err());
    }
}
