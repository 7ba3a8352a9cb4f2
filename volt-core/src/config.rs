//! User configuration ($VOLTPATH/config.yaml)
//!
//! Every field is optional. A missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Result, VoltError};

/// Top-level config.yaml document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VoltConfig {
    pub transaction: TransactionConfig,
    pub rebuild: RebuildConfig,
}

/// Policy for leftover transaction markers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransactionConfig {
    /// Reclaim a marker older than this whose holder is gone.
    /// Unset means markers are never reclaimed.
    pub stale_after_secs: Option<u64>,
}

impl TransactionConfig {
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RebuildConfig {
    /// Vim runtime directory (default ~/.vim)
    pub vim_dir: Option<PathBuf>,
}

impl VoltConfig {
    /// Load config from a specific path, or defaults if the file is absent
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml_ng::from_str(&content).map_err(|e| VoltError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
