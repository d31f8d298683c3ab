//! Store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A configuration the store refuses to run with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("snapshot interval must be at least 1 ms")]
    ZeroInterval,

    #[error("catalog and relation tables share the path {path}")]
    SharedPath { path: PathBuf },
}

/// Where and how often a [`CompatibilityStore`](crate::store::CompatibilityStore)
/// persists its tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the catalog table (identifier <-> component).
    pub catalog_path: PathBuf,
    /// Path of the relation table (identifier -> compatible identifiers).
    pub relation_path: PathBuf,
    /// Delay between background snapshots, in milliseconds.
    pub snapshot_interval_ms: u64,
    /// Consecutive failed snapshot cycles before the store reports itself
    /// degraded. Zero disables the escalation.
    pub failure_threshold: u32,
}

impl StoreConfig {
    pub const DEFAULT_INTERVAL_MS: u64 = 10_000;
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

    /// Configuration with both tables placed in `dir` under their default names.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            catalog_path: dir.join("inventory.bin"),
            relation_path: dir.join("dependency.bin"),
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }

    /// Reject settings the snapshot worker cannot run with. A zero interval
    /// would rewrite both tables in a tight loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.catalog_path == self.relation_path {
            return Err(ConfigError::SharedPath {
                path: self.catalog_path.clone(),
            });
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("inventory.bin"),
            relation_path: PathBuf::from("dependency.bin"),
            snapshot_interval_ms: Self::DEFAULT_INTERVAL_MS,
            failure_threshold: Self::DEFAULT_FAILURE_THRESHOLD,
        }
    }
}
