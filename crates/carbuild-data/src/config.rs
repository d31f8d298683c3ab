//! Store configuration files.

use crate::loader::{DataLoadError, deserialize_file};
use carbuild_core::config::StoreConfig;
use std::path::Path;
use tracing::debug;

/// Read a [`StoreConfig`] from a RON, TOML or JSON file. Fields left out of
/// the file take their default values. The result is checked with
/// [`StoreConfig::validate`].
pub fn load_store_config(path: &Path) -> Result<StoreConfig, DataLoadError> {
    let config: StoreConfig = deserialize_file(path)?;
    config
        .validate()
        .map_err(|source| DataLoadError::InvalidConfig {
            file: path.to_path_buf(),
            source,
        })?;
    debug!(
        path = %path.display(),
        interval_ms = config.snapshot_interval_ms,
        failure_threshold = config.failure_threshold,
        "store config loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbuild_core::config::ConfigError;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");
        fs::write(
            &path,
            "catalog_path = \"/data/inventory.bin\"\n\
             relation_path = \"/data/dependency.bin\"\n\
             snapshot_interval_ms = 2500\n\
             failure_threshold = 5\n",
        )
        .unwrap();

        let config = load_store_config(&path).unwrap();
        assert_eq!(config.catalog_path, PathBuf::from("/data/inventory.bin"));
        assert_eq!(config.relation_path, PathBuf::from("/data/dependency.bin"));
        assert_eq!(config.snapshot_interval(), Duration::from_millis(2500));
        assert_eq!(config.failure_threshold, 5);
    }

    #[test]
    fn partial_ron_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.ron");
        fs::write(&path, "(snapshot_interval_ms: 100)").unwrap();

        let config = load_store_config(&path).unwrap();
        assert_eq!(config.snapshot_interval_ms, 100);
        assert_eq!(
            config.failure_threshold,
            StoreConfig::DEFAULT_FAILURE_THRESHOLD
        );
        assert_eq!(config.catalog_path, StoreConfig::default().catalog_path);
    }

    #[test]
    fn empty_json_object_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{}").unwrap();
        assert_eq!(load_store_config(&path).unwrap(), StoreConfig::default());
    }

    #[test]
    fn wrong_type_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{"failure_threshold": "many"}"#).unwrap();
        assert!(matches!(
            load_store_config(&path),
            Err(DataLoadError::Parse { .. })
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");
        fs::write(&path, "snapshot_interval_ms = 0\n").unwrap();
        let err = load_store_config(&path).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::InvalidConfig {
                source: ConfigError::ZeroInterval,
                ..
            }
        ));
        assert!(err.to_string().contains("store.toml"));
    }

    #[test]
    fn shared_table_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(
            &path,
            r#"{"catalog_path": "tables.bin", "relation_path": "tables.bin"}"#,
        )
        .unwrap();
        assert!(matches!(
            load_store_config(&path),
            Err(DataLoadError::InvalidConfig {
                source: ConfigError::SharedPath { .. },
                ..
            })
        ));
    }
}
