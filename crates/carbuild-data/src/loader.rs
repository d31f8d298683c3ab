//! Format detection and deserialization for carbuild data files.
//!
//! Builds and store configuration may be written as RON, JSON or TOML; the
//! format is chosen by file extension.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while reading a data file.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The file parsed but holds settings the store cannot run with.
    #[error("invalid config in {file}: {source}")]
    InvalidConfig {
        file: PathBuf,
        source: carbuild_core::config::ConfigError,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DataLoadError {
    fn parse(path: &Path, detail: impl ToString) -> Self {
        DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: detail.to_string(),
        }
    }
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| DataLoadError::parse(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| DataLoadError::parse(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| DataLoadError::parse(path, e)),
    }
}

/// Deserialize a list from a file. TOML cannot hold a bare array at the top
/// level, so for TOML the array is read from `toml_key`; RON and JSON files
/// hold the list directly.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    match detect_format(path)? {
        Format::Ron | Format::Json => deserialize_file(path),
        Format::Toml => {
            let content = std::fs::read_to_string(path)?;
            let table: toml::Table =
                toml::from_str(&content).map_err(|e| DataLoadError::parse(path, e))?;
            let array = table.get(toml_key).cloned().ok_or_else(|| {
                DataLoadError::parse(path, format!("missing key '{toml_key}' in TOML file"))
            })?;
            array
                .try_into()
                .map_err(|e: toml::de::Error| DataLoadError::parse(path, e))
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
