//! Saving and loading client builds.
//!
//! Builds are saved as a JSON array of [`ComponentData`] records. Loading
//! accepts RON, JSON or TOML (a `components` array); the result is a set, so
//! repeated records collapse. Inventory membership is not checked here; that
//! happens when the build is submitted.

use crate::loader::{DataLoadError, deserialize_list};
use crate::schema::{ComponentData, SchemaError};
use carbuild_core::component::Component;
use carbuild_core::serialize::write_atomic;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Key holding the component array in TOML build files.
pub const TOML_KEY: &str = "components";

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Load(#[from] DataLoadError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("build json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("writing build failed: {0}")]
    Io(#[from] std::io::Error),
}

fn records(build: &BTreeSet<Component>) -> Vec<ComponentData> {
    build.iter().map(ComponentData::from).collect()
}

fn components(records: Vec<ComponentData>) -> Result<BTreeSet<Component>, ExchangeError> {
    records
        .iter()
        .map(|r| r.to_component().map_err(ExchangeError::from))
        .collect()
}

/// Render a build as a pretty-printed JSON array.
pub fn to_json(build: &BTreeSet<Component>) -> Result<String, ExchangeError> {
    Ok(serde_json::to_string_pretty(&records(build))?)
}

/// Parse a JSON array of records into a build.
pub fn from_json(json: &str) -> Result<BTreeSet<Component>, ExchangeError> {
    let records: Vec<ComponentData> = serde_json::from_str(json)?;
    components(records)
}

/// Write `build` to `path` as JSON, replacing any existing file atomically.
pub fn save_build(path: &Path, build: &BTreeSet<Component>) -> Result<(), ExchangeError> {
    let json = to_json(build)?;
    write_atomic(path, json.as_bytes())?;
    debug!(path = %path.display(), parts = build.len(), "build saved");
    Ok(())
}

/// Read a build file in any supported format.
pub fn load_build(path: &Path) -> Result<BTreeSet<Component>, ExchangeError> {
    let records: Vec<ComponentData> = deserialize_list(path, TOML_KEY)?;
    let build = components(records)?;
    debug!(path = %path.display(), parts = build.len(), "build loaded");
    Ok(build)
}
