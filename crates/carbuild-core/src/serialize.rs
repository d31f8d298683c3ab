//! Snapshot encoding and durable storage for the compatibility store.
//!
//! The store persists two independent tables, the catalog and the relation.
//! Each table is a bitcode blob prefixed by a [`SnapshotHeader`] carrying a
//! magic number, the format version, the table tag and the snapshot
//! generation. Both tables written by one snapshot share a generation so a
//! reload can tell a matched pair from a mix of two snapshots.
//!
//! Durable writes go through a [`SnapshotBackend`]. The default
//! [`FileBackend`] writes each table to a temporary file next to its target
//! and renames it into place, so a reader never observes a partial table.
//! Backends also keep a [`Slot::Previous`] pair, the last complete snapshot
//! the live tables replaced, for when a snapshot lands only half written.

use crate::component::Component;
use crate::id::ComponentId;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a carbuild store table.
pub const SNAPSHOT_MAGIC: u32 = 0xCA7B_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during serialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur during deserialization.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("expected {expected} table, found {found} table")]
    WrongTable { expected: Table, found: Table },
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Which of the two persisted tables a blob holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    Catalog,
    Relation,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Table::Catalog => f.write_str("catalog"),
            Table::Relation => f.write_str("relation"),
        }
    }
}

/// Header prepended to every persisted table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    pub table: Table,
    /// Snapshot sequence number, shared by both tables of one snapshot.
    pub generation: u64,
}

impl SnapshotHeader {
    /// Create a header for the current format version.
    pub fn new(table: Table, generation: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            table,
            generation,
        }
    }

    /// Validate the header against the table the caller expects.
    pub fn validate(&self, expected: Table) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        if self.table != expected {
            return Err(DeserializeError::WrongTable {
                expected,
                found: self.table,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Persisted catalog: every registered component with its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTable {
    pub header: SnapshotHeader,
    pub entries: Vec<(ComponentId, Component)>,
}

/// Persisted relation: each identifier with the identifiers it is
/// compatible with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTable {
    pub header: SnapshotHeader,
    pub edges: Vec<(ComponentId, Vec<ComponentId>)>,
}

impl CatalogTable {
    pub fn encode(&self) -> Result<Vec<u8>, SerializeError> {
        bitcode::serialize(self).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Decode and validate a catalog blob. Returns an error (not a panic)
    /// on version mismatch or garbage input.
    pub fn decode(data: &[u8]) -> Result<Self, DeserializeError> {
        let table: CatalogTable =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        table.header.validate(Table::Catalog)?;
        Ok(table)
    }
}

impl RelationTable {
    pub fn encode(&self) -> Result<Vec<u8>, SerializeError> {
        bitcode::serialize(self).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Decode and validate a relation blob.
    pub fn decode(data: &[u8]) -> Result<Self, DeserializeError> {
        let table: RelationTable =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        table.header.validate(Table::Relation)?;
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Which copy of a table to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The most recent snapshot.
    Live,
    /// The last complete pair the live tables replaced. Read back only when
    /// the live pair is unusable.
    Previous,
}

/// Durable home for the two tables.
///
/// `write` must replace the stored table atomically: a concurrent or later
/// `read` sees either the previous blob or the new one in full.
pub trait SnapshotBackend: Send + Sync {
    fn write(&self, slot: Slot, table: Table, data: &[u8]) -> io::Result<()>;

    /// Returns `Ok(None)` when nothing has been stored for `table` yet.
    fn read(&self, slot: Slot, table: Table) -> io::Result<Option<Vec<u8>>>;

    /// Write both tables of one slot. Backends that can stage writes should
    /// finish all fallible work before replacing either table.
    fn write_pair(&self, slot: Slot, catalog: &[u8], relation: &[u8]) -> io::Result<()> {
        self.write(slot, Table::Catalog, catalog)?;
        self.write(slot, Table::Relation, relation)
    }
}

/// Stores each table in its own file, replaced by rename. The previous pair
/// sits next to the live files with a `.prev` suffix.
#[derive(Debug, Clone)]
pub struct FileBackend {
    catalog_path: PathBuf,
    relation_path: PathBuf,
    previous_catalog_path: PathBuf,
    previous_relation_path: PathBuf,
}

impl FileBackend {
    pub fn new(catalog_path: impl Into<PathBuf>, relation_path: impl Into<PathBuf>) -> Self {
        let catalog_path = catalog_path.into();
        let relation_path = relation_path.into();
        Self {
            previous_catalog_path: previous_path(&catalog_path),
            previous_relation_path: previous_path(&relation_path),
            catalog_path,
            relation_path,
        }
    }

    pub fn path(&self, slot: Slot, table: Table) -> &Path {
        match (slot, table) {
            (Slot::Live, Table::Catalog) => &self.catalog_path,
            (Slot::Live, Table::Relation) => &self.relation_path,
            (Slot::Previous, Table::Catalog) => &self.previous_catalog_path,
            (Slot::Previous, Table::Relation) => &self.previous_relation_path,
        }
    }
}

fn previous_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".prev");
    path.with_file_name(name)
}

impl SnapshotBackend for FileBackend {
    fn write(&self, slot: Slot, table: Table, data: &[u8]) -> io::Result<()> {
        write_atomic(self.path(slot, table), data)
    }

    fn read(&self, slot: Slot, table: Table) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.path(slot, table)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Stage both tables as synced temp files before renaming either, so
    /// only the two renames can fail between the old and the new pair.
    fn write_pair(&self, slot: Slot, catalog: &[u8], relation: &[u8]) -> io::Result<()> {
        let catalog_target = self.path(slot, Table::Catalog);
        let relation_target = self.path(slot, Table::Relation);
        let staged_catalog = stage(catalog_target, catalog)?;
        let staged_relation = stage(relation_target, relation)?;
        staged_catalog.persist(catalog_target).map_err(|e| e.error)?;
        staged_relation.persist(relation_target).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Write `data` to a synced temp file in the target's directory (same
/// filesystem), ready to be renamed over `target`.
fn stage(target: &Path, data: &[u8]) -> io::Result<NamedTempFile> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

/// Write `data` to a temp file next to `target`, sync it, then rename it
/// over `target`.
pub fn write_atomic(target: &Path, data: &[u8]) -> io::Result<()> {
    stage(target, data)?.persist(target).map_err(|e| e.error)?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
