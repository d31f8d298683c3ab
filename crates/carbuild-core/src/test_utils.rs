//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::component::{Component, Diameter, Mechanism, Structure};
use crate::config::StoreConfig;
use crate::serialize::{Slot, SnapshotBackend, Table};
use crate::store::{CompatibilityIndex, CompatibilityStore, StoreError};
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

// ===========================================================================
// Store constructors
// ===========================================================================

/// An empty store with default settings that snapshots into memory.
pub fn memory_store() -> CompatibilityStore {
    CompatibilityStore::with_backend(StoreConfig::default(), MemoryBackend::new())
}

/// One component of each primary kind from `manufacturer`.
pub fn primary_set(manufacturer: &str) -> BTreeSet<Component> {
    BTreeSet::from([
        Component::body(&format!("{manufacturer}_body"), Structure::Sedan, manufacturer),
        Component::engine(
            &format!("{manufacturer}_engine"),
            Mechanism::Electric,
            manufacturer,
        ),
        Component::battery(&format!("{manufacturer}_battery"), manufacturer),
        Component::wheels(
            &format!("{manufacturer}_wheels"),
            Diameter::Eighteen,
            manufacturer,
        ),
    ])
}

/// Register `parts` and make every part compatible with every other one.
pub fn register_mutually_compatible(store: &CompatibilityStore, parts: &[Component]) {
    register_mutually_compatible_except(store, parts, &[]);
}

/// Like [`register_mutually_compatible`], leaving out the listed directed
/// edges.
pub fn register_mutually_compatible_except(
    store: &CompatibilityStore,
    parts: &[Component],
    missing: &[(&Component, &Component)],
) {
    for part in parts {
        store
            .register(part.clone(), [])
            .expect("register test component");
    }
    for a in parts {
        for b in parts {
            if a == b || missing.iter().any(|(x, y)| *x == a && *y == b) {
                continue;
            }
            store.extend_compatibility(a, b).expect("extend test edge");
        }
    }
}

// ===========================================================================
// Backends
// ===========================================================================

/// Keeps the latest blob of each table and slot in memory. Clones share
/// storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tables: Arc<Mutex<HashMap<(Slot, Table), Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live copy of `table`.
    pub fn get(&self, table: Table) -> Option<Vec<u8>> {
        self.lock().get(&(Slot::Live, table)).cloned()
    }

    /// The retained previous copy of `table`.
    pub fn get_previous(&self, table: Table) -> Option<Vec<u8>> {
        self.lock().get(&(Slot::Previous, table)).cloned()
    }

    /// Overwrite a live table directly, bypassing the store.
    pub fn put(&self, table: Table, data: Vec<u8>) {
        self.lock().insert((Slot::Live, table), data);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(Slot, Table), Vec<u8>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SnapshotBackend for MemoryBackend {
    fn write(&self, slot: Slot, table: Table, data: &[u8]) -> io::Result<()> {
        self.lock().insert((slot, table), data.to_vec());
        Ok(())
    }

    fn read(&self, slot: Slot, table: Table) -> io::Result<Option<Vec<u8>>> {
        Ok(self.lock().get(&(slot, table)).cloned())
    }
}

/// Fails writes while switched on. Built with [`FailingBackend::new`] it
/// fails every write; with [`FailingBackend::live_table`] only live writes
/// of one table, which leaves a torn pair behind.
#[derive(Debug, Clone)]
pub struct FailingBackend {
    inner: MemoryBackend,
    failing: Arc<AtomicBool>,
    only: Option<Table>,
}

impl FailingBackend {
    /// Starts switched on.
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            failing: Arc::new(AtomicBool::new(true)),
            only: None,
        }
    }

    /// Fails live writes of `table` once switched on. Starts switched off.
    pub fn live_table(inner: MemoryBackend, table: Table) -> Self {
        Self {
            inner,
            failing: Arc::new(AtomicBool::new(false)),
            only: Some(table),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn fails(&self, slot: Slot, table: Table) -> bool {
        if !self.failing.load(Ordering::SeqCst) {
            return false;
        }
        match self.only {
            None => true,
            Some(only) => slot == Slot::Live && table == only,
        }
    }
}

impl SnapshotBackend for FailingBackend {
    fn write(&self, slot: Slot, table: Table, data: &[u8]) -> io::Result<()> {
        if self.fails(slot, table) {
            return Err(io::Error::other("disk full"));
        }
        self.inner.write(slot, table, data)
    }

    fn read(&self, slot: Slot, table: Table) -> io::Result<Option<Vec<u8>>> {
        self.inner.read(slot, table)
    }
}

#[derive(Debug, Default)]
struct Gate {
    writing: bool,
    open: bool,
}

/// Blocks every write until [`GatedBackend::release`] is called, so tests
/// can hold a snapshot mid-flight.
#[derive(Debug, Clone, Default)]
pub struct GatedBackend {
    inner: MemoryBackend,
    gate: Arc<(Mutex<Gate>, Condvar)>,
}

impl GatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    /// Block until some thread is inside `write`.
    pub fn wait_until_writing(&self) {
        let (lock, cvar) = &*self.gate;
        let mut gate = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !gate.writing {
            gate = cvar.wait(gate).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Let blocked and future writes through.
    pub fn release(&self) {
        let (lock, cvar) = &*self.gate;
        lock.lock().unwrap_or_else(PoisonError::into_inner).open = true;
        cvar.notify_all();
    }
}

impl SnapshotBackend for GatedBackend {
    fn write(&self, slot: Slot, table: Table, data: &[u8]) -> io::Result<()> {
        {
            let (lock, cvar) = &*self.gate;
            let mut gate = lock.lock().unwrap_or_else(PoisonError::into_inner);
            gate.writing = true;
            cvar.notify_all();
            while !gate.open {
                gate = cvar.wait(gate).unwrap_or_else(PoisonError::into_inner);
            }
        }
        self.inner.write(slot, table, data)
    }

    fn read(&self, slot: Slot, table: Table) -> io::Result<Option<Vec<u8>>> {
        self.inner.read(slot, table)
    }
}

// ===========================================================================
// Index spy
// ===========================================================================

/// Wraps a store and counts `is_compatible` queries.
pub struct CountingIndex<'a> {
    store: &'a CompatibilityStore,
    checks: AtomicUsize,
}

impl<'a> CountingIndex<'a> {
    pub fn new(store: &'a CompatibilityStore) -> Self {
        Self {
            store,
            checks: AtomicUsize::new(0),
        }
    }

    pub fn compatibility_checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl CompatibilityIndex for CountingIndex<'_> {
    fn contains(&self, component: &Component) -> bool {
        self.store.contains(component)
    }

    fn is_compatible(&self, a: &Component, b: &Component) -> Result<bool, StoreError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.store.is_compatible(a, b)
    }

    fn compatible_with(&self, component: &Component) -> Result<Vec<Component>, StoreError> {
        self.store.compatible_with(component)
    }
}
