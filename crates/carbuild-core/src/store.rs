//! The compatibility store: catalog, identifiers, relation and persistence.
//!
//! Components live in a single arena of `Arc<Component>` indexed by
//! [`ComponentId`]; the forward index maps a component back to its slot, so
//! the two directions are mutual inverses over one allocation per part.
//!
//! The relation is directed. `a` is compatible with `b` iff `b`'s id is in
//! `a`'s compatibility set; [`CompatibilityStore::is_compatible`] checks only
//! that direction. Callers that need symmetry check both orders.
//!
//! All state sits behind one `RwLock`. Snapshots copy both tables under a
//! read lock and do their I/O after releasing it, so registrations never
//! wait on disk and a snapshot never sees a half-applied mutation. Snapshot
//! and reload are additionally serialized by a persistence mutex.
//!
//! Before overwriting a complete live pair, a snapshot copies it into the
//! backend's previous slot. Reload falls back to that pair when the live
//! tables are missing, mixed or undecodable. Generations are consumed by
//! every snapshot attempt, so a half-written attempt never shares a
//! generation with a later one.

use crate::component::Component;
use crate::config::{ConfigError, StoreConfig};
use crate::id::ComponentId;
use crate::persistence::{HealthTracker, PersistenceHealth, SnapshotWorker};
use crate::serialize::{
    CatalogTable, FileBackend, RelationTable, SerializeError, Slot, SnapshotBackend,
    SnapshotHeader, Table,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// What a failed lookup was looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Component(Component),
    Id(ComponentId),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Component(c) => write!(f, "component {c}"),
            Missing::Id(id) => write!(f, "component id {id}"),
        }
    }
}

/// Errors returned by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An equal component is already registered. Use
    /// [`CompatibilityStore::extend_compatibility`] to add edges instead.
    #[error("component already registered: {0}")]
    AlreadyExists(Component),

    #[error("{0} is not registered")]
    NotFound(Missing),

    /// Every identifier has been handed out.
    #[error("store is full: no identifier left for slot {slot}")]
    CapacityExceeded { slot: usize },

    /// The durable snapshot could not be read back into a consistent state.
    #[error("corrupt snapshot state: {0}")]
    CorruptState(String),

    #[error("invalid store config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Encode(#[from] SerializeError),

    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    fn missing_component(component: &Component) -> Self {
        StoreError::NotFound(Missing::Component(component.clone()))
    }
}

/// Identifier for arena slot `slot`, if it fits in a [`ComponentId`].
fn id_for_slot(slot: usize) -> Result<ComponentId, StoreError> {
    u32::try_from(slot)
        .map(ComponentId)
        .map_err(|_| StoreError::CapacityExceeded { slot })
}

// ---------------------------------------------------------------------------
// Lookup seam used by the validator and the suggestion engine
// ---------------------------------------------------------------------------

/// Read-only view of the compatibility relation.
pub trait CompatibilityIndex: Sync {
    /// Whether `component` is registered.
    fn contains(&self, component: &Component) -> bool;

    /// Whether `a` lists `b` as compatible (the `a -> b` direction only).
    fn is_compatible(&self, a: &Component, b: &Component) -> Result<bool, StoreError>;

    /// Every component `component` lists as compatible, resolved. Empty when
    /// the component has no relation entry.
    fn compatible_with(&self, component: &Component) -> Result<Vec<Component>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub(crate) struct Catalog {
    arena: Vec<Arc<Component>>,
    index: HashMap<Arc<Component>, ComponentId>,
    relation: HashMap<ComponentId, BTreeSet<ComponentId>>,
}

impl Catalog {
    fn id_of(&self, component: &Component) -> Option<ComponentId> {
        self.index.get(component).copied()
    }

    fn get(&self, id: ComponentId) -> Option<&Arc<Component>> {
        self.arena.get(id.index())
    }

    fn require(&self, component: &Component) -> Result<ComponentId, StoreError> {
        self.id_of(component)
            .ok_or_else(|| StoreError::missing_component(component))
    }

    fn next_id(&self) -> Result<ComponentId, StoreError> {
        id_for_slot(self.arena.len())
    }

    /// Every component with its identifier, in id order. Insertion keeps the
    /// arena within `u32` range, so the zipped counter never runs out.
    fn entries(&self) -> impl Iterator<Item = (ComponentId, &Arc<Component>)> {
        (0u32..).map(ComponentId).zip(self.arena.iter())
    }

    fn insert(
        &mut self,
        component: Component,
        compatible: BTreeSet<ComponentId>,
    ) -> Result<ComponentId, StoreError> {
        let id = self.next_id()?;
        let component = Arc::new(component);
        self.arena.push(Arc::clone(&component));
        self.index.insert(component, id);
        self.relation.insert(id, compatible);
        Ok(id)
    }

    fn is_compatible(&self, a: &Component, b: &Component) -> Result<bool, StoreError> {
        let from = self.require(a)?;
        let to = self.require(b)?;
        Ok(self
            .relation
            .get(&from)
            .is_some_and(|set| set.contains(&to)))
    }

    fn compatible_with(&self, component: &Component) -> Result<Vec<Component>, StoreError> {
        let id = self.require(component)?;
        let Some(set) = self.relation.get(&id) else {
            return Ok(Vec::new());
        };
        set.iter()
            .map(|member| {
                self.get(*member)
                    .map(|c| Component::clone(c))
                    .ok_or(StoreError::NotFound(Missing::Id(*member)))
            })
            .collect()
    }

    fn catalog_table(&self, generation: u64) -> CatalogTable {
        CatalogTable {
            header: SnapshotHeader::new(Table::Catalog, generation),
            entries: self
                .entries()
                .map(|(id, c)| (id, Component::clone(c)))
                .collect(),
        }
    }

    fn relation_table(&self, generation: u64) -> RelationTable {
        let mut edges: Vec<(ComponentId, Vec<ComponentId>)> = self
            .relation
            .iter()
            .map(|(id, set)| (*id, set.iter().copied().collect()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        RelationTable {
            header: SnapshotHeader::new(Table::Relation, generation),
            edges,
        }
    }

    /// Rebuild a catalog from persisted tables, rejecting anything that would
    /// break the id/arena invariants.
    fn from_tables(
        mut entries: Vec<(ComponentId, Component)>,
        edges: Vec<(ComponentId, Vec<ComponentId>)>,
    ) -> Result<Self, StoreError> {
        entries.sort_by_key(|(id, _)| *id);

        let mut catalog = Catalog::default();
        for (expected, (id, component)) in entries.into_iter().enumerate() {
            if id.index() != expected {
                return Err(StoreError::CorruptState(format!(
                    "catalog identifiers are not dense: expected #{expected}, found {id}"
                )));
            }
            if catalog.index.contains_key(&component) {
                return Err(StoreError::CorruptState(format!(
                    "component {component} appears under two identifiers"
                )));
            }
            let component = Arc::new(component);
            catalog.arena.push(Arc::clone(&component));
            catalog.index.insert(component, id);
        }

        let known = catalog.arena.len();
        for (id, members) in edges {
            if id.index() >= known {
                return Err(StoreError::CorruptState(format!(
                    "relation entry for unknown identifier {id}"
                )));
            }
            if let Some(dangling) = members.iter().find(|m| m.index() >= known) {
                return Err(StoreError::CorruptState(format!(
                    "relation entry {id} references unknown identifier {dangling}"
                )));
            }
            if catalog
                .relation
                .insert(id, members.into_iter().collect())
                .is_some()
            {
                return Err(StoreError::CorruptState(format!(
                    "relation lists identifier {id} twice"
                )));
            }
        }

        Ok(catalog)
    }
}

// ---------------------------------------------------------------------------
// Shared state (reachable from the snapshot worker)
// ---------------------------------------------------------------------------

pub(crate) struct StoreShared {
    state: RwLock<Catalog>,
    /// Highest generation written, attempted or reloaded. Held for the whole
    /// of a snapshot or reload.
    persist: Mutex<u64>,
    backend: Box<dyn SnapshotBackend>,
    pub(crate) health: HealthTracker,
    pub(crate) config: StoreConfig,
}

/// A decoded, consistent pair of tables.
struct LoadedPair {
    catalog: Catalog,
    generation: u64,
}

impl StoreShared {
    fn read(&self) -> RwLockReadGuard<'_, Catalog> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist_lock(&self) -> MutexGuard<'_, u64> {
        self.persist.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> Result<u64, StoreError> {
        let mut last = self.persist_lock();
        let generation = *last + 1;
        *last = generation;

        let (catalog, relation) = {
            let state = self.read();
            (
                state.catalog_table(generation),
                state.relation_table(generation),
            )
        };
        let catalog_bytes = catalog.encode()?;
        let relation_bytes = relation.encode()?;

        self.retain_previous()?;
        self.backend
            .write_pair(Slot::Live, &catalog_bytes, &relation_bytes)?;

        info!(
            generation,
            components = catalog.entries.len(),
            "store snapshot written"
        );
        Ok(generation)
    }

    /// Copy the live pair into the previous slot if it is complete. A mixed
    /// live pair is left alone so the previous slot keeps the last good one.
    fn retain_previous(&self) -> Result<(), StoreError> {
        let catalog = self.backend.read(Slot::Live, Table::Catalog)?;
        let relation = self.backend.read(Slot::Live, Table::Relation)?;
        let (Some(catalog), Some(relation)) = (catalog, relation) else {
            return Ok(());
        };

        match (CatalogTable::decode(&catalog), RelationTable::decode(&relation)) {
            (Ok(c), Ok(r)) if c.header.generation == r.header.generation => {
                self.backend.write_pair(Slot::Previous, &catalog, &relation)?;
            }
            _ => debug!("live snapshot incomplete, keeping previous pair"),
        }
        Ok(())
    }

    fn reload(&self) -> Result<(), StoreError> {
        let mut last = self.persist_lock();
        let mut seen = 0;

        let loaded = match self.load_pair(Slot::Live, &mut seen) {
            Ok(pair) => pair,
            Err(live_err) => match self.load_pair(Slot::Previous, &mut seen) {
                Ok(pair) => {
                    warn!(
                        error = %live_err,
                        generation = pair.generation,
                        "latest snapshot unusable, reloading the previous one"
                    );
                    pair
                }
                Err(_) => return Err(live_err),
            },
        };

        let components = loaded.catalog.arena.len();
        *self.write() = loaded.catalog;
        *last = (*last).max(seen).max(loaded.generation);

        info!(
            generation = loaded.generation,
            components, "store reloaded from snapshot"
        );
        Ok(())
    }

    /// Read and check one slot. `seen` is raised to every generation found
    /// in a decodable header, usable pair or not.
    fn load_pair(&self, slot: Slot, seen: &mut u64) -> Result<LoadedPair, StoreError> {
        let catalog = self.read_table(slot, Table::Catalog)?;
        let relation = self.read_table(slot, Table::Relation)?;
        let catalog = CatalogTable::decode(&catalog)
            .map_err(|e| StoreError::CorruptState(format!("catalog table: {e}")));
        let relation = RelationTable::decode(&relation)
            .map_err(|e| StoreError::CorruptState(format!("relation table: {e}")));
        for generation in [
            catalog.as_ref().map(|t| t.header.generation),
            relation.as_ref().map(|t| t.header.generation),
        ]
        .into_iter()
        .flatten()
        {
            *seen = (*seen).max(generation);
        }
        let (catalog, relation) = (catalog?, relation?);

        if catalog.header.generation != relation.header.generation {
            return Err(StoreError::CorruptState(format!(
                "catalog generation {} does not match relation generation {}",
                catalog.header.generation, relation.header.generation
            )));
        }

        Ok(LoadedPair {
            generation: catalog.header.generation,
            catalog: Catalog::from_tables(catalog.entries, relation.edges)?,
        })
    }

    fn read_table(&self, slot: Slot, table: Table) -> Result<Vec<u8>, StoreError> {
        self.backend
            .read(slot, table)
            .map_err(|e| StoreError::CorruptState(format!("{table} table unreadable: {e}")))?
            .ok_or_else(|| StoreError::CorruptState(format!("no {table} table has been written")))
    }
}

// ---------------------------------------------------------------------------
// CompatibilityStore
// ---------------------------------------------------------------------------

/// Registry of components and the directed compatibility relation between
/// them, with periodic background snapshots.
///
/// Dropping the store deactivates the snapshot worker and waits for any
/// in-flight snapshot to finish.
pub struct CompatibilityStore {
    shared: Arc<StoreShared>,
    worker: Mutex<Option<SnapshotWorker>>,
}

impl CompatibilityStore {
    /// Create an empty store persisting to the files named in `config`.
    pub fn new(config: StoreConfig) -> Self {
        let backend = FileBackend::new(config.catalog_path.clone(), config.relation_path.clone());
        Self::with_backend(config, backend)
    }

    /// Create an empty store persisting through a custom backend. The paths
    /// in `config` are ignored; the interval and failure threshold apply.
    pub fn with_backend(config: StoreConfig, backend: impl SnapshotBackend + 'static) -> Self {
        Self {
            shared: Arc::new(StoreShared {
                state: RwLock::new(Catalog::default()),
                persist: Mutex::new(0),
                backend: Box::new(backend),
                health: HealthTracker::default(),
                config,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    // -- Registration API --

    /// Register a new component together with the components it is
    /// compatible with.
    ///
    /// `compatible_with` may name the component itself; every other member
    /// must already be registered. Nothing is stored on error.
    pub fn register(
        &self,
        component: Component,
        compatible_with: impl IntoIterator<Item = Component>,
    ) -> Result<ComponentId, StoreError> {
        let mut state = self.shared.write();
        if state.index.contains_key(&component) {
            return Err(StoreError::AlreadyExists(component));
        }

        let own_id = state.next_id()?;
        let mut compatible = BTreeSet::new();
        for other in compatible_with {
            let id = if other == component {
                own_id
            } else {
                state.require(&other)?
            };
            compatible.insert(id);
        }

        let id = state.insert(component, compatible)?;
        debug!(%id, "registered component");
        Ok(id)
    }

    /// Register a new component whose compatibility set is given as
    /// identifiers. `own` ids are not accepted since the new id does not
    /// exist yet; every id must resolve.
    pub fn register_with_ids(
        &self,
        component: Component,
        compatible_with: impl IntoIterator<Item = ComponentId>,
    ) -> Result<ComponentId, StoreError> {
        let mut state = self.shared.write();
        if state.index.contains_key(&component) {
            return Err(StoreError::AlreadyExists(component));
        }

        let mut compatible = BTreeSet::new();
        for id in compatible_with {
            if state.get(id).is_none() {
                return Err(StoreError::NotFound(Missing::Id(id)));
            }
            compatible.insert(id);
        }

        let id = state.insert(component, compatible)?;
        debug!(%id, "registered component");
        Ok(id)
    }

    /// Record that `component` is compatible with `other` (one direction).
    /// Adding an existing edge is a no-op.
    pub fn extend_compatibility(
        &self,
        component: &Component,
        other: &Component,
    ) -> Result<(), StoreError> {
        let mut state = self.shared.write();
        let from = state.require(component)?;
        let to = state.require(other)?;
        if state.relation.entry(from).or_default().insert(to) {
            debug!(%from, %to, "compatibility edge added");
        }
        Ok(())
    }

    // -- Query API --

    /// Whether `a` lists `b` as compatible. Only the `a -> b` direction is
    /// consulted.
    pub fn is_compatible(&self, a: &Component, b: &Component) -> Result<bool, StoreError> {
        self.shared.read().is_compatible(a, b)
    }

    pub fn resolve(&self, id: ComponentId) -> Result<Component, StoreError> {
        self.shared
            .read()
            .get(id)
            .map(|c| Component::clone(c))
            .ok_or(StoreError::NotFound(Missing::Id(id)))
    }

    pub fn identifier_of(&self, component: &Component) -> Result<ComponentId, StoreError> {
        self.shared.read().require(component)
    }

    pub fn contains(&self, component: &Component) -> bool {
        self.shared.read().index.contains_key(component)
    }

    /// Resolved compatibility set of `component`.
    pub fn compatible_with(&self, component: &Component) -> Result<Vec<Component>, StoreError> {
        self.shared.read().compatible_with(component)
    }

    /// Every registered component with its identifier, in id order.
    pub fn components(&self) -> Vec<(ComponentId, Component)> {
        self.shared
            .read()
            .entries()
            .map(|(id, c)| (id, Component::clone(c)))
            .collect()
    }

    /// A copy of the relation table.
    pub fn relation(&self) -> BTreeMap<ComponentId, BTreeSet<ComponentId>> {
        self.shared
            .read()
            .relation
            .iter()
            .map(|(id, set)| (*id, set.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shared.read().arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pin the current state for a series of queries. Registrations and
    /// reloads wait until the view is dropped, so keep it short-lived.
    pub fn view(&self) -> StoreView<'_> {
        StoreView {
            catalog: self.shared.read(),
        }
    }

    // -- Persistence API --

    /// Durably write both tables. Returns the generation written.
    pub fn snapshot(&self) -> Result<u64, StoreError> {
        self.shared.snapshot()
    }

    /// Replace the in-memory tables with the last complete durable snapshot.
    /// On error the in-memory state is left untouched.
    pub fn reload(&self) -> Result<(), StoreError> {
        self.shared.reload()
    }

    /// Start the background snapshot worker. A no-op if already running.
    pub fn activate(&self) -> Result<(), StoreError> {
        self.shared.config.validate()?;
        let mut worker = self.worker_lock();
        if worker.is_none() {
            *worker = Some(SnapshotWorker::spawn(Arc::clone(&self.shared))?);
        }
        Ok(())
    }

    /// Stop the background worker, blocking until an in-flight snapshot
    /// completes. A no-op if not running.
    pub fn deactivate(&self) {
        let worker = self.worker_lock().take();
        if let Some(worker) = worker {
            worker.stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.worker_lock().is_some()
    }

    /// Health of the background snapshot cycle.
    pub fn persistence_health(&self) -> PersistenceHealth {
        self.shared.health.report()
    }

    fn worker_lock(&self) -> MutexGuard<'_, Option<SnapshotWorker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CompatibilityStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl Drop for CompatibilityStore {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl fmt::Debug for CompatibilityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompatibilityStore")
            .field("components", &self.len())
            .field("active", &self.is_active())
            .finish()
    }
}

impl CompatibilityIndex for CompatibilityStore {
    fn contains(&self, component: &Component) -> bool {
        CompatibilityStore::contains(self, component)
    }

    fn is_compatible(&self, a: &Component, b: &Component) -> Result<bool, StoreError> {
        CompatibilityStore::is_compatible(self, a, b)
    }

    fn compatible_with(&self, component: &Component) -> Result<Vec<Component>, StoreError> {
        CompatibilityStore::compatible_with(self, component)
    }
}

// ---------------------------------------------------------------------------
// StoreView
// ---------------------------------------------------------------------------

/// Read guard over the store; every query sees the same state.
pub struct StoreView<'a> {
    catalog: RwLockReadGuard<'a, Catalog>,
}

impl CompatibilityIndex for StoreView<'_> {
    fn contains(&self, component: &Component) -> bool {
        self.catalog.index.contains_key(component)
    }

    fn is_compatible(&self, a: &Component, b: &Component) -> Result<bool, StoreError> {
        self.catalog.is_compatible(a, b)
    }

    fn compatible_with(&self, component: &Component) -> Result<Vec<Component>, StoreError> {
        self.catalog.compatible_with(component)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Diameter, Mechanism, Structure};
    use crate::test_utils::{FailingBackend, MemoryBackend, memory_store};
    use std::time::Duration;

    fn body() -> Component {
        Component::body("Maruti_alto", Structure::Mini, "Maruti")
    }

    fn engine() -> Component {
        Component::engine("Maruti_engine_small", Mechanism::Gas, "Maruti")
    }

    fn wheels() -> Component {
        Component::wheels("Maruti_wheels_small", Diameter::Sixteen, "Maruti")
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    #[test]
    fn register_assigns_sequential_ids() {
        let store = memory_store();
        let a = store.register(body(), []).unwrap();
        let b = store.register(engine(), []).unwrap();
        assert_eq!(a, ComponentId(0));
        assert_eq!(b, ComponentId(1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let store = memory_store();
        store.register(body(), []).unwrap();
        let err = store.register(body(), []).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(ref c) if *c == body()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn manufacturer_only_difference_gets_distinct_ids() {
        let store = memory_store();
        let maruti = store.register(Component::battery("cell", "Maruti"), []).unwrap();
        let tesla = store.register(Component::battery("cell", "Tesla"), []).unwrap();
        assert_ne!(maruti, tesla);
    }

    #[test]
    fn register_translates_compatibility_set() {
        let store = memory_store();
        let e = store.register(engine(), []).unwrap();
        let b = store.register(body(), [engine(), body()]).unwrap();
        let relation = store.relation();
        assert_eq!(relation[&b], BTreeSet::from([e, b]));
        assert!(store.is_compatible(&body(), &engine()).unwrap());
        assert!(store.is_compatible(&body(), &body()).unwrap());
    }

    #[test]
    fn register_with_unknown_member_stores_nothing() {
        let store = memory_store();
        let err = store.register(body(), [engine()]).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(Missing::Component(_))));
        assert!(store.is_empty());
        assert!(!store.contains(&body()));
    }

    #[test]
    fn register_with_ids_checks_ids() {
        let store = memory_store();
        let e = store.register(engine(), []).unwrap();
        let b = store.register_with_ids(body(), [e]).unwrap();
        assert!(store.is_compatible(&body(), &engine()).unwrap());

        let err = store
            .register_with_ids(wheels(), [ComponentId(99)])
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(Missing::Id(ComponentId(99)))));
        assert_eq!(store.identifier_of(&body()).unwrap(), b);
    }

    // -----------------------------------------------------------------------
    // Relation
    // -----------------------------------------------------------------------

    #[test]
    fn relation_is_directed() {
        let store = memory_store();
        store.register(engine(), []).unwrap();
        store.register(body(), [engine()]).unwrap();
        assert!(store.is_compatible(&body(), &engine()).unwrap());
        assert!(!store.is_compatible(&engine(), &body()).unwrap());
    }

    #[test]
    fn extend_compatibility_is_idempotent() {
        let store = memory_store();
        store.register(body(), []).unwrap();
        store.register(engine(), []).unwrap();
        store.extend_compatibility(&engine(), &body()).unwrap();
        store.extend_compatibility(&engine(), &body()).unwrap();
        assert!(store.is_compatible(&engine(), &body()).unwrap());
        let e = store.identifier_of(&engine()).unwrap();
        assert_eq!(store.relation()[&e].len(), 1);
    }

    #[test]
    fn extend_compatibility_requires_both_registered() {
        let store = memory_store();
        store.register(body(), []).unwrap();
        assert!(matches!(
            store.extend_compatibility(&body(), &engine()),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.extend_compatibility(&engine(), &body()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn is_compatible_requires_both_registered() {
        let store = memory_store();
        store.register(body(), []).unwrap();
        assert!(store.is_compatible(&body(), &engine()).is_err());
        assert!(store.is_compatible(&engine(), &body()).is_err());
    }

    #[test]
    fn is_compatible_is_stable() {
        let store = memory_store();
        store.register(engine(), []).unwrap();
        store.register(body(), [engine()]).unwrap();
        let first = store.is_compatible(&body(), &engine()).unwrap();
        for _ in 0..10 {
            assert_eq!(store.is_compatible(&body(), &engine()).unwrap(), first);
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_and_identifier_are_inverses() {
        let store = memory_store();
        for c in [body(), engine(), wheels()] {
            store.register(c, []).unwrap();
        }
        for (id, component) in store.components() {
            assert_eq!(store.resolve(id).unwrap(), component);
            assert_eq!(store.identifier_of(&component).unwrap(), id);
        }
        assert!(matches!(
            store.resolve(ComponentId(3)),
            Err(StoreError::NotFound(Missing::Id(ComponentId(3))))
        ));
        assert!(store.identifier_of(&Component::battery("x", "y")).is_err());
    }

    #[test]
    fn compatible_with_resolves_members() {
        let store = memory_store();
        store.register(engine(), []).unwrap();
        store.register(wheels(), []).unwrap();
        store.register(body(), [engine(), wheels()]).unwrap();

        let mut found = store.compatible_with(&body()).unwrap();
        found.sort();
        assert_eq!(found, vec![engine(), wheels()]);
        assert!(store.compatible_with(&engine()).unwrap().is_empty());
        assert!(store.compatible_with(&Component::battery("x", "y")).is_err());
    }

    // -----------------------------------------------------------------------
    // Snapshot / reload
    // -----------------------------------------------------------------------

    #[test]
    fn snapshot_then_reload_on_fresh_store() {
        let backend = MemoryBackend::new();
        let store = CompatibilityStore::with_backend(StoreConfig::default(), backend.clone());
        store.register(engine(), []).unwrap();
        store.register(body(), [engine()]).unwrap();
        store.register(wheels(), [body(), engine()]).unwrap();
        assert_eq!(store.snapshot().unwrap(), 1);

        let fresh = CompatibilityStore::with_backend(StoreConfig::default(), backend);
        fresh.reload().unwrap();
        assert_eq!(fresh.components(), store.components());
        assert_eq!(fresh.relation(), store.relation());
    }

    #[test]
    fn generations_increase() {
        let store = memory_store();
        assert_eq!(store.snapshot().unwrap(), 1);
        assert_eq!(store.snapshot().unwrap(), 2);
        store.reload().unwrap();
        assert_eq!(store.snapshot().unwrap(), 3);
    }

    #[test]
    fn reload_without_snapshot_is_corrupt_state() {
        let store = memory_store();
        assert!(matches!(store.reload(), Err(StoreError::CorruptState(_))));
    }

    #[test]
    fn reload_rejects_mixed_generations() {
        let backend = MemoryBackend::new();
        let catalog = CatalogTable {
            header: SnapshotHeader::new(Table::Catalog, 2),
            entries: vec![(ComponentId(0), body())],
        };
        let relation = RelationTable {
            header: SnapshotHeader::new(Table::Relation, 1),
            edges: vec![],
        };
        backend.put(Table::Catalog, catalog.encode().unwrap());
        backend.put(Table::Relation, relation.encode().unwrap());

        let store = CompatibilityStore::with_backend(StoreConfig::default(), backend);
        let err = store.reload().unwrap_err();
        assert!(matches!(err, StoreError::CorruptState(ref msg) if msg.contains("generation")));
        assert!(store.is_empty());
    }

    #[test]
    fn mixed_live_pair_falls_back_to_previous() {
        let backend = MemoryBackend::new();
        let store = CompatibilityStore::with_backend(StoreConfig::default(), backend.clone());
        store.register(body(), []).unwrap();
        store.snapshot().unwrap();
        let stale_relation = backend.get(Table::Relation).unwrap();
        store.register(engine(), [body()]).unwrap();
        store.snapshot().unwrap();
        backend.put(Table::Relation, stale_relation);

        let fresh = CompatibilityStore::with_backend(StoreConfig::default(), backend);
        fresh.reload().unwrap();
        assert_eq!(fresh.components(), vec![(ComponentId(0), body())]);
        // Generation 2 was seen on disk, so it is never handed out again.
        assert_eq!(fresh.snapshot().unwrap(), 3);
    }

    #[test]
    fn failed_relation_write_keeps_a_loadable_pair() {
        let memory = MemoryBackend::new();
        let backend = FailingBackend::live_table(memory.clone(), Table::Relation);
        let store = CompatibilityStore::with_backend(StoreConfig::default(), backend.clone());
        store.register(engine(), []).unwrap();
        store.register(body(), [engine()]).unwrap();
        assert_eq!(store.snapshot().unwrap(), 1);
        let saved_components = store.components();
        let saved_relation = store.relation();

        store.register(wheels(), [body()]).unwrap();
        backend.set_failing(true);
        assert!(matches!(store.snapshot(), Err(StoreError::Io(_))));
        assert!(memory.get_previous(Table::Catalog).is_some());

        let fresh = CompatibilityStore::with_backend(StoreConfig::default(), memory.clone());
        fresh.reload().unwrap();
        assert_eq!(fresh.components(), saved_components);
        assert_eq!(fresh.relation(), saved_relation);

        // The failed attempt used up generation 2.
        backend.set_failing(false);
        assert_eq!(store.snapshot().unwrap(), 3);
        let fresh = CompatibilityStore::with_backend(StoreConfig::default(), memory);
        fresh.reload().unwrap();
        assert_eq!(fresh.components(), store.components());
        assert_eq!(fresh.relation(), store.relation());
    }

    #[test]
    fn failed_previous_copy_leaves_live_pair_alone() {
        let memory = MemoryBackend::new();
        let backend = FailingBackend::new(memory.clone());
        backend.set_failing(false);
        let store = CompatibilityStore::with_backend(StoreConfig::default(), backend.clone());
        store.register(body(), []).unwrap();
        store.snapshot().unwrap();
        let live = memory.get(Table::Catalog);

        store.register(engine(), []).unwrap();
        backend.set_failing(true);
        assert!(store.snapshot().is_err());
        assert_eq!(memory.get(Table::Catalog), live);
        assert_eq!(memory.get_previous(Table::Catalog), None);
    }

    #[test]
    fn catalogs_of_any_size_survive_snapshot_and_reload() {
        let parts = [
            body(),
            engine(),
            wheels(),
            Component::battery("Maruti_battery_small", "Maruti"),
            Component::accessory("Maruti_radio", "Radio", "Maruti"),
        ];
        for size in [0, 1, 5] {
            let backend = MemoryBackend::new();
            let store = CompatibilityStore::with_backend(StoreConfig::default(), backend.clone());
            for (i, part) in parts.iter().take(size).enumerate() {
                store
                    .register(part.clone(), parts[..i].iter().cloned())
                    .unwrap();
            }
            store.snapshot().unwrap();

            let fresh = CompatibilityStore::with_backend(StoreConfig::default(), backend);
            fresh.reload().unwrap();
            assert_eq!(fresh.len(), size, "size {size}");
            assert_eq!(fresh.components(), store.components(), "size {size}");
            assert_eq!(fresh.relation(), store.relation(), "size {size}");
        }
    }

    #[test]
    fn reload_rejects_dangling_reference() {
        let backend = MemoryBackend::new();
        let catalog = CatalogTable {
            header: SnapshotHeader::new(Table::Catalog, 1),
            entries: vec![(ComponentId(0), body())],
        };
        let relation = RelationTable {
            header: SnapshotHeader::new(Table::Relation, 1),
            edges: vec![(ComponentId(0), vec![ComponentId(7)])],
        };
        backend.put(Table::Catalog, catalog.encode().unwrap());
        backend.put(Table::Relation, relation.encode().unwrap());

        let store = CompatibilityStore::with_backend(StoreConfig::default(), backend);
        store.register(engine(), []).unwrap();
        let err = store.reload().unwrap_err();
        assert!(matches!(err, StoreError::CorruptState(ref msg) if msg.contains("#7")));
        // Failed reload leaves the live state alone.
        assert!(store.contains(&engine()));
        assert!(!store.contains(&body()));
    }

    #[test]
    fn reload_rejects_duplicate_components() {
        let backend = MemoryBackend::new();
        let catalog = CatalogTable {
            header: SnapshotHeader::new(Table::Catalog, 1),
            entries: vec![(ComponentId(0), body()), (ComponentId(1), body())],
        };
        let relation = RelationTable {
            header: SnapshotHeader::new(Table::Relation, 1),
            edges: vec![],
        };
        backend.put(Table::Catalog, catalog.encode().unwrap());
        backend.put(Table::Relation, relation.encode().unwrap());

        let store = CompatibilityStore::with_backend(StoreConfig::default(), backend);
        assert!(matches!(store.reload(), Err(StoreError::CorruptState(_))));
    }

    #[test]
    fn reload_rejects_sparse_ids() {
        let backend = MemoryBackend::new();
        let catalog = CatalogTable {
            header: SnapshotHeader::new(Table::Catalog, 1),
            entries: vec![(ComponentId(0), body()), (ComponentId(5), engine())],
        };
        let relation = RelationTable {
            header: SnapshotHeader::new(Table::Relation, 1),
            edges: vec![],
        };
        backend.put(Table::Catalog, catalog.encode().unwrap());
        backend.put(Table::Relation, relation.encode().unwrap());

        let store = CompatibilityStore::with_backend(StoreConfig::default(), backend);
        assert!(matches!(store.reload(), Err(StoreError::CorruptState(_))));
    }

    #[test]
    fn reload_rejects_garbage() {
        let backend = MemoryBackend::new();
        backend.put(Table::Catalog, vec![1, 2, 3]);
        backend.put(Table::Relation, vec![4, 5, 6]);
        let store = CompatibilityStore::with_backend(StoreConfig::default(), backend);
        assert!(matches!(store.reload(), Err(StoreError::CorruptState(_))));
    }

    #[test]
    fn ids_continue_after_reload() {
        let backend = MemoryBackend::new();
        let store = CompatibilityStore::with_backend(StoreConfig::default(), backend.clone());
        store.register(body(), []).unwrap();
        store.register(engine(), []).unwrap();
        store.snapshot().unwrap();

        let fresh = CompatibilityStore::with_backend(StoreConfig::default(), backend);
        fresh.reload().unwrap();
        assert_eq!(fresh.register(wheels(), []).unwrap(), ComponentId(2));
    }

    #[test]
    fn activate_rejects_zero_interval() {
        let store = CompatibilityStore::with_backend(
            StoreConfig::default().with_interval(Duration::ZERO),
            MemoryBackend::new(),
        );
        assert!(matches!(
            store.activate(),
            Err(StoreError::Config(ConfigError::ZeroInterval))
        ));
        assert!(!store.is_active());
    }

    // -----------------------------------------------------------------------
    // Views and identifiers
    // -----------------------------------------------------------------------

    #[test]
    fn view_pins_state_until_dropped() {
        let backend = MemoryBackend::new();
        let store = CompatibilityStore::with_backend(StoreConfig::default(), backend.clone());
        store.register(engine(), []).unwrap();
        store.register(body(), [engine()]).unwrap();
        store.snapshot().unwrap();
        store.extend_compatibility(&engine(), &body()).unwrap();

        let view = store.view();
        assert!(view.is_compatible(&engine(), &body()).unwrap());
        std::thread::scope(|s| {
            let reload = s.spawn(|| store.reload());
            std::thread::sleep(Duration::from_millis(50));
            assert!(!reload.is_finished());
            assert!(view.is_compatible(&engine(), &body()).unwrap());
            assert_eq!(view.compatible_with(&body()).unwrap(), vec![engine()]);
            drop(view);
            reload.join().unwrap().unwrap();
        });
        assert!(!store.is_compatible(&engine(), &body()).unwrap());
    }

    #[test]
    fn identifiers_stop_at_u32_range() {
        assert_eq!(id_for_slot(0).unwrap(), ComponentId(0));
        assert_eq!(id_for_slot(7).unwrap(), ComponentId(7));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn slot_past_u32_is_capacity_exceeded() {
        let last = u32::MAX as usize;
        assert_eq!(id_for_slot(last).unwrap(), ComponentId(u32::MAX));
        assert!(matches!(
            id_for_slot(last + 1),
            Err(StoreError::CapacityExceeded { slot }) if slot == last + 1
        ));
    }

    #[test]
    fn error_display_messages() {
        let e = StoreError::AlreadyExists(body());
        assert!(format!("{e}").contains("Maruti_alto"));

        let e = StoreError::NotFound(Missing::Id(ComponentId(4)));
        assert!(format!("{e}").contains("#4"));

        let e = StoreError::CorruptState("bad header".to_string());
        assert!(format!("{e}").contains("bad header"));

        let e = StoreError::from(ConfigError::ZeroInterval);
        assert!(format!("{e}").contains("1 ms"));
    }
}
