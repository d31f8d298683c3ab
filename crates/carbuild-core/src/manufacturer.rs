//! Manufacturer-side publishing into the store.

use crate::component::{Component, ComponentFactory};
use crate::id::ComponentId;
use crate::store::{CompatibilityStore, StoreError};
use tracing::info;

/// A manufacturer bound to one store. Components it creates through
/// [`Manufacturer::factory`] carry its name.
pub struct Manufacturer<'a> {
    factory: ComponentFactory,
    store: &'a CompatibilityStore,
}

impl<'a> Manufacturer<'a> {
    pub fn new(name: impl Into<String>, store: &'a CompatibilityStore) -> Self {
        Self {
            factory: ComponentFactory::new(name),
            store,
        }
    }

    pub fn name(&self) -> &str {
        self.factory.manufacturer()
    }

    pub fn factory(&self) -> &ComponentFactory {
        &self.factory
    }

    /// Register `component` with its compatibility set.
    pub fn send_to_store(
        &self,
        component: Component,
        compatible_with: impl IntoIterator<Item = Component>,
    ) -> Result<ComponentId, StoreError> {
        self.store.register(component, compatible_with)
    }

    /// Add `new_item` to the compatibility set of an already registered
    /// `component`.
    pub fn update_compatibility(
        &self,
        component: &Component,
        new_item: &Component,
    ) -> Result<(), StoreError> {
        self.store.extend_compatibility(component, new_item)
    }

    /// Register `component` as compatible with everything currently in the
    /// store, then extend every one of those components to accept it.
    ///
    /// Components registered concurrently with this call are not included.
    pub fn publish_universal(&self, component: Component) -> Result<ComponentId, StoreError> {
        let existing: Vec<Component> = self
            .store
            .components()
            .into_iter()
            .map(|(_, c)| c)
            .collect();
        let id = self.send_to_store(component.clone(), existing.iter().cloned())?;
        for other in &existing {
            self.update_compatibility(other, &component)?;
        }
        info!(
            manufacturer = self.name(),
            %id,
            links = existing.len(),
            "published universally compatible component"
        );
        Ok(id)
    }
}
