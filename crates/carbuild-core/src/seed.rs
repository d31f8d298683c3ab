//! Two-maker sample catalog.
//!
//! Registers five Maruti and five Tesla parts and wires a relation where
//! each maker's parts accept one another plus a few cross-maker picks. The
//! cross-maker edges are deliberately one-sided in places, e.g. the Maruti
//! body accepts the Tesla engine but not the reverse.

use crate::component::{Component, ComponentFactory, Diameter, Mechanism, Structure};
use crate::store::{CompatibilityStore, StoreError};
use std::collections::BTreeSet;
use tracing::info;

/// Handles to every component registered by [`demo_catalog`].
#[derive(Debug, Clone)]
pub struct DemoCatalog {
    pub maruti_body: Component,
    pub maruti_engine: Component,
    pub maruti_battery: Component,
    pub maruti_wheels: Component,
    pub maruti_radio: Component,
    pub tesla_body: Component,
    pub tesla_engine: Component,
    pub tesla_battery: Component,
    pub tesla_wheels: Component,
    pub tesla_radio: Component,
}

impl DemoCatalog {
    fn new() -> Self {
        let maruti = ComponentFactory::new("Maruti");
        let tesla = ComponentFactory::new("Tesla");
        Self {
            maruti_body: maruti.body("Maruti_alto", Structure::Mini),
            maruti_engine: maruti.engine("Maruti_engine_small", Mechanism::Gas),
            maruti_battery: maruti.battery("Maruti_battery_small"),
            maruti_wheels: maruti.wheels("Maruti_wheels_small", Diameter::Sixteen),
            maruti_radio: maruti.accessory("Maruti_radio", "Radio"),
            tesla_body: tesla.body("Tesla_X", Structure::Sedan),
            tesla_engine: tesla.engine("Tesla_engine_med", Mechanism::Electric),
            tesla_battery: tesla.battery("Tesla_battery_big"),
            tesla_wheels: tesla.wheels("Tesla_wheels_small", Diameter::Eighteen),
            tesla_radio: tesla.accessory("Tesla_radio", "Radio"),
        }
    }

    pub fn maruti(&self) -> [&Component; 5] {
        [
            &self.maruti_body,
            &self.maruti_engine,
            &self.maruti_battery,
            &self.maruti_wheels,
            &self.maruti_radio,
        ]
    }

    pub fn tesla(&self) -> [&Component; 5] {
        [
            &self.tesla_body,
            &self.tesla_engine,
            &self.tesla_battery,
            &self.tesla_wheels,
            &self.tesla_radio,
        ]
    }

    /// One Tesla part of each primary kind.
    pub fn tesla_build(&self) -> BTreeSet<Component> {
        self.tesla()[..4].iter().map(|c| (*c).clone()).collect()
    }

    /// One Maruti part of each primary kind.
    pub fn maruti_build(&self) -> BTreeSet<Component> {
        self.maruti()[..4].iter().map(|c| (*c).clone()).collect()
    }

    fn everything_but(&self, skip: &Component) -> Vec<&Component> {
        self.maruti()
            .into_iter()
            .chain(self.tesla())
            .filter(|c| *c != skip)
            .collect()
    }

    /// `(component, compatible_with)` for every part.
    fn edges(&self) -> Vec<(&Component, Vec<&Component>)> {
        let maruti = self.maruti();
        let tesla = self.tesla();
        vec![
            (
                &self.maruti_body,
                with(maruti, &[&self.tesla_engine, &self.tesla_wheels]),
            ),
            (
                &self.maruti_engine,
                with(maruti, &[&self.tesla_radio, &self.tesla_body]),
            ),
            (&self.maruti_battery, with(maruti, &[&self.tesla_wheels])),
            (&self.maruti_wheels, self.everything_but(&self.tesla_wheels)),
            (&self.maruti_radio, self.everything_but(&self.tesla_radio)),
            (
                &self.tesla_body,
                with(tesla, &[&self.maruti_engine, &self.maruti_wheels]),
            ),
            (
                &self.tesla_engine,
                with(tesla, &[&self.maruti_wheels, &self.maruti_radio]),
            ),
            (
                &self.tesla_battery,
                with(tesla, &[&self.maruti_engine, &self.maruti_wheels]),
            ),
            (&self.tesla_wheels, self.everything_but(&self.maruti_wheels)),
            (&self.tesla_radio, self.everything_but(&self.maruti_radio)),
        ]
    }
}

fn with<'s>(base: [&'s Component; 5], extra: &[&'s Component]) -> Vec<&'s Component> {
    base.iter().chain(extra.iter()).copied().collect()
}

/// Register the sample catalog into `store`.
pub fn demo_catalog(store: &CompatibilityStore) -> Result<DemoCatalog, StoreError> {
    let demo = DemoCatalog::new();
    for component in demo.maruti().into_iter().chain(demo.tesla()) {
        store.register(component.clone(), [])?;
    }
    for (component, compatible) in demo.edges() {
        for other in compatible {
            store.extend_compatibility(component, other)?;
        }
    }
    info!(components = store.len(), "demo catalog registered");
    Ok(demo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::memory_store;
    use crate::validation::validate;

    #[test]
    fn registers_ten_parts() {
        let store = memory_store();
        let demo = demo_catalog(&store).unwrap();
        assert_eq!(store.len(), 10);
        for c in demo.maruti().into_iter().chain(demo.tesla()) {
            assert!(store.contains(c));
        }
    }

    #[test]
    fn seeding_twice_fails() {
        let store = memory_store();
        demo_catalog(&store).unwrap();
        assert!(matches!(
            demo_catalog(&store),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn cross_maker_edges_are_one_sided() {
        let store = memory_store();
        let demo = demo_catalog(&store).unwrap();
        assert!(
            store
                .is_compatible(&demo.maruti_body, &demo.tesla_engine)
                .unwrap()
        );
        assert!(
            !store
                .is_compatible(&demo.tesla_engine, &demo.maruti_body)
                .unwrap()
        );
        assert!(
            !store
                .is_compatible(&demo.maruti_wheels, &demo.tesla_wheels)
                .unwrap()
        );
    }

    #[test]
    fn single_maker_builds_are_valid() {
        let store = memory_store();
        let demo = demo_catalog(&store).unwrap();
        assert!(validate(&demo.tesla_build(), &store).unwrap().is_valid());
        assert!(validate(&demo.maruti_build(), &store).unwrap().is_valid());
    }
}
