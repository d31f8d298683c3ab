//! On-disk record for exchanging components.
//!
//! A [`ComponentData`] is a flat record: kind, name, manufacturer and at most
//! one kind-specific attribute. It is what build files hold; conversion into
//! a [`Component`] checks that the attribute matches the kind.

use carbuild_core::component::{
    Component, ComponentKind, Diameter, Mechanism, Part, Structure,
};
use serde::{Deserialize, Serialize};

/// A component as written to a build file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentData {
    pub comp_type: ComponentKind,
    pub name: String,
    pub manufacturer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Structure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Mechanism>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diameter: Option<Diameter>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
}

/// A record whose attributes do not fit its kind.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{kind} '{name}' is missing its '{attribute}' attribute")]
    MissingAttribute {
        name: String,
        kind: ComponentKind,
        attribute: &'static str,
    },

    #[error("{kind} '{name}' carries a '{attribute}' attribute it cannot have")]
    UnexpectedAttribute {
        name: String,
        kind: ComponentKind,
        attribute: &'static str,
    },
}

impl ComponentData {
    /// Names of the attributes that are set.
    fn present(&self) -> impl Iterator<Item = &'static str> + '_ {
        [
            ("structure", self.structure.is_some()),
            ("mechanism", self.mechanism.is_some()),
            ("diameter", self.diameter.is_some()),
            ("use", self.use_.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
    }

    fn missing(&self, attribute: &'static str) -> SchemaError {
        SchemaError::MissingAttribute {
            name: self.name.clone(),
            kind: self.comp_type,
            attribute,
        }
    }

    /// Rebuild the component this record describes.
    pub fn to_component(&self) -> Result<Component, SchemaError> {
        let (part, allowed) = match self.comp_type {
            ComponentKind::Body => (
                Part::Body(self.structure.ok_or_else(|| self.missing("structure"))?),
                Some("structure"),
            ),
            ComponentKind::Engine => (
                Part::Engine(self.mechanism.ok_or_else(|| self.missing("mechanism"))?),
                Some("mechanism"),
            ),
            ComponentKind::Battery => (Part::Battery, None),
            ComponentKind::Wheels => (
                Part::Wheels(self.diameter.ok_or_else(|| self.missing("diameter"))?),
                Some("diameter"),
            ),
            ComponentKind::Accessory => (
                Part::Accessory(self.use_.clone().ok_or_else(|| self.missing("use"))?),
                Some("use"),
            ),
        };

        if let Some(attribute) = self.present().find(|a| Some(*a) != allowed) {
            return Err(SchemaError::UnexpectedAttribute {
                name: self.name.clone(),
                kind: self.comp_type,
                attribute,
            });
        }

        Ok(Component::new(part, &self.name, &self.manufacturer))
    }
}

impl From<&Component> for ComponentData {
    fn from(component: &Component) -> Self {
        let mut data = ComponentData {
            comp_type: component.kind(),
            name: component.name.clone(),
            manufacturer: component.manufacturer.clone(),
            structure: None,
            mechanism: None,
            diameter: None,
            use_: None,
        };
        match &component.part {
            Part::Body(s) => data.structure = Some(*s),
            Part::Engine(m) => data.mechanism = Some(*m),
            Part::Battery => {}
            Part::Wheels(d) => data.diameter = Some(*d),
            Part::Accessory(u) => data.use_ = Some(u.clone()),
        }
        data
    }
}
