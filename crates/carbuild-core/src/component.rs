//! Component catalog value types.
//!
//! A [`Component`] is an immutable value. Identity is structural: two
//! components are the same part iff they agree on kind, name, manufacturer
//! and the kind-specific attribute carried by [`Part`].

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// The slot a component fills in a car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Body,
    Engine,
    Battery,
    Wheels,
    Accessory,
}

impl ComponentKind {
    /// Kinds a valid build must contain exactly once, in check order.
    pub const PRIMARY: [ComponentKind; 4] = [
        ComponentKind::Body,
        ComponentKind::Engine,
        ComponentKind::Battery,
        ComponentKind::Wheels,
    ];

    /// Every kind, primaries first.
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Body,
        ComponentKind::Engine,
        ComponentKind::Battery,
        ComponentKind::Wheels,
        ComponentKind::Accessory,
    ];

    /// Whether a build must carry exactly one component of this kind.
    pub fn is_primary(self) -> bool {
        !matches!(self, ComponentKind::Accessory)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Body => "body",
            ComponentKind::Engine => "engine",
            ComponentKind::Battery => "battery",
            ComponentKind::Wheels => "wheels",
            ComponentKind::Accessory => "accessory",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Kind-specific attributes
// ---------------------------------------------------------------------------

/// Body structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Structure {
    Mini,
    Sedan,
    Van,
    Truck,
}

/// Engine drive mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    Electric,
    Gas,
    Diesel,
    Hybrid,
}

/// Wheel rim diameter in inches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diameter {
    Sixteen,
    Eighteen,
    TwentyTwo,
    TwentyFour,
}

impl Diameter {
    pub fn inches(self) -> u32 {
        match self {
            Diameter::Sixteen => 16,
            Diameter::Eighteen => 18,
            Diameter::TwentyTwo => 22,
            Diameter::TwentyFour => 24,
        }
    }
}

/// The kind of a component together with its kind-specific attribute.
/// Batteries carry no attribute; accessories carry their free-text use
/// (e.g. `"Radio"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Part {
    Body(Structure),
    Engine(Mechanism),
    Battery,
    Wheels(Diameter),
    Accessory(String),
}

impl Part {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Part::Body(_) => ComponentKind::Body,
            Part::Engine(_) => ComponentKind::Engine,
            Part::Battery => ComponentKind::Battery,
            Part::Wheels(_) => ComponentKind::Wheels,
            Part::Accessory(_) => ComponentKind::Accessory,
        }
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A catalog part. Field order drives the derived `Ord`, so sorted
/// collections group components by kind first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Component {
    pub part: Part,
    pub name: String,
    pub manufacturer: String,
}

impl Component {
    pub fn new(part: Part, name: impl Into<String>, manufacturer: impl Into<String>) -> Self {
        Self {
            part,
            name: name.into(),
            manufacturer: manufacturer.into(),
        }
    }

    pub fn body(name: &str, structure: Structure, manufacturer: &str) -> Self {
        Self::new(Part::Body(structure), name, manufacturer)
    }

    pub fn engine(name: &str, mechanism: Mechanism, manufacturer: &str) -> Self {
        Self::new(Part::Engine(mechanism), name, manufacturer)
    }

    pub fn battery(name: &str, manufacturer: &str) -> Self {
        Self::new(Part::Battery, name, manufacturer)
    }

    pub fn wheels(name: &str, diameter: Diameter, manufacturer: &str) -> Self {
        Self::new(Part::Wheels(diameter), name, manufacturer)
    }

    pub fn accessory(name: &str, use_: &str, manufacturer: &str) -> Self {
        Self::new(Part::Accessory(use_.to_string()), name, manufacturer)
    }

    pub fn kind(&self) -> ComponentKind {
        self.part.kind()
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} by {})", self.name, self.kind(), self.manufacturer)
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Stamps out components for a single manufacturer.
#[derive(Debug, Clone)]
pub struct ComponentFactory {
    manufacturer: String,
}

impl ComponentFactory {
    pub fn new(manufacturer: impl Into<String>) -> Self {
        Self {
            manufacturer: manufacturer.into(),
        }
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn body(&self, name: &str, structure: Structure) -> Component {
        Component::body(name, structure, &self.manufacturer)
    }

    pub fn engine(&self, name: &str, mechanism: Mechanism) -> Component {
        Component::engine(name, mechanism, &self.manufacturer)
    }

    pub fn battery(&self, name: &str) -> Component {
        Component::battery(name, &self.manufacturer)
    }

    pub fn wheels(&self, name: &str, diameter: Diameter) -> Component {
        Component::wheels(name, diameter, &self.manufacturer)
    }

    pub fn accessory(&self, name: &str, use_: &str) -> Component {
        Component::accessory(name, use_, &self.manufacturer)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
