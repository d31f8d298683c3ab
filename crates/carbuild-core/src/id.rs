use serde::{Deserialize, Serialize};

/// Identifies a registered component in the compatibility store. Assigned
/// in registration order and equal to the component's arena index, so it
/// stays stable for the lifetime of the store. Cheap to copy and compare.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ComponentId(pub u32);

impl ComponentId {
    /// Arena slot this identifier points at.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
