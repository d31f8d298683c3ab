//! Build validation: entry checks and the pairwise conflict scan.
//!
//! Validation runs in two steps. The entry check rejects builds that
//! reference unregistered components or do not carry exactly one component
//! of each primary kind; it runs before any compatibility query. The
//! conflict scan then visits every ordered pair `(a, b)` with `a != b` in
//! build order and records `(a, b)` whenever `a` does not list `b` as
//! compatible. Because the relation is directed, one unordered pair can
//! produce zero, one or two conflicts.

use crate::component::{Component, ComponentKind};
use crate::store::{CompatibilityIndex, StoreError};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An ordered pair from a build where `first` does not list `second` as
/// compatible.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Conflict {
    pub first: Component,
    pub second: Component,
}

impl Conflict {
    pub fn new(first: Component, second: Component) -> Self {
        Self { first, second }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not compatible with {}", self.first.name, self.second.name)
    }
}

/// Outcome of validating a structurally sound build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    /// Every conflict found, in scan order.
    Invalid(Vec<Conflict>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid(conflicts) => conflicts,
        }
    }
}

/// Errors that stop a build from being validated at all.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("component not in inventory: {0}")]
    UnregisteredComponent(Component),

    #[error("a build needs exactly one {kind}, found {count}")]
    Cardinality { kind: ComponentKind, count: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Entry check
// ---------------------------------------------------------------------------

/// Reject unregistered components, then any primary kind whose count is not
/// exactly one (checked in [`ComponentKind::PRIMARY`] order). Issues no
/// compatibility queries.
pub fn check_entry<I>(build: &BTreeSet<Component>, index: &I) -> Result<(), BuildError>
where
    I: CompatibilityIndex + ?Sized,
{
    let mut counts = [0usize; ComponentKind::PRIMARY.len()];
    for component in build {
        if !index.contains(component) {
            return Err(BuildError::UnregisteredComponent(component.clone()));
        }
        if let Some(slot) = ComponentKind::PRIMARY
            .iter()
            .position(|k| *k == component.kind())
        {
            counts[slot] += 1;
        }
    }

    for (kind, count) in ComponentKind::PRIMARY.iter().zip(counts) {
        if count != 1 {
            return Err(BuildError::Cardinality { kind: *kind, count });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Conflict scan
// ---------------------------------------------------------------------------

/// Conflicts with `first` on the left, against every other part in order.
fn conflicts_of<I>(
    first: &Component,
    parts: &[&Component],
    index: &I,
) -> Result<Vec<Conflict>, StoreError>
where
    I: CompatibilityIndex + ?Sized,
{
    let mut found = Vec::new();
    for &second in parts {
        if first != second && !index.is_compatible(first, second)? {
            found.push(Conflict::new(first.clone(), second.clone()));
        }
    }
    Ok(found)
}

/// Scan every ordered pair of distinct components. Does not stop at the
/// first conflict.
#[cfg(not(feature = "parallel"))]
pub fn find_conflicts<I>(build: &BTreeSet<Component>, index: &I) -> Result<Vec<Conflict>, StoreError>
where
    I: CompatibilityIndex + ?Sized,
{
    let parts: Vec<&Component> = build.iter().collect();
    let mut conflicts = Vec::new();
    for first in &parts {
        conflicts.extend(conflicts_of(first, &parts, index)?);
    }
    Ok(conflicts)
}

/// Scan every ordered pair of distinct components, one row per thread.
/// Produces the same ordered list as the sequential scan.
#[cfg(feature = "parallel")]
pub fn find_conflicts<I>(build: &BTreeSet<Component>, index: &I) -> Result<Vec<Conflict>, StoreError>
where
    I: CompatibilityIndex + ?Sized,
{
    use rayon::prelude::*;

    let parts: Vec<&Component> = build.iter().collect();
    let rows: Vec<Vec<Conflict>> = parts
        .par_iter()
        .map(|first| conflicts_of(first, &parts, index))
        .collect::<Result<_, _>>()?;
    Ok(rows.into_iter().flatten().collect())
}

/// Validate a candidate build against the compatibility relation.
pub fn validate<I>(build: &BTreeSet<Component>, index: &I) -> Result<ValidationResult, BuildError>
where
    I: CompatibilityIndex + ?Sized,
{
    check_entry(build, index)?;
    let conflicts = find_conflicts(build, index)?;
    if conflicts.is_empty() {
        Ok(ValidationResult::Valid)
    } else {
        Ok(ValidationResult::Invalid(conflicts))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
