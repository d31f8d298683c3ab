//! Replacement suggestions for build conflicts.
//!
//! This is a single deterministic filter pass, not a recommender: for a
//! conflict `(a, b)` it offers the components `a` lists as compatible that
//! are of `b`'s kind. No ranking or learning is involved and the result is
//! best-effort guidance, not a compatibility guarantee. A ranked model
//! trained on successful builds is the intended replacement.

use crate::component::Component;
use crate::store::{CompatibilityIndex, StoreError};
use crate::validation::Conflict;
use std::collections::{BTreeMap, BTreeSet};

/// Candidate replacements keyed by the conflicting component whose
/// compatibility set they were drawn from.
pub type Suggestions = BTreeMap<Component, BTreeSet<Component>>;

/// Derive suggestions for every conflict.
///
/// A component with no relation entry contributes an empty set. Several
/// conflicts sharing a first component accumulate into one entry.
pub fn suggest<I>(conflicts: &[Conflict], index: &I) -> Result<Suggestions, StoreError>
where
    I: CompatibilityIndex + ?Sized,
{
    let mut suggestions = Suggestions::new();
    for conflict in conflicts {
        let needed = conflict.second.kind();
        let candidates = index.compatible_with(&conflict.first)?;
        suggestions
            .entry(conflict.first.clone())
            .or_default()
            .extend(candidates.into_iter().filter(|c| c.kind() == needed));
    }
    Ok(suggestions)
}
