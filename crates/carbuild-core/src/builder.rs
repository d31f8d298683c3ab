//! Build submission front end.
//!
//! [`Builder`] runs validation and, when conflicts turn up, the suggestion
//! pass, keeping both results for later reads. [`BuildSession`] is a
//! client's working set of components on top of a builder.

use crate::component::Component;
use crate::store::CompatibilityStore;
use crate::suggest::{Suggestions, suggest};
use crate::validation::{BuildError, Conflict, ValidationResult, validate};
use std::collections::BTreeSet;
use tracing::debug;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Validates builds for one client and remembers the outcome of the last
/// build that got past the entry check.
pub struct Builder<'a> {
    client_id: String,
    store: &'a CompatibilityStore,
    conflicts: Vec<Conflict>,
    suggestions: Suggestions,
}

impl<'a> Builder<'a> {
    pub fn new(client_id: impl Into<String>, store: &'a CompatibilityStore) -> Self {
        Self {
            client_id: client_id.into(),
            store,
            conflicts: Vec::new(),
            suggestions: Suggestions::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Validate `build`. On an entry-check error the previous conflicts and
    /// suggestions are kept; otherwise they are replaced.
    ///
    /// Validation and suggestions run against one [`StoreView`], so a
    /// concurrent registration or reload lands either before both or after
    /// both.
    ///
    /// [`StoreView`]: crate::store::StoreView
    pub fn build(&mut self, build: &BTreeSet<Component>) -> Result<ValidationResult, BuildError> {
        let (result, suggestions) = {
            let view = self.store.view();
            let result = validate(build, &view)?;
            let suggestions = suggest(result.conflicts(), &view)?;
            (result, suggestions)
        };

        debug!(
            client = %self.client_id,
            parts = build.len(),
            conflicts = result.conflicts().len(),
            "build validated"
        );
        self.conflicts = result.conflicts().to_vec();
        self.suggestions = suggestions;
        Ok(result)
    }

    /// Conflicts found by the last build.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Suggestions derived for the last build.
    pub fn suggestions(&self) -> &Suggestions {
        &self.suggestions
    }
}

// ---------------------------------------------------------------------------
// BuildSession
// ---------------------------------------------------------------------------

/// A client's in-progress selection of components.
pub struct BuildSession<'a> {
    builder: Builder<'a>,
    current: BTreeSet<Component>,
}

impl<'a> BuildSession<'a> {
    pub fn new(client_id: impl Into<String>, store: &'a CompatibilityStore) -> Self {
        Self {
            builder: Builder::new(client_id, store),
            current: BTreeSet::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        self.builder.client_id()
    }

    /// Add a component to the selection. Only components present in the
    /// inventory are accepted.
    pub fn add_component(&mut self, component: Component) -> Result<(), BuildError> {
        if !self.builder.store.contains(&component) {
            return Err(BuildError::UnregisteredComponent(component));
        }
        self.current.insert(component);
        Ok(())
    }

    /// Remove a component. Returns whether it was selected.
    pub fn remove_component(&mut self, component: &Component) -> bool {
        self.current.remove(component)
    }

    pub fn current(&self) -> &BTreeSet<Component> {
        &self.current
    }

    /// Replace the whole selection, e.g. with a build loaded from disk.
    /// Inventory membership is checked at submit time.
    pub fn replace_all(&mut self, components: impl IntoIterator<Item = Component>) {
        self.current = components.into_iter().collect();
    }

    pub fn submit(&mut self) -> Result<ValidationResult, BuildError> {
        self.builder.build(&self.current)
    }

    pub fn conflicts(&self) -> &[Conflict] {
        self.builder.conflicts()
    }

    pub fn suggestions(&self) -> &Suggestions {
        self.builder.suggestions()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
