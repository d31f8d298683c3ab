//! Carbuild Core -- the compatibility store and build validator for
//! automotive parts.
//!
//! Manufacturers register components together with the components each one
//! works with. Clients assemble candidate builds from the registered
//! inventory, and the validator reports every pair of parts that does not
//! fit along with suggested replacements.
//!
//! # Validation Pipeline
//!
//! Each call to [`builder::Builder::build`] runs three steps:
//!
//! 1. **Entry check** -- Every component must be registered and the build must
//!    hold exactly one body, engine, battery and set of wheels.
//! 2. **Conflict scan** -- Every ordered pair `(a, b)` is checked against the
//!    directed relation; `(a, b)` conflicts when `a` does not list `b`.
//! 3. **Suggestions** -- For each conflict `(a, b)`, the parts `a` accepts
//!    that share `b`'s kind.
//!
//! # Persistence
//!
//! The store keeps its catalog and relation in memory and, once activated,
//! snapshots both tables on a background thread at a fixed interval:
//!
//! ```rust,ignore
//! let store = CompatibilityStore::new(StoreConfig::in_dir("/var/lib/carbuild"));
//! store.reload()?;
//! store.activate()?;
//! ```
//!
//! # Key Types
//!
//! - [`store::CompatibilityStore`] -- Component registry, directed relation
//!   and snapshot lifecycle.
//! - [`component::Component`] -- Immutable catalog part; identity is its
//!   full set of attributes.
//! - [`validation::validate`] -- Entry check plus exhaustive conflict scan.
//! - [`suggest::suggest`] -- Same-kind replacement candidates per conflict.
//! - [`builder::BuildSession`] -- A client's working selection.
//! - [`manufacturer::Manufacturer`] -- Publishes parts and relation edges.
//! - [`serialize`] -- Versioned snapshot tables via bitcode.

pub mod builder;
pub mod component;
pub mod config;
pub mod id;
pub mod manufacturer;
pub mod persistence;
pub mod seed;
pub mod serialize;
pub mod store;
pub mod suggest;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
