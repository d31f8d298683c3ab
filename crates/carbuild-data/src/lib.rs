pub mod config;
pub mod exchange;
pub mod loader;
pub mod schema;

pub use config::load_store_config;
pub use exchange::{ExchangeError, from_json, load_build, save_build, to_json};
pub use loader::DataLoadError;
pub use schema::{ComponentData, SchemaError};
