//! Configuration
//!
//! Defaults, optional JSON file, then CLI overrides (applied in `main`).

mod schema;
mod store;

pub use schema::*;
pub use store::load_config;
