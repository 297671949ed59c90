//! Storage layer: one JSON document per state aggregate in a data directory.

mod error;
mod json;

pub use error::StoreError;
pub use json::JsonDirStore;
