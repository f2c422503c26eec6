#![forbid(unsafe_code)]

pub mod graph;
pub mod ids;
pub mod model;

pub use ids::{IdentifierError, StoreId, VersionName, canonical_identifier};
pub use model::*;

#[cfg(test)]
mod model_tests;
