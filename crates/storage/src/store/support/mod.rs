#![forbid(unsafe_code)]

mod graph_tx;
mod rows;
mod schema;
mod state_tx;
mod versions_tx;

pub(super) use graph_tx::*;
pub(super) use rows::*;
pub(super) use schema::{install_schema, preflight_gate};
pub(super) use state_tx::*;
pub(super) use versions_tx::*;
