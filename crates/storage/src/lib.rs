#![forbid(unsafe_code)]

//! SQLite-backed change-control store.
//!
//! Every entity write is appended to an immutable change log; versions are
//! named pointers into a commit graph, and the visible state of a version is
//! the newest change per entity along its history and inheritance chain.

mod async_api;
pub mod config;
mod directory;
pub mod plugin;
mod store;

pub use async_api::AsyncStore;
pub use config::{DeterministicConfig, StoreConfig};
pub use directory::StoreDirectory;
pub use plugin::{DetectedChange, Plugin, PluginEntity, PluginError, PluginRegistry};
pub use store::{
    CacheReport, ChangeRow, CommitRow, ConflictFilter, ConflictRow, CreateVersionRequest, EntityWrite,
    ErrorKind, FileRow, GLOBAL_VERSION_ID, GLOBAL_VERSION_NAME, MAIN_VERSION_NAME, MergeOutcome,
    MergeSummary, QueryResult, SYNC_KEY, SqliteStore, StateRow, StoreError, StoreTxn, VersionRow,
};

pub use cs_core::{ConflictReason, DiffEntry, DiffKind, EntityKey};
