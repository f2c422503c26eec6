#![forbid(unsafe_code)]

mod cache;
mod changes;
mod conflicts;
mod error;
mod execute;
mod files;
mod graph;
mod image;
mod requests;
mod runtime;
mod support;
mod sync;
mod types;
mod versions;

pub use error::{ErrorKind, StoreError};
pub use requests::*;
pub use sync::SYNC_KEY;
pub use types::*;

pub(crate) use image::check_image_header;

use crate::config::StoreConfig;
use crate::plugin::{Plugin, PluginRegistry};
use cs_core::graph::{Ancestry, ConflictId, lowest_common_ancestor};
use cs_core::{
    ConflictCandidate, ConflictReason, DiffEntry, EntityKey, LeafSet, canonical_identifier,
    detect_conflicts, diff_leaves, plan_merge, simulate_merge,
};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, params};
use runtime::Runtime;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use support::*;
use tracing::{debug, warn};

/// Fixed id of the root of every inheritance chain.
pub const GLOBAL_VERSION_ID: &str = "global";
pub const GLOBAL_VERSION_NAME: &str = "global";
pub const MAIN_VERSION_NAME: &str = "main";

const CHECKPOINT_LABEL: &str = "checkpoint";
const MERGE_LABEL: &str = "merge";

pub struct SqliteStore {
    conn: Connection,
    runtime: Runtime,
    config: StoreConfig,
    plugins: PluginRegistry,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("config", &self.config)
            .field("plugins", &self.plugins.keys())
            .finish_non_exhaustive()
    }
}

/// One open SQLite transaction plus the handle state operations need.
///
/// Every store operation is available on `StoreTxn`; calling several of them
/// inside one [`SqliteStore::with_transaction`] makes them commit or roll
/// back together.
pub struct StoreTxn<'a> {
    tx: Transaction<'a>,
    runtime: &'a mut Runtime,
    config: &'a StoreConfig,
    plugins: &'a PluginRegistry,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn, config)
    }

    pub fn open_in_memory(config: StoreConfig) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, config)
    }

    fn from_connection(conn: Connection, config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        preflight_gate(&conn)?;
        install_schema(&conn)?;

        let mut store = Self {
            conn,
            runtime: Runtime::default(),
            config,
            plugins: PluginRegistry::default(),
        };
        store.with_transaction(|txn| txn.bootstrap())?;
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.register(plugin);
    }

    /// Runs `f` inside one transaction. `Ok` commits (flushing the runtime
    /// sequence first); `Err` rolls everything back, runtime included.
    pub fn with_transaction<T>(
        &mut self,
        f: impl FnOnce(&mut StoreTxn<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let Self {
            conn,
            runtime,
            config,
            plugins,
        } = self;
        let tx = conn.transaction()?;
        let mut txn = StoreTxn {
            tx,
            runtime,
            config,
            plugins,
        };
        match f(&mut txn) {
            Ok(value) => {
                txn.finish()?;
                Ok(value)
            }
            Err(err) => {
                txn.abort();
                Err(err)
            }
        }
    }

    pub fn enable_deterministic_mode(&mut self, seed: u64) -> Result<(), StoreError> {
        self.with_transaction(|txn| txn.enable_deterministic_mode(seed))
    }

    pub fn is_deterministic(&mut self) -> Result<bool, StoreError> {
        self.with_transaction(|txn| txn.is_deterministic())
    }

    pub fn next_id(&mut self) -> Result<String, StoreError> {
        self.with_transaction(|txn| txn.next_id())
    }

    pub fn now(&mut self) -> Result<String, StoreError> {
        self.with_transaction(|txn| txn.now())
    }

    pub fn next_random(&mut self) -> Result<u64, StoreError> {
        self.with_transaction(|txn| txn.next_random())
    }
}

impl<'a> StoreTxn<'a> {
    fn finish(self) -> Result<(), StoreError> {
        let Self { tx, runtime, .. } = self;
        if let Err(err) = runtime.flush(&tx) {
            runtime.reset();
            return Err(err);
        }
        if let Err(err) = tx.commit() {
            runtime.reset();
            return Err(err.into());
        }
        Ok(())
    }

    fn abort(self) {
        let Self { tx, runtime, .. } = self;
        drop(tx);
        runtime.reset();
    }

    pub fn config(&self) -> &StoreConfig {
        self.config
    }

    pub fn enable_deterministic_mode(&mut self, seed: u64) -> Result<(), StoreError> {
        debug!("enable_deterministic_mode: seed={}", seed);
        self.runtime.enable_deterministic(&self.tx, seed)
    }

    pub fn is_deterministic(&mut self) -> Result<bool, StoreError> {
        self.runtime.is_deterministic(&self.tx)
    }

    pub fn next_id(&mut self) -> Result<String, StoreError> {
        self.runtime.next_id(&self.tx)
    }

    pub fn now(&mut self) -> Result<String, StoreError> {
        self.runtime.now(&self.tx)
    }

    pub fn next_random(&mut self) -> Result<u64, StoreError> {
        self.runtime.next_random(&self.tx)
    }

    /// Seeds the runtime row, the root commit and the two built-in versions
    /// of a fresh store. A store that already has versions is left alone.
    fn bootstrap(&mut self) -> Result<(), StoreError> {
        let (deterministic, seed) = match self.config.deterministic {
            Some(deterministic) => (true, deterministic.seed),
            None => (false, 0),
        };
        self.tx.execute(
            "INSERT OR IGNORE INTO internal_runtime(singleton, deterministic, seed, sequence) \
             VALUES (1, ?1, ?2, 0)",
            params![deterministic, seed_to_sql(seed)],
        )?;

        let versions: i64 = self
            .tx
            .query_row("SELECT COUNT(*) FROM version", [], |row| row.get(0))?;
        if versions > 0 {
            return Ok(());
        }

        let root = self.new_commit(true)?;
        let global_working = self.new_commit(false)?;
        insert_version_tx(
            &self.tx,
            &VersionRow {
                id: GLOBAL_VERSION_ID.to_string(),
                name: GLOBAL_VERSION_NAME.to_string(),
                commit_id: root.clone(),
                working_commit_id: global_working,
                inherits_from_version_id: None,
            },
        )?;

        let main_id = self.next_id()?;
        let main_working = self.new_commit(false)?;
        insert_version_tx(
            &self.tx,
            &VersionRow {
                id: main_id.clone(),
                name: MAIN_VERSION_NAME.to_string(),
                commit_id: root,
                working_commit_id: main_working,
                inherits_from_version_id: Some(GLOBAL_VERSION_ID.to_string()),
            },
        )?;
        self.tx.execute(
            "INSERT INTO internal_active_version(singleton, version_id) VALUES (1, ?1)",
            params![main_id],
        )?;
        debug!("bootstrap: main={}", main_id);
        Ok(())
    }

    /// Allocates a commit with its own empty change set.
    fn new_commit(&mut self, immutable: bool) -> Result<String, StoreError> {
        let change_set_id = self.next_id()?;
        let commit_id = self.next_id()?;
        let created_at = self.now()?;
        self.tx.execute(
            "INSERT INTO change_set(id, immutable) VALUES (?1, ?2)",
            params![change_set_id, immutable],
        )?;
        self.tx.execute(
            "INSERT INTO commits(id, change_set_id, created_at) VALUES (?1, ?2, ?3)",
            params![commit_id, change_set_id, created_at],
        )?;
        Ok(commit_id)
    }
}

fn map_insert_conflict(err: rusqlite::Error) -> StoreError {
    if is_constraint_violation(&err) {
        return StoreError::VersionAlreadyExists;
    }
    StoreError::from(err)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}

fn canonicalize_version_name(value: &str) -> Result<String, StoreError> {
    canonical_identifier(value).map_err(|err| StoreError::InvalidInput(err.message()))
}

fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}

/// SQLite integers are signed; seeds keep their bit pattern.
fn seed_to_sql(seed: u64) -> i64 {
    seed as i64
}

fn seed_from_sql(value: i64) -> u64 {
    value as u64
}

fn entity_key(entity_id: &str, schema_key: &str, file_id: &str) -> EntityKey {
    EntityKey::new(entity_id, schema_key, file_id)
}
