#![forbid(unsafe_code)]

use super::*;
use cs_sql::views::{KEY_VALUE_FILE_ID, KEY_VALUE_PLUGIN_KEY, KEY_VALUE_SCHEMA_KEY};
use serde_json::json;

/// Untracked key in the global version that switches sync on.
pub const SYNC_KEY: &str = "lix_sync";

fn sync_key() -> EntityKey {
    entity_key(SYNC_KEY, KEY_VALUE_SCHEMA_KEY, KEY_VALUE_FILE_ID)
}

impl StoreTxn<'_> {
    pub fn sync_enabled(&mut self) -> Result<bool, StoreError> {
        let value = self.untracked(GLOBAL_VERSION_ID, &sync_key())?;
        Ok(value
            .as_ref()
            .and_then(|snapshot| snapshot.get("value"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false))
    }

    pub fn set_sync_enabled(&mut self, enabled: bool) -> Result<(), StoreError> {
        let mut write = EntityWrite::new(
            SYNC_KEY,
            KEY_VALUE_SCHEMA_KEY,
            KEY_VALUE_FILE_ID,
            KEY_VALUE_PLUGIN_KEY,
            Some(json!({ "key": SYNC_KEY, "value": enabled })),
        );
        write.untracked = true;
        self.write_entity(GLOBAL_VERSION_ID, write)?;
        Ok(())
    }
}

impl SqliteStore {
    pub fn sync_enabled(&mut self) -> Result<bool, StoreError> {
        self.with_transaction(|txn| txn.sync_enabled())
    }

    pub fn set_sync_enabled(&mut self, enabled: bool) -> Result<(), StoreError> {
        self.with_transaction(|txn| txn.set_sync_enabled(enabled))
    }
}
