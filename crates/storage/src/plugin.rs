#![forbid(unsafe_code)]

//! Boundary to file-format plugins.
//!
//! A plugin turns file bytes into entity changes and entity state back into
//! bytes. The store never interprets file contents itself.

use crate::StoreError;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginError(pub String);

impl std::fmt::Display for PluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for PluginError {}

impl From<PluginError> for StoreError {
    fn from(value: PluginError) -> Self {
        Self::Plugin(value.0)
    }
}

/// One entity a plugin found changed; `snapshot_content = None` deletes it.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedChange {
    pub entity_id: String,
    pub schema_key: String,
    pub schema_version: String,
    pub snapshot_content: Option<Value>,
}

/// One visible entity handed to [`Plugin::apply_changes`].
#[derive(Clone, Debug, PartialEq)]
pub struct PluginEntity {
    pub entity_id: String,
    pub schema_key: String,
    pub schema_version: String,
    pub snapshot_content: Value,
}

pub trait Plugin: Send + Sync {
    fn key(&self) -> &str;

    fn matches(&self, path: &str) -> bool;

    /// Entities that differ between `before` (absent for a new file) and
    /// `after`.
    fn detect_changes(
        &self,
        before: Option<&[u8]>,
        after: &[u8],
    ) -> Result<Vec<DetectedChange>, PluginError>;

    /// Renders the full set of entities of one file, ordered by key.
    fn apply_changes(&self, entities: &[PluginEntity]) -> Result<Vec<u8>, PluginError>;
}

#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRegistry {
    /// Adds a plugin, replacing any plugin with the same key.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.retain(|existing| existing.key() != plugin.key());
        self.plugins.push(plugin);
    }

    pub fn by_key(&self, key: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .find(|plugin| plugin.key() == key)
            .cloned()
    }

    /// First registered plugin that claims `path`.
    pub fn for_path(&self, path: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .find(|plugin| plugin.matches(path))
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.plugins
            .iter()
            .map(|plugin| plugin.key().to_string())
            .collect()
    }
}
