#![forbid(unsafe_code)]

use crate::StoreError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ANCESTRY_DEPTH: usize = 10_000;
pub const DEFAULT_MAX_INHERITANCE_DEPTH: usize = 64;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Seeds the deterministic runtime when the store is created.
    pub deterministic: Option<DeterministicConfig>,
    /// Upper bound on how far ancestry queries walk from a tip.
    pub max_ancestry_depth: usize,
    pub max_inheritance_depth: usize,
    pub busy_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeterministicConfig {
    #[serde(default)]
    pub seed: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            deterministic: None,
            max_ancestry_depth: DEFAULT_MAX_ANCESTRY_DEPTH,
            max_inheritance_depth: DEFAULT_MAX_INHERITANCE_DEPTH,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    pub fn deterministic(seed: u64) -> Self {
        Self {
            deterministic: Some(DeterministicConfig { seed }),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, StoreError> {
        let config: Self =
            serde_yaml::from_str(raw).map_err(|err| StoreError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.max_ancestry_depth == 0 {
            return Err(StoreError::Config(
                "max_ancestry_depth must be at least 1".into(),
            ));
        }
        if self.max_inheritance_depth == 0 {
            return Err(StoreError::Config(
                "max_inheritance_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
