#![forbid(unsafe_code)]

//! Stores kept as image files in one directory, addressed by store id.

use crate::config::StoreConfig;
use crate::store::{SqliteStore, StoreError, check_image_header};
use cs_core::StoreId;
use std::path::{Path, PathBuf};
use tracing::debug;

const IMAGE_EXTENSION: &str = "sqlite";

#[derive(Clone, Debug)]
pub struct StoreDirectory {
    root: PathBuf,
}

impl StoreDirectory {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates and persists a fresh store under `id`.
    pub fn create(&self, id: &str, config: StoreConfig) -> Result<SqliteStore, StoreError> {
        let id = parse_store_id(id)?;
        if self.image_path(&id).exists() {
            return Err(StoreError::InvalidInput("store already exists"));
        }
        let mut store = SqliteStore::open_in_memory(config)?;
        self.write_image(&id, &store.export_image()?)?;
        debug!("create_store: {}", id.as_str());
        Ok(store)
    }

    /// Raw image bytes of a stored store.
    ///
    /// A missing id is `UnknownStore`; bytes that are not a store image are
    /// `MalformedImage`.
    pub fn fetch_image(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let id = parse_store_id(id)?;
        let path = self.image_path(&id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::UnknownStore);
            }
            Err(err) => return Err(err.into()),
        };
        check_image_header(&bytes)?;
        Ok(bytes)
    }

    pub fn open_store(&self, id: &str, config: StoreConfig) -> Result<SqliteStore, StoreError> {
        let bytes = self.fetch_image(id)?;
        SqliteStore::from_image(&bytes, config)
    }

    /// Replaces the stored image of `id` with the current state of `store`.
    pub fn save(&self, id: &str, store: &mut SqliteStore) -> Result<(), StoreError> {
        let id = parse_store_id(id)?;
        let bytes = store.export_image()?;
        self.write_image(&id, &bytes)?;
        debug!("save_store: {} ({} bytes)", id.as_str(), bytes.len());
        Ok(())
    }

    /// Ids of every stored image, sorted.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(IMAGE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Ok(id) = StoreId::try_new(stem) {
                ids.push(id.as_str().to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn image_path(&self, id: &StoreId) -> PathBuf {
        self.root.join(format!("{}.{IMAGE_EXTENSION}", id.as_str()))
    }

    fn write_image(&self, id: &StoreId, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.image_path(id);
        let staging = self.root.join(format!(".{}.{IMAGE_EXTENSION}.tmp", id.as_str()));
        std::fs::write(&staging, bytes)?;
        std::fs::rename(&staging, &path)?;
        Ok(())
    }
}

fn parse_store_id(id: &str) -> Result<StoreId, StoreError> {
    StoreId::try_new(id).map_err(|err| StoreError::InvalidInput(err.message()))
}
