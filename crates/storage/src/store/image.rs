#![forbid(unsafe_code)]

//! Whole-store images: the SQLite file of a store as one byte buffer.

use super::*;
use rusqlite::DatabaseName;
use rusqlite::backup::Progress;

const SQLITE_HEADER: &[u8] = b"SQLite format 3\0";
const IMAGE_FILE_NAME: &str = "store.sqlite";

/// Cheap check that `bytes` can be a SQLite database at all.
pub(crate) fn check_image_header(bytes: &[u8]) -> Result<(), StoreError> {
    if bytes.len() < 100 || !bytes.starts_with(SQLITE_HEADER) {
        return Err(StoreError::MalformedImage("not a sqlite database"));
    }
    Ok(())
}

impl SqliteStore {
    /// Serializes the whole store, runtime sequence included.
    pub fn export_image(&mut self) -> Result<Vec<u8>, StoreError> {
        self.runtime.flush(&self.conn)?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(IMAGE_FILE_NAME);
        self.conn.backup(DatabaseName::Main, &path, None)?;
        let bytes = std::fs::read(&path)?;
        debug!("export_image: {} bytes", bytes.len());
        Ok(bytes)
    }

    /// Opens an in-memory store from an image produced by
    /// [`SqliteStore::export_image`].
    pub fn from_image(bytes: &[u8], config: StoreConfig) -> Result<Self, StoreError> {
        check_image_header(bytes)?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(IMAGE_FILE_NAME);
        std::fs::write(&path, bytes)?;

        let mut conn = Connection::open_in_memory()?;
        conn.restore(DatabaseName::Main, &path, None::<fn(Progress)>)
            .map_err(|_| StoreError::MalformedImage("unreadable database"))?;

        let integrity: String = conn
            .query_row("PRAGMA quick_check", [], |row| row.get(0))
            .map_err(|_| StoreError::MalformedImage("unreadable database"))?;
        if integrity != "ok" {
            return Err(StoreError::MalformedImage("database failed integrity check"));
        }

        let has_meta = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name='meta'",
                [],
                |_| Ok(()),
            )
            .optional()
            .map_err(|_| StoreError::MalformedImage("unreadable database"))?;
        if has_meta.is_none() {
            return Err(StoreError::MalformedImage("not a store image"));
        }
        preflight_gate(&conn).map_err(|_| StoreError::MalformedImage("not a store image"))?;

        debug!("from_image: {} bytes", bytes.len());
        Self::from_connection(conn, config)
    }
}
