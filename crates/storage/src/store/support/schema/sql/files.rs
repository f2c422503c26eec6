#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS file_descriptor (
          id TEXT PRIMARY KEY,
          path TEXT NOT NULL UNIQUE,
          plugin_key TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS file_data (
          file_id TEXT NOT NULL REFERENCES file_descriptor(id),
          version_id TEXT NOT NULL REFERENCES version(id),
          data BLOB NOT NULL,
          PRIMARY KEY (file_id, version_id)
        );
"#;
