#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS internal_state_cache (
          entity_id TEXT NOT NULL,
          schema_key TEXT NOT NULL,
          file_id TEXT NOT NULL,
          version_id TEXT NOT NULL,
          plugin_key TEXT NOT NULL,
          schema_version TEXT NOT NULL,
          snapshot_content TEXT,
          change_id TEXT NOT NULL,
          metadata TEXT,
          created_at TEXT NOT NULL,
          inherited_from_version_id TEXT,
          is_deleted INTEGER NOT NULL DEFAULT 0 CHECK (is_deleted IN (0, 1)),
          PRIMARY KEY (entity_id, schema_key, file_id, version_id)
        );

        CREATE TABLE IF NOT EXISTS internal_state_cache_status (
          version_id TEXT PRIMARY KEY,
          complete INTEGER NOT NULL CHECK (complete IN (0, 1))
        );

        CREATE TABLE IF NOT EXISTS internal_state_untracked (
          entity_id TEXT NOT NULL,
          schema_key TEXT NOT NULL,
          file_id TEXT NOT NULL,
          version_id TEXT NOT NULL,
          plugin_key TEXT NOT NULL,
          schema_version TEXT NOT NULL,
          snapshot_content TEXT NOT NULL,
          metadata TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          PRIMARY KEY (entity_id, schema_key, file_id, version_id)
        );

        CREATE TABLE IF NOT EXISTS internal_state_writer (
          seq INTEGER PRIMARY KEY,
          entity_id TEXT,
          schema_key TEXT,
          file_id TEXT,
          plugin_key TEXT,
          snapshot_content TEXT,
          schema_version TEXT,
          version_id TEXT,
          metadata TEXT,
          untracked INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS internal_active_version (
          singleton INTEGER PRIMARY KEY CHECK (singleton = 1),
          version_id TEXT NOT NULL REFERENCES version(id)
        );

        CREATE TABLE IF NOT EXISTS internal_runtime (
          singleton INTEGER PRIMARY KEY CHECK (singleton = 1),
          deterministic INTEGER NOT NULL CHECK (deterministic IN (0, 1)),
          seed INTEGER NOT NULL,
          sequence INTEGER NOT NULL
        );

        CREATE VIEW IF NOT EXISTS internal_state_reader AS
          SELECT
            c.entity_id,
            c.schema_key,
            c.file_id,
            c.version_id,
            c.plugin_key,
            c.snapshot_content,
            c.schema_version,
            c.change_id,
            c.metadata,
            c.inherited_from_version_id,
            0 AS untracked
          FROM internal_state_cache c
          WHERE c.is_deleted = 0
            AND NOT EXISTS (
              SELECT 1 FROM internal_state_untracked u
              WHERE u.entity_id = c.entity_id
                AND u.schema_key = c.schema_key
                AND u.file_id = c.file_id
                AND u.version_id = c.version_id
            )
          UNION ALL
          SELECT
            u.entity_id,
            u.schema_key,
            u.file_id,
            u.version_id,
            u.plugin_key,
            u.snapshot_content,
            u.schema_version,
            'untracked' AS change_id,
            u.metadata,
            NULL AS inherited_from_version_id,
            1 AS untracked
          FROM internal_state_untracked u;
"#;
