#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS snapshot (
          id TEXT PRIMARY KEY,
          content TEXT,
          CHECK (content IS NULL OR json_valid(content)),
          CHECK ((id = 'no-content') = (content IS NULL))
        );

        INSERT OR IGNORE INTO snapshot(id, content) VALUES ('no-content', NULL);

        CREATE TRIGGER IF NOT EXISTS snapshot_no_update
        BEFORE UPDATE ON snapshot
        BEGIN
          SELECT RAISE(ABORT, 'snapshots are immutable');
        END;

        CREATE TABLE IF NOT EXISTS change (
          id TEXT PRIMARY KEY,
          entity_id TEXT NOT NULL,
          schema_key TEXT NOT NULL,
          file_id TEXT NOT NULL,
          plugin_key TEXT NOT NULL,
          snapshot_id TEXT NOT NULL REFERENCES snapshot(id),
          schema_version TEXT NOT NULL,
          created_at TEXT NOT NULL,
          metadata TEXT,
          CHECK (metadata IS NULL OR json_valid(metadata))
        );

        CREATE TRIGGER IF NOT EXISTS change_no_update
        BEFORE UPDATE ON change
        BEGIN
          SELECT RAISE(ABORT, 'changes are immutable');
        END;

        CREATE TRIGGER IF NOT EXISTS change_no_delete
        BEFORE DELETE ON change
        BEGIN
          SELECT RAISE(ABORT, 'changes are immutable');
        END;

        CREATE TABLE IF NOT EXISTS change_set (
          id TEXT PRIMARY KEY,
          immutable INTEGER NOT NULL DEFAULT 0 CHECK (immutable IN (0, 1))
        );

        CREATE TRIGGER IF NOT EXISTS change_set_stays_immutable
        BEFORE UPDATE OF immutable ON change_set
        WHEN OLD.immutable = 1 AND NEW.immutable = 0
        BEGIN
          SELECT RAISE(ABORT, 'change set is immutable');
        END;

        CREATE TABLE IF NOT EXISTS change_set_element (
          change_set_id TEXT NOT NULL REFERENCES change_set(id),
          change_id TEXT NOT NULL REFERENCES change(id),
          entity_id TEXT NOT NULL,
          schema_key TEXT NOT NULL,
          file_id TEXT NOT NULL,
          PRIMARY KEY (change_set_id, entity_id, schema_key, file_id)
        );

        CREATE TRIGGER IF NOT EXISTS change_set_element_immutable_insert
        BEFORE INSERT ON change_set_element
        WHEN (SELECT immutable FROM change_set WHERE id = NEW.change_set_id) = 1
        BEGIN
          SELECT RAISE(ABORT, 'change set is immutable');
        END;

        CREATE TRIGGER IF NOT EXISTS change_set_element_immutable_update
        BEFORE UPDATE ON change_set_element
        WHEN (SELECT immutable FROM change_set WHERE id = OLD.change_set_id) = 1
        BEGIN
          SELECT RAISE(ABORT, 'change set is immutable');
        END;

        CREATE TRIGGER IF NOT EXISTS change_set_element_immutable_delete
        BEFORE DELETE ON change_set_element
        WHEN (SELECT immutable FROM change_set WHERE id = OLD.change_set_id) = 1
        BEGIN
          SELECT RAISE(ABORT, 'change set is immutable');
        END;
"#;
