#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS commits (
          id TEXT PRIMARY KEY,
          change_set_id TEXT NOT NULL UNIQUE REFERENCES change_set(id),
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS commit_edge (
          parent_id TEXT NOT NULL REFERENCES commits(id),
          child_id TEXT NOT NULL REFERENCES commits(id),
          PRIMARY KEY (parent_id, child_id),
          CHECK (parent_id <> child_id)
        );

        CREATE TABLE IF NOT EXISTS version (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL UNIQUE,
          commit_id TEXT NOT NULL REFERENCES commits(id),
          working_commit_id TEXT NOT NULL REFERENCES commits(id),
          inherits_from_version_id TEXT REFERENCES version(id),
          CHECK (commit_id <> working_commit_id),
          CHECK (inherits_from_version_id IS NULL OR inherits_from_version_id <> id)
        );

        CREATE TABLE IF NOT EXISTS label (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL UNIQUE
        );

        INSERT OR IGNORE INTO label(id, name) VALUES ('checkpoint', 'checkpoint');
        INSERT OR IGNORE INTO label(id, name) VALUES ('merge', 'merge');

        CREATE TRIGGER IF NOT EXISTS label_no_delete
        BEFORE DELETE ON label
        BEGIN
          SELECT RAISE(ABORT, 'labels are append-only');
        END;

        CREATE TABLE IF NOT EXISTS commit_label (
          commit_id TEXT NOT NULL REFERENCES commits(id),
          label_id TEXT NOT NULL REFERENCES label(id),
          PRIMARY KEY (commit_id, label_id)
        );

        CREATE TRIGGER IF NOT EXISTS commit_label_no_delete
        BEFORE DELETE ON commit_label
        BEGIN
          SELECT RAISE(ABORT, 'labels are append-only');
        END;

        CREATE TABLE IF NOT EXISTS conflicts (
          id TEXT PRIMARY KEY,
          change_id TEXT NOT NULL REFERENCES change(id),
          conflicting_change_id TEXT NOT NULL REFERENCES change(id),
          reason TEXT NOT NULL CHECK (reason IN ('divergent_change', 'delete_modify')),
          resolved_with_change_id TEXT REFERENCES change(id),
          created_at TEXT NOT NULL,
          UNIQUE (change_id, conflicting_change_id),
          CHECK (change_id <> conflicting_change_id),
          CHECK (
            resolved_with_change_id IS NULL
            OR resolved_with_change_id IN (change_id, conflicting_change_id)
          )
        );
"#;
