#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"
        CREATE INDEX IF NOT EXISTS idx_commit_edge_child
          ON commit_edge(child_id, parent_id);

        CREATE INDEX IF NOT EXISTS idx_change_entity
          ON change(entity_id, schema_key, file_id, created_at, id);

        CREATE INDEX IF NOT EXISTS idx_change_set_element_change
          ON change_set_element(change_id);

        CREATE INDEX IF NOT EXISTS idx_change_set_element_entity
          ON change_set_element(entity_id, schema_key, file_id);

        CREATE INDEX IF NOT EXISTS idx_version_inherits
          ON version(inherits_from_version_id);

        CREATE INDEX IF NOT EXISTS idx_state_cache_version
          ON internal_state_cache(version_id);
"#;
