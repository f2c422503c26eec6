#![forbid(unsafe_code)]

mod core;
mod files;
mod graph;
mod indexes;
mod state;

/// Every table the schema creates; anything else in the file is foreign.
pub(super) const TABLES: &[&str] = &[
    "meta",
    "snapshot",
    "change",
    "change_set",
    "change_set_element",
    "commits",
    "commit_edge",
    "version",
    "label",
    "commit_label",
    "conflicts",
    "internal_state_cache",
    "internal_state_cache_status",
    "internal_state_untracked",
    "internal_state_writer",
    "internal_active_version",
    "internal_runtime",
    "file_descriptor",
    "file_data",
];

pub(super) fn full_schema_sql() -> String {
    let mut sql = String::new();
    sql.push_str(core::SQL);
    sql.push_str(graph::SQL);
    sql.push_str(state::SQL);
    sql.push_str(files::SQL);
    sql.push_str(indexes::SQL);
    sql
}
