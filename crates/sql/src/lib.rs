#![forbid(unsafe_code)]

//! SQL preprocessor: turns statements over the logical views into SQLite
//! statements over the physical state tables.
//!
//! The pipeline is `parse -> visit -> rewrite -> compile`; every step leaves
//! an entry in the returned [`Trace`].

pub mod ast;
pub mod compile;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod rewrite;
pub mod trace;
pub mod views;
pub mod visit;

pub use ast::{Statement, StatementKind};
pub use compile::{CompiledStatement, compile};
pub use error::{PreprocessError, Result};
pub use parser::parse;
pub use rewrite::rewrite;
pub use trace::{Trace, TraceEntry, TraceStep};
pub use views::{LogicalView, referenced_views};

use serde_json::json;
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq)]
pub struct Preprocessed {
    pub statements: Vec<CompiledStatement>,
    pub views: BTreeSet<LogicalView>,
    pub trace: Trace,
}

impl Preprocessed {
    /// True when any statement reads or writes a `*_by_version` view.
    pub fn touches_all_versions(&self) -> bool {
        self.views.iter().any(|view| view.is_by_version())
    }
}

pub fn preprocess(sql: &str) -> Result<Preprocessed> {
    let mut trace = Trace::default();

    let statement = parse(sql)?;
    let segments = match &statement {
        Statement::Segmented(segmented) => segmented
            .statements
            .iter()
            .map(|inner| inner.kind().as_str())
            .collect::<Vec<_>>(),
        other => vec![other.kind().as_str()],
    };
    trace.record(
        TraceStep::Parse,
        json!({ "kind": statement.kind().as_str(), "segments": segments }),
    );

    let views = referenced_views(&statement)?;
    trace.record(
        TraceStep::Visit,
        json!({ "views": views.iter().map(|view| view.name()).collect::<Vec<_>>() }),
    );

    let rewritten = rewrite(&statement)?;
    trace.record(
        TraceStep::Rewrite,
        json!({ "changed": !rewritten.ptr_eq(&statement) }),
    );

    let statements = compile(&rewritten);
    trace.record(
        TraceStep::Compile,
        json!({
            "sql": statements.iter().map(|compiled| compiled.sql.as_str()).collect::<Vec<_>>(),
        }),
    );

    Ok(Preprocessed {
        statements,
        views,
        trace,
    })
}
