#![forbid(unsafe_code)]

use serde_json::{Value, json};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TraceStep {
    Parse,
    Visit,
    Rewrite,
    Compile,
}

impl TraceStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Visit => "visit",
            Self::Rewrite => "rewrite",
            Self::Compile => "compile",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceEntry {
    pub step: TraceStep,
    pub payload: Value,
}

/// Ordered record of what each pipeline step produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn record(&mut self, step: TraceStep, payload: Value) {
        self.entries.push(TraceEntry { step, payload });
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn steps(&self) -> Vec<TraceStep> {
        self.entries.iter().map(|entry| entry.step).collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .map(|entry| json!({ "step": entry.step.as_str(), "payload": entry.payload }))
                .collect(),
        )
    }
}
