//! Output module: the resumable dataset sink, failure log, and run summary

mod jsonl;
mod stats;

pub use jsonl::{FailureLog, JsonlSink};
pub use stats::{print_summary, RunSummary};
