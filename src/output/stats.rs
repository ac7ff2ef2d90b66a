//! Run summary and operator-facing reporting

use chrono::{DateTime, Utc};

/// Counters accumulated over one harvest run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished (None while still in progress)
    pub finished_at: Option<DateTime<Utc>>,

    /// Ids already present in the output when the run started
    pub checkpoint_seeded: u64,

    /// Collections fully harvested
    pub collections_completed: u32,

    /// Collections whose pagination aborted (dataset likely under-counts)
    pub collections_unavailable: u32,

    /// Records appended to the dataset this run
    pub records_written: u64,

    /// Items skipped because their id was already recorded
    pub items_skipped: u64,

    /// Items that failed after retries; detailed in the failure log
    pub items_failed: u32,
}

impl RunSummary {
    /// Starts a summary for a run whose checkpoint already holds
    /// `checkpoint_seeded` ids
    pub fn start(checkpoint_seeded: u64) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            checkpoint_seeded,
            collections_completed: 0,
            collections_unavailable: 0,
            records_written: 0,
            items_skipped: 0,
            items_failed: 0,
        }
    }

    /// Marks the run finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration in seconds, up to now while unfinished
    pub fn duration_seconds(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds()
    }
}

/// Prints the end-of-run summary to stdout
pub fn print_summary(summary: &RunSummary, dataset_path: &str, failure_log_path: &str) {
    println!("=== Harvest Summary ===\n");

    println!(
        "Collections: {} completed, {} unavailable",
        summary.collections_completed, summary.collections_unavailable
    );
    if summary.checkpoint_seeded > 0 {
        println!("Resumed over {} existing records", summary.checkpoint_seeded);
    }
    println!("Records written: {}", summary.records_written);
    println!("Items skipped (already harvested): {}", summary.items_skipped);
    println!("Items failed: {}", summary.items_failed);
    println!("Duration: {}s", summary.duration_seconds());
    println!();

    println!("Dataset: {}", dataset_path);
    if summary.items_failed > 0 {
        println!("Failure details: {}", failure_log_path);
    }
}
