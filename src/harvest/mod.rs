//! Harvest module: fetching, extraction, and dispatch
//!
//! This module contains the core harvesting logic:
//! - Field extraction from structured and rendered detail documents
//! - Per-item fetching with sub-resource flattening
//! - Concurrency-bounded dispatch with failure isolation

mod dispatcher;
pub(crate) mod extract;
mod fetcher;

pub use dispatcher::Dispatcher;
pub use extract::{html_to_text, pointer};
pub use fetcher::ItemFetcher;

use crate::client::HarvestClient;
use crate::config::Config;
use crate::output::{FailureLog, JsonlSink, RunSummary};
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Runs a complete harvest.
///
/// Constructs the run's client and sink, then harvests every configured
/// collection. With `fresh` set the output target is truncated; otherwise an
/// existing dataset seeds the checkpoint and already-written items are
/// skipped, making the re-run idempotent.
pub async fn run_harvest(config: Config, fresh: bool) -> Result<RunSummary> {
    let client = Arc::new(HarvestClient::new(&config.service, &config.harvester)?);

    let dataset_path = Path::new(&config.output.dataset_path);
    let sink = if fresh {
        Arc::new(JsonlSink::create(dataset_path)?)
    } else {
        Arc::new(JsonlSink::resume(dataset_path)?)
    };

    if sink.checkpoint_len() > 0 {
        tracing::info!(
            "Resuming: {} items already in {}",
            sink.checkpoint_len(),
            config.output.dataset_path
        );
    }

    let failures = Arc::new(FailureLog::open(
        Path::new(&config.output.failure_log_path),
        fresh,
    )?);

    let dispatcher = Dispatcher::new(client, Arc::new(config), sink, failures);
    dispatcher.run().await
}
