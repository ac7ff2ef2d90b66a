//! Dispatcher: streaming fan-out of item fetches under a concurrency bound
//!
//! Collections are harvested in order. Within a collection, pagination runs
//! as a producer task feeding a bounded channel, and item fetches are fanned
//! out into a pool of at most `concurrency` in-flight futures; items from
//! page 1 are already being fetched while page 2 is still in transit.
//! Completion order is unspecified; the sink does not rely on it.
//!
//! Per-item failures are isolated: each becomes a structured failure event
//! and the remaining references proceed. Two conditions abort the whole run:
//! an authorization rejection (credentials are run-wide) and the total
//! failure count crossing the configured threshold (the remote is likely
//! down, continuing wastes quota). On abort, nothing new is dispatched and
//! in-flight fetches drain before the error is returned.

use crate::client::HarvestClient;
use crate::config::{CollectionDescriptor, Config};
use crate::harvest::fetcher::ItemFetcher;
use crate::model::{FailureEvent, ItemReference, NormalizedRecord};
use crate::output::{FailureLog, JsonlSink, RunSummary};
use crate::source::PageSource;
use crate::{FrondError, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Progress is logged every this many completed items
const PROGRESS_INTERVAL: u64 = 25;

/// Drives page sources and fans item fetches out to a bounded pool
pub struct Dispatcher {
    client: Arc<HarvestClient>,
    config: Arc<Config>,
    sink: Arc<JsonlSink>,
    failures: Arc<FailureLog>,
}

impl Dispatcher {
    pub fn new(
        client: Arc<HarvestClient>,
        config: Arc<Config>,
        sink: Arc<JsonlSink>,
        failures: Arc<FailureLog>,
    ) -> Self {
        Self {
            client,
            config,
            sink,
            failures,
        }
    }

    /// Harvests every configured collection in order.
    ///
    /// An unavailable collection is logged prominently (its output likely
    /// under-counts) and the run continues with the next one; fatal errors
    /// end the run immediately.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::start(self.sink.checkpoint_len() as u64);

        for descriptor in &self.config.collections {
            tracing::info!(
                "Harvesting collection '{}' ({} via {:?})",
                descriptor.id,
                descriptor.locator,
                descriptor.protocol
            );

            match self.harvest_collection(descriptor, &mut summary).await {
                Ok(()) => {
                    summary.collections_completed += 1;
                }
                Err(e) if e.is_fatal() => {
                    summary.finish();
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(
                        "Collection '{}' aborted, dataset likely incomplete: {}",
                        descriptor.id,
                        e
                    );
                    summary.collections_unavailable += 1;
                }
            }
        }

        summary.finish();
        Ok(summary)
    }

    /// Harvests one collection: paginate, dispatch, collect
    async fn harvest_collection(
        &self,
        descriptor: &CollectionDescriptor,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let concurrency = self.config.harvester.concurrency as usize;

        let mut source = PageSource::open(
            self.client.clone(),
            descriptor,
            &self.config.extraction,
            &self.config.harvester,
        )?;

        // Streaming producer: pagination stays sequential while fetches for
        // already-discovered references run concurrently. The bounded channel
        // applies backpressure so listing never runs far ahead of fetching.
        let (tx, mut rx) = mpsc::channel::<Result<ItemReference>>(concurrency * 2);
        let producer = tokio::spawn(async move {
            loop {
                match source.next_page().await {
                    Ok(Some(refs)) => {
                        for item in refs {
                            if tx.send(Ok(item)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        let fetcher = Arc::new(ItemFetcher::new(
            self.client.clone(),
            Arc::new(self.config.extraction.clone()),
            &self.config.harvester,
        ));

        let mut in_flight = FuturesUnordered::new();
        let mut channel_open = true;
        let mut pagination_failure: Option<FrondError> = None;
        let mut fatal: Option<FrondError> = None;

        while channel_open || !in_flight.is_empty() {
            tokio::select! {
                message = rx.recv(), if channel_open && in_flight.len() < concurrency => {
                    match message {
                        Some(Ok(item)) => {
                            if self.sink.contains(&item.id) {
                                tracing::debug!("Skipping already-harvested item {}", item.id);
                                summary.items_skipped += 1;
                                continue;
                            }
                            in_flight.push(fetch_one(fetcher.clone(), item));
                        }
                        Some(Err(e)) => {
                            channel_open = false;
                            if e.is_fatal() {
                                fatal = Some(e);
                                rx.close();
                            } else {
                                pagination_failure = Some(e);
                            }
                        }
                        None => channel_open = false,
                    }
                }
                Some((item, outcome)) = in_flight.next(), if !in_flight.is_empty() => {
                    self.handle_completion(item, outcome, summary, &mut fatal);
                    if fatal.is_some() {
                        channel_open = false;
                        rx.close();
                    }

                    let processed = summary.records_written + summary.items_failed as u64
                        + summary.items_skipped;
                    if processed % PROGRESS_INTERVAL == 0 {
                        tracing::info!(
                            "Progress: {} written, {} skipped, {} failed, {} in flight",
                            summary.records_written,
                            summary.items_skipped,
                            summary.items_failed,
                            in_flight.len()
                        );
                    }
                }
            }
        }

        // Fatal paths stop the producer mid-pagination; normal completion
        // lets it finish on its own.
        producer.abort();

        if let Some(e) = fatal {
            return Err(e);
        }
        if let Some(e) = pagination_failure {
            return Err(e);
        }
        Ok(())
    }

    /// Records one completed fetch: write the record or log the failure,
    /// escalating when the run-wide failure threshold is crossed
    fn handle_completion(
        &self,
        item: ItemReference,
        outcome: Result<NormalizedRecord>,
        summary: &mut RunSummary,
        fatal: &mut Option<FrondError>,
    ) {
        match outcome {
            Ok(record) => match self.sink.write(&record) {
                Ok(true) => summary.records_written += 1,
                Ok(false) => {
                    tracing::debug!("Duplicate id {} within run, not rewritten", record.id);
                    summary.items_skipped += 1;
                }
                Err(e) => *fatal = Some(e),
            },
            Err(e) if e.is_fatal() => *fatal = Some(e),
            Err(e) => {
                summary.items_failed += 1;
                let event = FailureEvent::new(&item, e.to_string());
                tracing::warn!("Item {} failed: {}", event.id, event.reason);

                if let Err(log_error) = self.failures.write(&event) {
                    *fatal = Some(log_error);
                    return;
                }

                if summary.items_failed >= self.config.harvester.failure_threshold {
                    *fatal = Some(FrondError::FailureThreshold {
                        failures: summary.items_failed,
                    });
                }
            }
        }
    }
}

/// One worker future: fetch a reference, keep its identity with the outcome
async fn fetch_one(
    fetcher: Arc<ItemFetcher>,
    item: ItemReference,
) -> (ItemReference, Result<NormalizedRecord>) {
    let outcome = fetcher.fetch(&item).await;
    (item, outcome)
}
