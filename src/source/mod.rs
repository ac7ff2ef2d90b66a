//! Page sources: lazy enumeration of paginated remote collections
//!
//! A page source turns one remote collection into a finite sequence of
//! [`ItemReference`]s, one page at a time. Two strategies exist:
//!
//! - [`OffsetWindow`]: numeric start/limit windows against a structured
//!   listing endpoint, advancing by the number of stubs actually returned.
//! - [`LinkFollow`]: fetches rendered pages and follows a "next" pointer
//!   extracted from each page until none is found.
//!
//! Sequences are not restartable: each `open` starts a fresh cursor at the
//! collection's beginning. Resumption is handled at the sink level by
//! skipping already-written ids, not by cursor checkpointing. Re-opening a
//! source against a stable remote with the same page size reproduces the
//! same reference sequence.

mod link;
mod offset;

pub use link::LinkFollow;
pub use offset::OffsetWindow;

use crate::client::HarvestClient;
use crate::config::{CollectionDescriptor, ExtractionConfig, HarvesterConfig};
use crate::harvest::extract;
use crate::model::{ItemReference, PaginationProtocol};
use crate::{FrondError, Result};
use std::sync::Arc;
use url::Url;

/// Opaque position in a remote collection.
///
/// Monotonically advances; never moves backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Numeric offset into a structured listing
    Offset { start: u64 },

    /// Locator of the next rendered page to fetch
    Next(Url),
}

/// Replaces every `{id}` in a locator template
pub fn fill_template(template: &str, id: &str) -> String {
    template.replace("{id}", id)
}

/// A collection-level page source, selected by the collection's protocol
pub enum PageSource {
    Offset {
        window: OffsetWindow,
        collection: String,
        stub_id_rule: String,
        item_locator: String,
    },
    Link(LinkFollow),
}

impl PageSource {
    /// Opens a fresh source at the start of the given collection
    pub fn open(
        client: Arc<HarvestClient>,
        descriptor: &CollectionDescriptor,
        extraction: &ExtractionConfig,
        harvester: &HarvesterConfig,
    ) -> Result<Self> {
        match descriptor.protocol {
            PaginationProtocol::Offset => {
                let listing_url = client.resolve(&descriptor.locator)?;
                let window = OffsetWindow::open(
                    client,
                    listing_url,
                    extraction.listing.clone(),
                    harvester.page_size,
                    std::time::Duration::from_millis(harvester.page_delay_ms),
                );
                // Validation guarantees item_locator is present for offset
                let item_locator = descriptor
                    .item_locator
                    .clone()
                    .unwrap_or_default();

                Ok(PageSource::Offset {
                    window,
                    collection: descriptor.id.clone(),
                    stub_id_rule: extraction.listing.id.clone(),
                    item_locator,
                })
            }
            PaginationProtocol::LinkFollow => Ok(PageSource::Link(LinkFollow::open(
                client,
                descriptor,
                std::time::Duration::from_millis(harvester.page_delay_ms),
            )?)),
        }
    }

    /// Yields the next page of item references, or `None` at end of
    /// collection.
    ///
    /// Any transport failure here aborts the collection: a truncated listing
    /// is indistinguishable from a legitimate end, so it must never be
    /// silently tolerated. Authorization rejections pass through untouched
    /// because they are fatal to the whole run, not just this collection.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ItemReference>>> {
        match self {
            PageSource::Offset {
                window,
                collection,
                stub_id_rule,
                item_locator,
            } => {
                let stubs = window
                    .next_page()
                    .await
                    .map_err(|e| collection_error(collection, e))?;

                let Some(stubs) = stubs else {
                    return Ok(None);
                };

                let mut refs = Vec::with_capacity(stubs.len());
                for stub in &stubs {
                    let id = extract::pointer(stub, stub_id_rule)
                        .as_ref()
                        .and_then(extract::scalar_to_string);
                    match id {
                        Some(id) => refs.push(ItemReference {
                            locator: fill_template(item_locator, &id),
                            id,
                            collection: collection.clone(),
                        }),
                        None => {
                            tracing::warn!(
                                "Listing stub in '{}' has no id at '{}', skipping",
                                collection,
                                stub_id_rule
                            );
                        }
                    }
                }
                Ok(Some(refs))
            }
            PageSource::Link(source) => {
                let collection = source.collection().to_string();
                source
                    .next_page()
                    .await
                    .map_err(|e| collection_error(&collection, e))
            }
        }
    }
}

/// Maps a page-level failure to `CollectionUnavailable`, preserving
/// run-fatal errors.
fn collection_error(collection: &str, error: FrondError) -> FrondError {
    if error.is_fatal() {
        error
    } else {
        FrondError::CollectionUnavailable {
            collection: collection.to_string(),
            reason: error.to_string(),
        }
    }
}
