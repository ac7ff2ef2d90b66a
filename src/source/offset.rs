//! Offset-window pagination over a structured listing endpoint
//!
//! Mirrors the common `start`/`limit` listing protocol: each request asks
//! for `limit` stubs beginning at `start`, and the response carries the
//! stub array plus a "more pages" signal. The window advances by the number
//! of stubs actually returned: the last page may be short, and advancing
//! by the configured limit instead would skip items.

use crate::client::HarvestClient;
use crate::config::ListingRules;
use crate::harvest::extract;
use crate::source::Cursor;
use crate::{FrondError, Result};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Paginates a structured listing endpoint, yielding raw item stubs.
///
/// Used both for collection listings (stubs become [`crate::model::ItemReference`]s)
/// and for an item's sub-resources (stubs become shallow child references).
pub struct OffsetWindow {
    client: Arc<HarvestClient>,
    listing_url: Url,
    rules: ListingRules,
    page_size: u64,
    page_delay: Duration,
    cursor: Cursor,
    first_page: bool,
    done: bool,
}

impl OffsetWindow {
    /// Opens a window at the start of the listing
    pub fn open(
        client: Arc<HarvestClient>,
        listing_url: Url,
        rules: ListingRules,
        page_size: u64,
        page_delay: Duration,
    ) -> Self {
        Self {
            client,
            listing_url,
            rules,
            page_size,
            page_delay,
            cursor: Cursor::Offset { start: 0 },
            first_page: true,
            done: false,
        }
    }

    /// Fetches the next page of stubs, or `None` once the listing is
    /// exhausted.
    ///
    /// An empty page ends the sequence even when the server still reports a
    /// "next" signal; looping on a next-that-yields-nothing would never
    /// terminate.
    pub async fn next_page(&mut self) -> Result<Option<Vec<serde_json::Value>>> {
        if self.done {
            return Ok(None);
        }

        if !self.first_page && !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }
        self.first_page = false;

        let start = match &self.cursor {
            Cursor::Offset { start } => *start,
            Cursor::Next(_) => unreachable!("offset window always holds an offset cursor"),
        };

        let url = page_url(&self.listing_url, start, self.page_size);
        let body = self.client.get_json(&url).await?;

        let stubs = match extract::pointer(&body, &self.rules.results) {
            Some(serde_json::Value::Array(stubs)) => stubs,
            _ => {
                return Err(FrondError::Transport {
                    url: url.to_string(),
                    reason: format!("listing has no stub array at '{}'", self.rules.results),
                });
            }
        };

        let has_next = extract::pointer(&body, &self.rules.next)
            .map(|v| !v.is_null())
            .unwrap_or(false);

        if stubs.is_empty() {
            if has_next {
                tracing::warn!(
                    "Empty listing page at start={} still signals more; treating as end",
                    start
                );
            }
            self.done = true;
            return Ok(None);
        }

        if has_next {
            self.cursor = Cursor::Offset {
                start: start + stubs.len() as u64,
            };
        } else {
            self.done = true;
        }

        Ok(Some(stubs))
    }
}

/// Builds the page request URL with start/limit window parameters
fn page_url(listing_url: &Url, start: u64, limit: u64) -> Url {
    let mut url = listing_url.clone();
    url.query_pairs_mut()
        .append_pair("start", &start.to_string())
        .append_pair("limit", &limit.to_string());
    url
}
