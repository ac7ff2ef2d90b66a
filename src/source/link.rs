//! Link-follow pagination over rendered listing pages
//!
//! Fetches the collection's landing page, extracts item links with a
//! configured selector, then follows the page's "next" pointer until a page
//! has none. Both item and next locators resolve against the original
//! collection locator rather than the page they appeared on; nested relative
//! references otherwise drift away from the collection root.

use crate::client::HarvestClient;
use crate::config::CollectionDescriptor;
use crate::model::ItemReference;
use crate::source::Cursor;
use crate::{ConfigError, FrondError, Result};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Paginates a rendered listing by following "next" links
pub struct LinkFollow {
    client: Arc<HarvestClient>,
    collection: String,
    /// Original collection locator; all relative hrefs resolve against this
    origin: Url,
    item_selector: Selector,
    next_selector: Selector,
    cursor: Option<Cursor>,
    /// Pages already fetched, to break next-link cycles
    visited: HashSet<String>,
    /// Item locators already yielded, to keep references unique
    seen_items: HashSet<String>,
    page_delay: Duration,
    first_page: bool,
}

impl LinkFollow {
    /// Opens the source at the collection's landing locator
    pub fn open(
        client: Arc<HarvestClient>,
        descriptor: &CollectionDescriptor,
        page_delay: Duration,
    ) -> Result<Self> {
        let origin = client.resolve(&descriptor.locator)?;

        let item_selector = parse_selector(descriptor.item_selector.as_deref().unwrap_or(""))?;
        let next_selector = parse_selector(descriptor.next_selector.as_deref().unwrap_or(""))?;

        Ok(Self {
            client,
            collection: descriptor.id.clone(),
            cursor: Some(Cursor::Next(origin.clone())),
            origin,
            item_selector,
            next_selector,
            visited: HashSet::new(),
            seen_items: HashSet::new(),
            page_delay,
            first_page: true,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Fetches the next listing page, or `None` once no "next" link remains.
    ///
    /// A page yielding no item links ends the sequence even if it carries a
    /// "next" pointer, and a "next" pointing at an already-fetched page is
    /// treated as the end rather than a cycle to follow.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ItemReference>>> {
        let Some(Cursor::Next(url)) = self.cursor.take() else {
            return Ok(None);
        };

        if !self.first_page && !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }
        self.first_page = false;

        self.visited.insert(url.to_string());
        let html = self.client.get_text(&url).await?;

        let (refs, next) = self.extract_page(&html);

        if refs.is_empty() {
            if next.is_some() {
                tracing::warn!(
                    "Listing page {} has no items but still links onward; treating as end",
                    url
                );
            }
            return Ok(None);
        }

        self.cursor = match next {
            Some(n) if self.visited.contains(n.as_str()) => {
                tracing::warn!("Next link on {} cycles back to a visited page", url);
                None
            }
            other => other.map(Cursor::Next),
        };

        Ok(Some(refs))
    }

    /// Extracts item references and the next-page locator from one page
    fn extract_page(&mut self, html: &str) -> (Vec<ItemReference>, Option<Url>) {
        let document = Html::parse_document(html);

        let mut refs = Vec::new();
        for element in document.select(&self.item_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Ok(absolute) = self.origin.join(href.trim()) else {
                continue;
            };
            if absolute.scheme() != "http" && absolute.scheme() != "https" {
                continue;
            }
            if self.seen_items.insert(absolute.to_string()) {
                refs.push(ItemReference {
                    id: absolute.to_string(),
                    locator: absolute.to_string(),
                    collection: self.collection.clone(),
                });
            }
        }

        let next = document
            .select(&self.next_selector)
            .next()
            .and_then(|element| element.value().attr("href"))
            .and_then(|href| self.origin.join(href.trim()).ok());

        (refs, next)
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| {
        FrondError::Config(ConfigError::Validation(format!(
            "invalid CSS selector '{}': {}",
            css, e
        )))
    })
}
