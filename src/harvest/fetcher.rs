//! Item fetcher: one reference in, one normalized record out
//!
//! A fetch makes a single detail request, applies the extraction map, then
//! runs the configured sub-resource listings (attachments, comments, child
//! pages, answers) through offset pagination scoped to the item. The record
//! is handed back only once every sub-fetch has completed or been marked as
//! partially failed; a record is an atomic, complete-or-marked-incomplete
//! unit.
//!
//! Failure policy: a failed detail fetch fails only this item. A failed
//! sub-fetch or an unextractable field degrades the record (the missing
//! piece is recorded under `metadata.partial_fields`), since schema drift
//! in one field should not discard an otherwise-usable record.

use crate::client::HarvestClient;
use crate::config::{ChildRule, ExtractionConfig, HarvesterConfig, SourceFormat};
use crate::harvest::extract::{html_to_text, pointer, scalar_to_string, selector_text};
use crate::model::{ChildRef, ItemReference, NormalizedRecord};
use crate::source::{fill_template, OffsetWindow};
use crate::{FrondError, Result};
use scraper::Html;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Rule value that short-circuits to the reference id instead of extracting
const REFERENCE_RULE: &str = "@reference";

/// Fetches and normalizes single items
pub struct ItemFetcher {
    client: Arc<HarvestClient>,
    extraction: Arc<ExtractionConfig>,
    page_size: u64,
    page_delay: Duration,
}

/// Fields pulled out of a detail document before children are attached
struct ExtractedFields {
    id: String,
    title: String,
    body_text: String,
    metadata: BTreeMap<String, Value>,
}

impl ItemFetcher {
    pub fn new(
        client: Arc<HarvestClient>,
        extraction: Arc<ExtractionConfig>,
        harvester: &HarvesterConfig,
    ) -> Self {
        Self {
            client,
            extraction,
            page_size: harvester.page_size,
            page_delay: Duration::from_millis(harvester.page_delay_ms),
        }
    }

    /// Retrieves an item's full detail and normalizes it into a record
    pub async fn fetch(&self, item: &ItemReference) -> Result<NormalizedRecord> {
        let url = self
            .client
            .resolve(&item.locator)
            .map_err(|e| item_error(item, e))?;

        let mut partial: Vec<String> = Vec::new();

        let fields = match self.extraction.source {
            SourceFormat::Json => {
                let detail = self
                    .client
                    .get_json(&url)
                    .await
                    .map_err(|e| item_error(item, e))?;
                self.extract_json(&detail, item, &mut partial)
            }
            SourceFormat::Html => {
                let page = self
                    .client
                    .get_text(&url)
                    .await
                    .map_err(|e| item_error(item, e))?;
                self.extract_html(&page, item, &mut partial)
            }
        };

        let mut metadata = fields.metadata;
        metadata.insert("collection".to_string(), Value::String(item.collection.clone()));

        let mut children = Vec::new();
        for rule in &self.extraction.children {
            match self.fetch_children(item, rule).await {
                Ok(mut refs) => children.append(&mut refs),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Sub-fetch '{}' for item {} failed: {}",
                        rule.kind,
                        item.id,
                        e
                    );
                    partial.push(format!("children:{}", rule.kind));
                }
            }
        }

        if !partial.is_empty() {
            metadata.insert(
                "partial_fields".to_string(),
                Value::Array(partial.into_iter().map(Value::String).collect()),
            );
        }

        Ok(NormalizedRecord {
            id: fields.id,
            title: fields.title,
            body_text: fields.body_text,
            metadata,
            children,
        })
    }

    /// Applies pointer rules to a structured detail document
    fn extract_json(
        &self,
        detail: &Value,
        item: &ItemReference,
        partial: &mut Vec<String>,
    ) -> ExtractedFields {
        let rules = &self.extraction;

        let id = if rules.id == REFERENCE_RULE {
            item.id.clone()
        } else {
            match pointer(detail, &rules.id).as_ref().and_then(scalar_to_string) {
                Some(id) => id,
                None => {
                    partial.push("id".to_string());
                    item.id.clone()
                }
            }
        };

        let title = match pointer(detail, &rules.title)
            .as_ref()
            .and_then(scalar_to_string)
        {
            Some(title) => title,
            None => {
                partial.push("title".to_string());
                String::new()
            }
        };

        let body_raw = match pointer(detail, &rules.body)
            .as_ref()
            .and_then(scalar_to_string)
        {
            Some(body) => body,
            None => {
                partial.push("body".to_string());
                String::new()
            }
        };
        let body_text = if rules.body_is_html {
            html_to_text(&body_raw)
        } else {
            body_raw
        };

        let mut metadata = BTreeMap::new();
        for (field, rule) in &rules.metadata {
            match pointer(detail, rule) {
                Some(value) => {
                    metadata.insert(field.clone(), value);
                }
                None => {
                    partial.push(field.clone());
                    metadata.insert(field.clone(), Value::Null);
                }
            }
        }

        ExtractedFields {
            id,
            title,
            body_text,
            metadata,
        }
    }

    /// Applies selector rules to a rendered detail page
    fn extract_html(
        &self,
        page: &str,
        item: &ItemReference,
        partial: &mut Vec<String>,
    ) -> ExtractedFields {
        let rules = &self.extraction;
        let document = Html::parse_document(page);

        let id = if rules.id == REFERENCE_RULE {
            item.id.clone()
        } else {
            match selector_text(&document, &rules.id) {
                Some(id) if !id.is_empty() => id,
                _ => {
                    partial.push("id".to_string());
                    item.id.clone()
                }
            }
        };

        let title = match selector_text(&document, &rules.title) {
            Some(title) => title,
            None => {
                partial.push("title".to_string());
                String::new()
            }
        };

        // selector_text already strips markup, body-is-html is implicit here
        let body_text = match selector_text(&document, &rules.body) {
            Some(body) => body,
            None => {
                partial.push("body".to_string());
                String::new()
            }
        };

        let mut metadata = BTreeMap::new();
        for (field, rule) in &rules.metadata {
            match selector_text(&document, rule) {
                Some(value) => {
                    metadata.insert(field.clone(), Value::String(value));
                }
                None => {
                    partial.push(field.clone());
                    metadata.insert(field.clone(), Value::Null);
                }
            }
        }

        ExtractedFields {
            id,
            title,
            body_text,
            metadata,
        }
    }

    /// Pages through one sub-resource listing, flattening stubs into
    /// shallow child references
    async fn fetch_children(
        &self,
        item: &ItemReference,
        rule: &ChildRule,
    ) -> Result<Vec<ChildRef>> {
        let locator = fill_template(&rule.locator, &item.id);
        let url = self.client.resolve(&locator)?;

        let mut window = OffsetWindow::open(
            self.client.clone(),
            url,
            self.extraction.listing.clone(),
            self.page_size,
            self.page_delay,
        );

        let mut children = Vec::new();
        while let Some(stubs) = window.next_page().await? {
            for stub in &stubs {
                children.push(child_from_stub(rule, stub));
            }
        }
        Ok(children)
    }
}

/// Builds one shallow child reference from a listing stub
fn child_from_stub(rule: &ChildRule, stub: &Value) -> ChildRef {
    let optional = |path: &Option<String>| {
        path.as_deref()
            .and_then(|p| pointer(stub, p))
            .as_ref()
            .and_then(scalar_to_string)
            .unwrap_or_default()
    };

    let body_raw = optional(&rule.body);
    let body = if rule.body_is_html {
        html_to_text(&body_raw)
    } else {
        body_raw
    };

    ChildRef {
        kind: rule.kind.clone(),
        id: pointer(stub, &rule.id)
            .as_ref()
            .and_then(scalar_to_string)
            .unwrap_or_default(),
        author: optional(&rule.author),
        timestamp: optional(&rule.timestamp),
        body,
    }
}

/// Maps a per-item failure to `ItemFetch`, preserving run-fatal errors
fn item_error(item: &ItemReference, error: FrondError) -> FrondError {
    if error.is_fatal() {
        error
    } else {
        FrondError::ItemFetch {
            id: item.id.clone(),
            locator: item.locator.clone(),
            reason: error.to_string(),
        }
    }
}
