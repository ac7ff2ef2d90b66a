//! Core data types for the harvester
//!
//! These are the units that flow through the pipeline: a collection is
//! enumerated into [`ItemReference`]s, each reference is fetched and
//! normalized into a [`NormalizedRecord`], and records (or
//! [`FailureEvent`]s) are appended to the output sink.

use serde::Serialize;
use std::collections::BTreeMap;

/// Kind of remote collection being harvested
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionKind {
    /// Wiki-style space: pages with attachments, comments and child pages
    Space,
    /// Q&A-style topic: questions with answers
    Topic,
}

/// Pagination protocol used to enumerate a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaginationProtocol {
    /// Numeric start/limit windows against a structured listing endpoint
    Offset,
    /// Follow a "next" pointer extracted from each rendered page
    LinkFollow,
}

/// A lightweight pointer to one crawlable item discovered during pagination.
///
/// Produced by a page source, consumed exactly once per crawl attempt by the
/// item fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReference {
    /// Stable item identifier (listing id for structured sources, the
    /// resolved absolute URL for link-follow sources)
    pub id: String,

    /// Locator for the item's full detail (URL or API path)
    pub locator: String,

    /// Identifier of the collection this item was discovered in
    pub collection: String,
}

/// A shallow reference to a sub-item of a record.
///
/// Children are never recursively expanded into full records; this bounds
/// memory and prevents unbounded recursive fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildRef {
    /// Sub-resource kind ("attachment", "comment", "child-page", "answer")
    pub kind: String,

    /// Child identifier
    pub id: String,

    /// Author display name, empty when the source omits it
    pub author: String,

    /// Creation/update timestamp as reported by the source, empty when absent
    pub timestamp: String,

    /// Child body text (file name for attachments), markup stripped
    pub body: String,
}

/// The harvested unit of output: one flat, self-contained record.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedRecord {
    /// Item identifier, unique within one output run
    pub id: String,

    /// Item title
    pub title: String,

    /// Markup-stripped body text with paragraph/line boundaries preserved
    pub body_text: String,

    /// Extracted metadata (labels, version, author, timestamps, ...).
    ///
    /// A `partial_fields` entry lists the logical fields (or
    /// `children:<kind>` sub-fetches) that could not be extracted, so
    /// data-completeness signal is never silently dropped.
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Ordered shallow child references
    pub children: Vec<ChildRef>,
}

/// A structured per-item failure event, recorded to the failure log.
#[derive(Debug, Clone, Serialize)]
pub struct FailureEvent {
    /// Item identifier
    pub id: String,

    /// Item locator that failed
    pub locator: String,

    /// Collection the item belongs to
    pub collection: String,

    /// Human-readable cause
    pub reason: String,

    /// RFC 3339 timestamp of when the failure was recorded
    pub failed_at: String,
}

impl FailureEvent {
    /// Builds a failure event for an item, stamped with the current time.
    pub fn new(item: &ItemReference, reason: impl Into<String>) -> Self {
        Self {
            id: item.id.clone(),
            locator: item.locator.clone(),
            collection: item.collection.clone(),
            reason: reason.into(),
            failed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
