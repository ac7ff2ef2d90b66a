use crate::model::{CollectionKind, PaginationProtocol};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Frond
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvester: HarvesterConfig,
    pub service: ServiceConfig,
    pub output: OutputConfig,
    #[serde(rename = "collection", default)]
    pub collections: Vec<CollectionDescriptor>,
    pub extraction: ExtractionConfig,
}

/// Harvester behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarvesterConfig {
    /// Maximum number of item fetches in flight at once
    pub concurrency: u32,

    /// Number of item stubs requested per listing page
    #[serde(rename = "page-size")]
    pub page_size: u64,

    /// Courtesy delay between listing page requests (milliseconds)
    #[serde(rename = "page-delay-ms")]
    pub page_delay_ms: u64,

    /// Minimum spacing between any two remote requests (milliseconds)
    #[serde(rename = "request-interval-ms", default)]
    pub request_interval_ms: u64,

    /// Retry attempts for transient transport failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base backoff before the first retry (milliseconds, doubles per attempt)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Total failed items that abort the whole run
    #[serde(rename = "failure-threshold")]
    pub failure_threshold: u32,
}

/// Remote service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the content service; relative locators resolve against it
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Name of the environment variable holding the bearer token.
    ///
    /// When absent the client sends unauthenticated requests (useful against
    /// local test fixtures). Credential acquisition itself stays external.
    #[serde(rename = "token-env", default)]
    pub token_env: Option<String>,

    /// User agent string sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("frond/{}", env!("CARGO_PKG_VERSION"))
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the newline-delimited JSON dataset
    #[serde(rename = "dataset-path")]
    pub dataset_path: String,

    /// Path of the newline-delimited JSON failure log
    #[serde(rename = "failure-log-path")]
    pub failure_log_path: String,
}

/// Descriptor of one remote collection to harvest.
///
/// Immutable, operator-provided. `item-locator` is required for the offset
/// protocol (a `{id}` template for item detail endpoints); `item-selector`
/// and `next-selector` are required for link-follow.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionDescriptor {
    /// Collection identifier (space key, topic id)
    pub id: String,

    /// Collection kind
    pub kind: CollectionKind,

    /// Pagination protocol used for enumeration
    pub protocol: PaginationProtocol,

    /// Listing locator: API path with query for offset, landing page URL
    /// for link-follow
    pub locator: String,

    /// Detail locator template, `{id}` replaced per item (offset protocol)
    #[serde(rename = "item-locator", default)]
    pub item_locator: Option<String>,

    /// CSS selector matching item links on a listing page (link-follow)
    #[serde(rename = "item-selector", default)]
    pub item_selector: Option<String>,

    /// CSS selector matching the "next page" link (link-follow)
    #[serde(rename = "next-selector", default)]
    pub next_selector: Option<String>,
}

/// Detail-document format the extraction rules apply to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceFormat {
    /// Structured API responses; rules are JSON pointer paths
    Json,
    /// Rendered pages; rules are CSS selectors
    Html,
}

/// Rules for decoding one structured listing page.
///
/// Defaults match the common `results`/`_links.next` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingRules {
    /// Pointer to the array of item stubs
    #[serde(default = "default_results_path")]
    pub results: String,

    /// Pointer to the "more pages" signal (absent or null means done)
    #[serde(default = "default_next_path")]
    pub next: String,

    /// Pointer to an item stub's identifier
    #[serde(default = "default_stub_id_path")]
    pub id: String,
}

fn default_results_path() -> String {
    "/results".to_string()
}

fn default_next_path() -> String {
    "/_links/next".to_string()
}

fn default_stub_id_path() -> String {
    "/id".to_string()
}

impl Default for ListingRules {
    fn default() -> Self {
        Self {
            results: default_results_path(),
            next: default_next_path(),
            id: default_stub_id_path(),
        }
    }
}

/// One paginated sub-resource of an item, flattened into shallow child
/// references (attachments, comments, child pages, answers).
#[derive(Debug, Clone, Deserialize)]
pub struct ChildRule {
    /// Child kind recorded on each reference
    pub kind: String,

    /// Listing locator template, `{id}` replaced with the parent item id
    pub locator: String,

    /// Pointer to the child id
    pub id: String,

    /// Pointer to the author display name
    #[serde(default)]
    pub author: Option<String>,

    /// Pointer to the child timestamp
    #[serde(default)]
    pub timestamp: Option<String>,

    /// Pointer to the child body (file name for attachments)
    #[serde(default)]
    pub body: Option<String>,

    /// Whether the child body carries markup to strip
    #[serde(rename = "body-is-html", default)]
    pub body_is_html: bool,
}

/// The field-extraction map driving normalization.
///
/// For `source = "json"` every rule is a JSON pointer path (a `*` segment
/// fans out over arrays, e.g. `/metadata/labels/results/*/name`). For
/// `source = "html"` the `id`, `title`, `body` and metadata rules are CSS
/// selectors; child sub-resources are structured endpoints in either case.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Detail-document format
    pub source: SourceFormat,

    /// Rule extracting the item id (falls back to the reference id)
    pub id: String,

    /// Rule extracting the title
    pub title: String,

    /// Rule extracting the body
    pub body: String,

    /// Whether the extracted body carries markup to strip (json source;
    /// html-source bodies are always stripped)
    #[serde(rename = "body-is-html", default)]
    pub body_is_html: bool,

    /// Metadata field name to extraction rule
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Listing envelope rules for offset pagination
    #[serde(default)]
    pub listing: ListingRules,

    /// Sub-resources flattened into shallow children
    #[serde(default)]
    pub children: Vec<ChildRule>,
}
