//! Frond: an incremental content-tree harvester
//!
//! This crate harvests hierarchically organized content from a remote,
//! access-controlled document service (wiki spaces of pages with attachments,
//! comments and child pages, or Q&A topics with answers) and materializes it
//! as a flat newline-delimited JSON dataset for downstream indexing.

pub mod client;
pub mod config;
pub mod harvest;
pub mod model;
pub mod output;
pub mod source;

use thiserror::Error;

/// Main error type for Frond operations
#[derive(Debug, Error)]
pub enum FrondError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credential environment variable '{var}' is not set")]
    MissingToken { var: String },

    #[error("Authorization rejected (HTTP {status}) for {url}")]
    Authorization { url: String, status: u16 },

    #[error("Transport failure for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Collection '{collection}' unavailable: {reason}")]
    CollectionUnavailable { collection: String, reason: String },

    #[error("Failed to fetch item {id} ({locator}): {reason}")]
    ItemFetch {
        id: String,
        locator: String,
        reason: String,
    },

    #[error("Failure threshold crossed: {failures} items failed")]
    FailureThreshold { failures: u32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrondError {
    /// Returns true for errors that must abort the entire run.
    ///
    /// Credentials and configuration are run-wide, so an authorization
    /// rejection or a bad extraction rule anywhere makes further requests
    /// pointless. A crossed failure threshold ends the run, and an I/O
    /// failure on the output target means nothing further can be persisted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FrondError::Authorization { .. }
                | FrondError::FailureThreshold { .. }
                | FrondError::MissingToken { .. }
                | FrondError::Config(_)
                | FrondError::Io(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Frond operations
pub type Result<T> = std::result::Result<T, FrondError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use client::HarvestClient;
pub use config::Config;
pub use harvest::run_harvest;
pub use model::{ChildRef, FailureEvent, ItemReference, NormalizedRecord};
pub use output::{JsonlSink, RunSummary};
