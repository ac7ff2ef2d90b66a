//! Configuration module for Frond
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use frond::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Harvesting {} collections", config.collections.len());
//! ```

mod parser;
pub(crate) mod types;
mod validation;

// Re-export types
pub use types::{
    ChildRule, CollectionDescriptor, Config, ExtractionConfig, HarvesterConfig, ListingRules,
    OutputConfig, ServiceConfig, SourceFormat,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
