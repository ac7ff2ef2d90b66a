use crate::config::types::{
    CollectionDescriptor, Config, ExtractionConfig, HarvesterConfig, OutputConfig, ServiceConfig,
};
use crate::model::PaginationProtocol;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvester_config(&config.harvester)?;
    validate_service_config(&config.service)?;
    validate_output_config(&config.output)?;
    validate_collections(&config.collections)?;
    validate_extraction_config(&config.extraction)?;
    Ok(())
}

/// Validates harvester configuration
fn validate_harvester_config(config: &HarvesterConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "page-size must be >= 1, got {}",
            config.page_size
        )));
    }

    if config.failure_threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "failure-threshold must be >= 1, got {}",
            config.failure_threshold
        )));
    }

    Ok(())
}

/// Validates remote service configuration
fn validate_service_config(config: &ServiceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if let Some(var) = &config.token_env {
        if var.is_empty() {
            return Err(ConfigError::Validation(
                "token-env cannot be empty when present".to_string(),
            ));
        }
    }

    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.dataset_path.is_empty() {
        return Err(ConfigError::Validation(
            "dataset-path cannot be empty".to_string(),
        ));
    }

    if config.failure_log_path.is_empty() {
        return Err(ConfigError::Validation(
            "failure-log-path cannot be empty".to_string(),
        ));
    }

    if config.dataset_path == config.failure_log_path {
        return Err(ConfigError::Validation(
            "dataset-path and failure-log-path must differ".to_string(),
        ));
    }

    Ok(())
}

/// Validates collection descriptors
fn validate_collections(collections: &[CollectionDescriptor]) -> Result<(), ConfigError> {
    if collections.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[collection]] is required".to_string(),
        ));
    }

    for descriptor in collections {
        if descriptor.id.is_empty() {
            return Err(ConfigError::Validation(
                "collection id cannot be empty".to_string(),
            ));
        }

        if descriptor.locator.is_empty() {
            return Err(ConfigError::Validation(format!(
                "collection '{}' has an empty locator",
                descriptor.id
            )));
        }

        match descriptor.protocol {
            PaginationProtocol::Offset => {
                let template = descriptor.item_locator.as_deref().unwrap_or("");
                if !template.contains("{id}") {
                    return Err(ConfigError::Validation(format!(
                        "offset collection '{}' needs an item-locator containing {{id}}",
                        descriptor.id
                    )));
                }
            }
            PaginationProtocol::LinkFollow => {
                if descriptor.item_selector.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "link-follow collection '{}' needs an item-selector",
                        descriptor.id
                    )));
                }
                if descriptor.next_selector.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "link-follow collection '{}' needs a next-selector",
                        descriptor.id
                    )));
                }
            }
        }
    }

    // Duplicate collection ids would make per-collection reporting ambiguous
    for (i, a) in collections.iter().enumerate() {
        if collections.iter().skip(i + 1).any(|b| b.id == a.id) {
            return Err(ConfigError::Validation(format!(
                "duplicate collection id '{}'",
                a.id
            )));
        }
    }

    Ok(())
}

/// Validates the extraction map
fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    for (name, rule) in [
        ("extraction.id", &config.id),
        ("extraction.title", &config.title),
        ("extraction.body", &config.body),
    ] {
        if rule.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    for (field, rule) in &config.metadata {
        if rule.is_empty() {
            return Err(ConfigError::Validation(format!(
                "extraction.metadata.{} cannot be empty",
                field
            )));
        }
    }

    for child in &config.children {
        if child.kind.is_empty() {
            return Err(ConfigError::Validation(
                "extraction child kind cannot be empty".to_string(),
            ));
        }
        if !child.locator.contains("{id}") {
            return Err(ConfigError::Validation(format!(
                "child '{}' locator must contain {{id}}",
                child.kind
            )));
        }
        if child.id.is_empty() {
            return Err(ConfigError::Validation(format!(
                "child '{}' needs an id rule",
                child.kind
            )));
        }
    }

    Ok(())
}
