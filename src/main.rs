//! Frond main entry point
//!
//! Command-line interface for the Frond content-tree harvester.

use clap::Parser;
use frond::config::load_config_with_hash;
use frond::harvest::run_harvest;
use frond::output::print_summary;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Frond: an incremental content-tree harvester
///
/// Frond enumerates paginated remote collections (wiki spaces, Q&A topics),
/// fetches each item's full detail, and appends normalized records to a
/// newline-delimited JSON dataset. Interrupted runs resume by skipping items
/// already present in the output.
#[derive(Parser, Debug)]
#[command(name = "frond")]
#[command(version)]
#[command(about = "An incremental content-tree harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume into an existing dataset, skipping harvested items (default)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start fresh, truncating the dataset and failure log
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be harvested without fetching
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((config, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &config_hash);
        return Ok(());
    }

    handle_harvest(config, cli.fresh).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("frond=info,warn"),
            1 => EnvFilter::new("frond=debug,info"),
            2 => EnvFilter::new("frond=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be
/// harvested
fn handle_dry_run(config: &frond::Config, config_hash: &str) {
    println!("=== Frond Dry Run ===\n");

    println!("Config hash: {}", config_hash);

    println!("\nHarvester:");
    println!("  Concurrency: {}", config.harvester.concurrency);
    println!("  Page size: {}", config.harvester.page_size);
    println!("  Page delay: {}ms", config.harvester.page_delay_ms);
    println!("  Max retries: {}", config.harvester.max_retries);
    println!("  Failure threshold: {}", config.harvester.failure_threshold);

    println!("\nService:");
    println!("  Base URL: {}", config.service.base_url);
    match &config.service.token_env {
        Some(var) => println!("  Token from: ${}", var),
        None => println!("  Token from: (unauthenticated)"),
    }

    println!("\nOutput:");
    println!("  Dataset: {}", config.output.dataset_path);
    println!("  Failure log: {}", config.output.failure_log_path);

    println!("\nCollections ({}):", config.collections.len());
    for collection in &config.collections {
        println!(
            "  - {} [{:?}/{:?}] {}",
            collection.id, collection.kind, collection.protocol, collection.locator
        );
    }

    println!(
        "\nExtraction: {:?} source, {} metadata fields, {} child kinds",
        config.extraction.source,
        config.extraction.metadata.len(),
        config.extraction.children.len()
    );

    println!("\n✓ Configuration is valid");
}

/// Handles the main harvest operation
async fn handle_harvest(config: frond::Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh harvest (truncating previous output)");
    } else {
        tracing::info!("Starting harvest (will resume into existing output)");
    }

    let dataset_path = config.output.dataset_path.clone();
    let failure_log_path = config.output.failure_log_path.clone();

    match run_harvest(config, fresh).await {
        Ok(summary) => {
            tracing::info!("Harvest completed");
            print_summary(&summary, &dataset_path, &failure_log_path);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
