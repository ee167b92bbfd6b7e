//! Olympedia-Sync main entry point
//!
//! This is the command-line interface for the Olympedia delegation sync.

use clap::Parser;
use olympedia_sync::config::{load_config_with_hash, Config};
use olympedia_sync::crawler::{athlete_url, country_url, Coordinator, SyncOptions};
use olympedia_sync::output::{load_statistics, print_statistics, print_summary};
use olympedia_sync::storage::{open_storage, Storage};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Olympedia-Sync: an incremental delegation crawler
///
/// Discovers every athlete of one national Olympic delegation, scrapes their
/// biography, medal tally and results, and keeps a SQLite store in sync.
/// Athletes already in the store are never fetched again unless asked.
#[derive(Parser, Debug)]
#[command(name = "olympedia-sync")]
#[command(version = "1.0.0")]
#[command(about = "An incremental Olympedia delegation crawler", long_about = None)]
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

    /// Re-scrape athletes that are already stored
    #[arg(long)]
    refresh: bool,

    /// Skip discovery and re-scrape this athlete (repeatable)
    #[arg(long = "athlete", value_name = "ID")]
    athletes: Vec<u32>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "rollup"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "rollup"])]
    stats: bool,

    /// Recompute derived athlete fields and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    rollup: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &cli.athletes)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.rollup {
        handle_rollup(&config)?;
    } else {
        let options = SyncOptions {
            refresh: cli.refresh,
            targets: cli.athletes,
        };
        handle_sync(config, config_hash, options).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("olympedia_sync=info,warn"),
            1 => EnvFilter::new("olympedia_sync=debug,info"),
            2 => EnvFilter::new("olympedia_sync=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, targets: &[u32]) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Olympedia-Sync Dry Run ===\n");

    println!("Source:");
    println!("  Base URL: {}", config.source.base_url);
    println!("  Delegation: {}", config.source.country_code);

    println!("\nCrawler Configuration:");
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Retries: {} (backoff {}ms, doubling)",
        config.crawler.max_retries, config.crawler.retry_backoff_ms
    );
    println!(
        "  Concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    match config.crawler.flush_every {
        0 => println!("  Batching: one batch per pass"),
        n => println!("  Batching: flush every {} athletes", n),
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let base_url = Url::parse(&config.source.base_url)?;
    if targets.is_empty() {
        println!("\n✓ Configuration is valid");
        println!(
            "✓ Would start discovery at {}",
            country_url(&base_url, &config.source.country_code)?
        );
    } else {
        println!("\n✓ Configuration is valid");
        println!("✓ Would re-scrape {} athletes:", targets.len());
        for id in targets {
            println!("    * {}", athlete_url(&base_url, *id)?);
        }
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --rollup mode: recomputes derived fields only
fn handle_rollup(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = open_storage(Path::new(&config.output.database_path))?;
    let outcome = storage.run_rollup()?;

    println!(
        "✓ Rollup complete: {} athletes updated, {} cleared",
        outcome.rolled_up, outcome.cleared
    );

    Ok(())
}

/// Handles the main sync operation
async fn handle_sync(
    config: Config,
    config_hash: String,
    options: SyncOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    if options.refresh {
        tracing::info!("Refresh mode: stored athletes will be scraped again");
    }

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let mut coordinator = Coordinator::new(config, storage, config_hash, options)?;

    // Ctrl-C stops scheduling new fetches; the pass then flushes and aborts
    let interrupted = coordinator.interrupt_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight fetches");
            interrupted.store(true, Ordering::SeqCst);
        }
    });

    match coordinator.run().await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Sync failed: {}", e);
            Err(e.into())
        }
    }
}
