//! Crawler module for discovering and fetching athlete profiles
//!
//! This module contains the core sync logic, including:
//! - HTTP fetching with pacing and retry logic
//! - Listing-page and profile-page parsing
//! - The dedup frontier
//! - Overall pass coordination

mod coordinator;
mod detail_parser;
mod fetcher;
mod frontier;
mod list_parser;
mod pacer;

pub use coordinator::{Coordinator, SyncOptions};
pub use detail_parser::{normalize_name, parse_athlete, AthleteDetail, ParseError, TableStrategy};
pub use fetcher::{build_http_client, FetchError, Fetcher, RawPage, RetryPolicy};
pub use frontier::{Claim, Frontier};
pub use list_parser::{
    athlete_url, country_url, edition_url, extract_athlete_ids, extract_edition_ids, EditionId,
};
pub use pacer::Pacer;

use crate::config::Config;
use crate::output::SyncSummary;
use crate::storage::open_storage;
use crate::SyncError;
use std::path::Path;

/// Runs a complete sync pass against the configured database
///
/// This is the main entry point for a pass. It will:
/// 1. Open the storage layer
/// 2. Discover editions and athletes (unless targets are given)
/// 3. Fetch and parse every athlete not yet stored
/// 4. Persist athletes, then events
/// 5. Run the rollup
///
/// The database connection is closed when the pass returns, on every path.
///
/// # Arguments
///
/// * `config` - The sync configuration
/// * `config_hash` - Hash recorded on the run row
/// * `options` - Refresh / targeted re-scrape switches
pub async fn sync(
    config: Config,
    config_hash: String,
    options: SyncOptions,
) -> Result<SyncSummary, SyncError> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let mut coordinator = Coordinator::new(config, storage, config_hash, options)?;
    coordinator.run().await
}
