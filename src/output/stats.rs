//! Statistics generation from the sync database
//!
//! This module provides functionality for extracting and displaying
//! store-wide statistics from the storage layer.

use crate::storage::{RunRecord, Storage};
use crate::SyncError;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Athlete rows
    pub athletes: u64,

    /// Event rows
    pub events: u64,

    /// Athletes with at least one event
    pub athletes_with_events: u64,

    /// Athletes with at least one Olympic medal
    pub medalists: u64,

    /// Most recent sync run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(SyncError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<StoreStatistics, SyncError> {
    Ok(StoreStatistics {
        athletes: storage.count_athletes()?,
        events: storage.count_events()?,
        athletes_with_events: storage.count_athletes_with_events()?,
        medalists: storage.count_medalists()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Store Statistics ===\n");

    println!("Overview:");
    println!("  Athletes: {}", stats.athletes);
    println!("  Events: {}", stats.events);
    println!(
        "  Athletes with events: {} ({:.1}%)",
        stats.athletes_with_events,
        percentage(stats.athletes_with_events, stats.athletes)
    );
    println!(
        "  Olympic medalists: {} ({:.1}%)",
        stats.medalists,
        percentage(stats.medalists, stats.athletes)
    );
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  ID: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!(
                "  Discovered {} / skipped {} / fetched {} / failed {} / persisted {}",
                run.counts.discovered,
                run.counts.skipped_known,
                run.counts.fetched,
                run.counts.failed,
                run.counts.persisted
            );
        }
        None => println!("No sync runs recorded yet."),
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        0.0
    }
}
