//! Output module for sync summaries and store reports
//!
//! This module handles:
//! - The per-pass `SyncSummary` returned by the coordinator
//! - Printing pass summaries for operators
//! - Store-wide statistics (`--stats`)

pub mod stats;

pub use stats::{load_statistics, print_statistics, StoreStatistics};

use crate::state::SyncPhase;
use crate::storage::{RollupOutcome, RunCounts, RunStatus};
use std::time::Duration;

/// What one sync pass did
#[derive(Debug, Clone)]
pub struct SyncSummary {
    /// Run row in the ledger
    pub run_id: i64,

    /// Completed or aborted
    pub status: RunStatus,

    /// Phase the pass ended in (`Done` or `Aborted`)
    pub phase: SyncPhase,

    /// Editions found on the country page
    pub editions: usize,

    /// Edition pages that could not be fetched and were skipped
    pub failed_editions: usize,

    /// Athlete counters, as recorded on the run row
    pub counts: RunCounts,

    /// Event rows actually inserted (duplicates excluded)
    pub events_inserted: u64,

    /// Rollup result, if the pass got that far
    pub rollup: Option<RollupOutcome>,

    /// Wall-clock duration of the pass
    pub elapsed: Duration,
}

impl SyncSummary {
    /// True when the pass ran to `Done`
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Prints a pass summary to stdout
///
/// Re-running after an aborted or partially failed pass only fetches the
/// athletes that are still missing, so the counts below are what an operator
/// needs to decide whether to run again.
pub fn print_summary(summary: &SyncSummary) {
    println!("=== Sync Run {} ===\n", summary.run_id);

    println!("Status: {} (phase: {})", summary.status.to_db_string(), summary.phase);
    println!("Duration: {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    println!("Editions:");
    println!("  Found: {}", summary.editions);
    println!("  Skipped (fetch failed): {}", summary.failed_editions);
    println!();

    let counts = &summary.counts;
    println!("Athletes:");
    println!("  Discovered: {}", counts.discovered);
    println!("  Skipped (already stored): {}", counts.skipped_known);
    println!("  Fetched: {}", counts.fetched);
    println!("  Failed: {}", counts.failed);
    println!("  Persisted: {}", counts.persisted);
    println!();

    println!("Events inserted: {}", summary.events_inserted);

    match summary.rollup {
        Some(rollup) => println!(
            "Rollup: {} athletes updated, {} cleared",
            rollup.rolled_up, rollup.cleared
        ),
        None => println!("Rollup: not run"),
    }

    if counts.failed > 0 || !summary.is_complete() {
        println!();
        println!("Some athletes are missing; re-run to fetch only those.");
    }
}
