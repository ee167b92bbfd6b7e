//! Phase definitions for one sync pass

use std::fmt;

/// The phase a sync pass is in
///
/// A pass walks `DiscoverEditions → DiscoverAthletes → FilterKnown →
/// FetchDetail → Accumulate → PersistBatch → Rollup → Done`. `FetchDetail`
/// and `Accumulate` alternate once per athlete, and `PersistBatch` may hand
/// control back to `FetchDetail` when intermediate flushes are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    // ===== Discovery =====
    /// Reading the delegation page for edition identifiers
    DiscoverEditions,

    /// Reading edition pages for athlete identifiers
    DiscoverAthletes,

    /// Dropping identifiers already known to the store or to this pass
    FilterKnown,

    // ===== Detail =====
    /// Fetching and parsing one athlete profile
    FetchDetail,

    /// Adding a parsed athlete to the in-memory batch
    Accumulate,

    // ===== Persistence =====
    /// Upserting athletes, then inserting their events
    PersistBatch,

    /// Recomputing derived athlete fields
    Rollup,

    // ===== Terminal =====
    /// Pass finished
    Done,

    /// Pass stopped early; whatever was accumulated has been flushed
    Aborted,
}

impl SyncPhase {
    /// Returns true for `Done` and `Aborted`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Checks whether moving from `self` to `next` is a legal step
    ///
    /// Any non-terminal phase may move to `PersistBatch` (flush before abort)
    /// or straight to `Aborted`. Terminal phases never move again.
    pub fn can_transition_to(&self, next: SyncPhase) -> bool {
        use SyncPhase::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Aborted | PersistBatch) {
            return true;
        }

        matches!(
            (*self, next),
            (DiscoverEditions, DiscoverAthletes)
                | (DiscoverAthletes, DiscoverAthletes)
                | (DiscoverAthletes, FilterKnown)
                | (FilterKnown, FetchDetail)
                | (FilterKnown, Rollup)
                | (FetchDetail, Accumulate)
                | (FetchDetail, FetchDetail)
                | (Accumulate, FetchDetail)
                | (PersistBatch, FetchDetail)
                | (PersistBatch, Rollup)
                | (Rollup, Done)
        )
    }

    /// Returns the snake_case name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiscoverEditions => "discover_editions",
            Self::DiscoverAthletes => "discover_athletes",
            Self::FilterKnown => "filter_known",
            Self::FetchDetail => "fetch_detail",
            Self::Accumulate => "accumulate",
            Self::PersistBatch => "persist_batch",
            Self::Rollup => "rollup",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
