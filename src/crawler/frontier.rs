//! Dedup tracker deciding which discovered athletes need a detail fetch

use crate::AthleteId;
use std::collections::HashSet;

/// Outcome of offering a discovered athlete ID to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// New to this pass and not in the store: fetch it
    Fetch,
    /// Already persisted by an earlier pass
    AlreadyStored,
    /// Already claimed earlier in this pass
    AlreadySeen,
}

/// Known-plus-seen set of athlete IDs for one pass
///
/// The coordinator owns the only instance and claims IDs before any fetch is
/// scheduled, so no ID is ever handed to two workers.
#[derive(Debug, Default)]
pub struct Frontier {
    known: HashSet<AthleteId>,
    seen: HashSet<AthleteId>,
    refresh: bool,
}

impl Frontier {
    /// Creates a frontier over the IDs already in the store
    ///
    /// With `refresh` set, stored IDs are fetched again (once each).
    pub fn new(known: HashSet<AthleteId>, refresh: bool) -> Self {
        Self {
            known,
            seen: HashSet::new(),
            refresh,
        }
    }

    /// Decides whether `id` needs a fetch and records it as seen
    pub fn claim(&mut self, id: AthleteId) -> Claim {
        if !self.seen.insert(id) {
            return Claim::AlreadySeen;
        }
        if !self.refresh && self.known.contains(&id) {
            return Claim::AlreadyStored;
        }
        Claim::Fetch
    }

    /// Number of IDs the store had at the start of the pass
    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    /// Number of distinct IDs offered during this pass
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
