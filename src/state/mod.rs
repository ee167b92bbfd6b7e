//! State module for tracking sync progress
//!
//! # Components
//!
//! - `SyncPhase`: the phase a sync pass is in, from edition discovery to
//!   `Done` (or `Aborted`), with the legal transitions between phases

mod sync_phase;

pub use sync_phase::SyncPhase;
