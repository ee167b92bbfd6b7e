//! Rendering of the derived `disciplines` / `events` athlete fields

use std::collections::BTreeSet;

/// Separator between rendered appearances in `athletes.events`
pub const EVENT_SEPARATOR: &str = " | ";

/// Separator between disciplines in `athletes.disciplines`
pub const DISCIPLINE_SEPARATOR: &str = ", ";

/// What one rollup pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollupOutcome {
    /// Athletes whose derived fields were recomputed from their events
    pub rolled_up: u64,
    /// Athletes without events whose derived fields were cleared
    pub cleared: u64,
}

/// Renders one appearance as `games — discipline [pos] [medal]`
///
/// The bracketed parts are omitted when absent.
pub fn format_event_line(
    games: &str,
    discipline: &str,
    pos: Option<&str>,
    medal: Option<&str>,
) -> String {
    let mut line = format!("{} — {}", games, discipline);
    for part in [pos, medal].into_iter().flatten() {
        line.push_str(" [");
        line.push_str(part);
        line.push(']');
    }
    line
}

/// Accumulates one athlete's events, in rollup order, into derived text
#[derive(Debug, Default)]
pub(crate) struct AthleteRollup {
    disciplines: BTreeSet<String>,
    lines: Vec<String>,
}

impl AthleteRollup {
    pub(crate) fn push(
        &mut self,
        games: &str,
        discipline: &str,
        pos: Option<&str>,
        medal: Option<&str>,
    ) {
        self.disciplines.insert(discipline.to_string());
        self.lines
            .push(format_event_line(games, discipline, pos, medal));
    }

    /// Returns `(disciplines, events)`
    pub(crate) fn finish(self) -> (String, String) {
        let disciplines = self
            .disciplines
            .into_iter()
            .collect::<Vec<_>>()
            .join(DISCIPLINE_SEPARATOR);
        (disciplines, self.lines.join(EVENT_SEPARATOR))
    }
}
