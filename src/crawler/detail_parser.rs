//! Athlete profile parsing
//!
//! A profile page has three independent regions: the biography table, the
//! Olympic medal tally and the results table. The source's markup has drifted
//! over time, so each region is located by an ordered list of named
//! [`TableStrategy`]s; the first strategy that finds something wins. A missing
//! region yields empty defaults. Only a page with none of the three regions is
//! rejected, as [`ParseError::NotAnAthleteProfile`].

use crate::storage::{AthleteRecord, EventRecord, MedalClass, MedalTally};
use crate::AthleteId;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use thiserror::Error;

/// Fatal parse failure for a single profile
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Page for athlete {athlete_id} does not look like an athlete profile")]
    NotAnAthleteProfile { athlete_id: AthleteId },
}

/// Everything scraped from one athlete profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AthleteDetail {
    pub record: AthleteRecord,
    pub events: Vec<EventRecord>,
}

/// One way of finding a region of the profile page
pub trait TableStrategy {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Returns the region's table, or None if this strategy does not apply
    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>>;
}

/// Matches the first element selected by a fixed CSS selector
struct SelectorStrategy {
    name: &'static str,
    selector: &'static str,
}

impl TableStrategy for SelectorStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let selector = Selector::parse(self.selector).ok()?;
        document.select(&selector).next()
    }
}

/// A table whose header cells start with "Roles" and include "Sex"
struct BioHeaderStrategy;

impl TableStrategy for BioHeaderStrategy {
    fn name(&self) -> &'static str {
        "bio-header-labels"
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let table_selector = Selector::parse("table").ok()?;
        let th_selector = Selector::parse("th").ok()?;

        document.select(&table_selector).find(|table| {
            let labels: Vec<String> = table.select(&th_selector).map(compact_text).collect();
            labels.first().map(String::as_str) == Some("Roles")
                && labels.iter().any(|label| label == "Sex")
        })
    }
}

/// A table whose first-column labels include gold, silver and bronze
struct MedalLabelStrategy;

impl TableStrategy for MedalLabelStrategy {
    fn name(&self) -> &'static str {
        "medal-row-labels"
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let table_selector = Selector::parse("table").ok()?;
        let row_selector = Selector::parse("tr").ok()?;
        let cell_selector = Selector::parse("th, td").ok()?;

        document.select(&table_selector).find(|table| {
            let labels: Vec<String> = table
                .select(&row_selector)
                .filter_map(|row| row.select(&cell_selector).next())
                .map(|cell| compact_text(cell).to_lowercase())
                .collect();
            ["gold", "silver", "bronze"]
                .iter()
                .all(|wanted| labels.iter().any(|label| label == wanted))
        })
    }
}

/// The first table following any heading that mentions "Results"
struct ResultsHeadingStrategy;

impl TableStrategy for ResultsHeadingStrategy {
    fn name(&self) -> &'static str {
        "results-heading-sibling"
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let heading_selector = Selector::parse("h2, h3").ok()?;

        document
            .select(&heading_selector)
            .filter(|h| h.text().collect::<String>().contains("Results"))
            .find_map(|heading| {
                heading
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|el| el.value().name() == "table")
            })
    }
}

const BIO_STRATEGIES: [&dyn TableStrategy; 2] = [
    &SelectorStrategy {
        name: "bio-class",
        selector: "table.biodata, div.biographical-information table",
    },
    &BioHeaderStrategy,
];

const MEDAL_STRATEGIES: [&dyn TableStrategy; 2] = [
    &SelectorStrategy {
        name: "medals-class",
        selector: "table.medals-OG, table.medals.OG",
    },
    &MedalLabelStrategy,
];

const RESULTS_STRATEGIES: [&dyn TableStrategy; 1] = [&ResultsHeadingStrategy];

/// Tries each strategy in order and returns the first match
fn locate_region<'a>(
    document: &'a Html,
    strategies: &[&dyn TableStrategy],
    region: &str,
    athlete_id: AthleteId,
) -> Option<ElementRef<'a>> {
    for strategy in strategies {
        if let Some(table) = strategy.locate(document) {
            tracing::trace!(
                "Athlete {}: {} table found by {}",
                athlete_id,
                region,
                strategy.name()
            );
            return Some(table);
        }
    }
    tracing::debug!("Athlete {}: no {} table", athlete_id, region);
    None
}

/// Collapses separator glyphs and whitespace in a rendered name
///
/// Runs of `•`, `·`, `‧` and `.` become a single space, then whitespace is
/// collapsed and trimmed.
///
/// # Example
///
/// ```
/// use olympedia_sync::normalize_name;
///
/// assert_eq!(normalize_name("P·V· Sindhu"), "P V Sindhu");
/// assert_eq!(normalize_name("P.V. Sindhu"), "P V Sindhu");
/// ```
pub fn normalize_name(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || matches!(c, '•' | '·' | '‧' | '.'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses one athlete profile page
pub fn parse_athlete(html: &str, athlete_id: AthleteId) -> Result<AthleteDetail, ParseError> {
    let document = Html::parse_document(html);

    let bio_table = locate_region(&document, &BIO_STRATEGIES, "biography", athlete_id);
    let medal_table = locate_region(&document, &MEDAL_STRATEGIES, "medal", athlete_id);
    let results_table = locate_region(&document, &RESULTS_STRATEGIES, "results", athlete_id);

    if bio_table.is_none() && medal_table.is_none() && results_table.is_none() {
        return Err(ParseError::NotAnAthleteProfile { athlete_id });
    }

    let bio = bio_table.map(parse_bio).unwrap_or_default();
    let field = |key: &str| bio.get(key).cloned().unwrap_or_default();

    let mut used_name = normalize_name(&field("used_name"));
    if used_name.is_empty() {
        used_name = page_heading(&document)
            .map(|h| normalize_name(&h))
            .unwrap_or_default();
    }

    let nationality = bio
        .get("nationality")
        .filter(|v| !v.is_empty())
        .or_else(|| bio.get("noc"))
        .cloned()
        .unwrap_or_default();

    let record = AthleteRecord {
        athlete_id,
        used_name,
        full_name: normalize_name(&field("full_name")),
        sex: field("sex"),
        born: field("born"),
        died: field("died"),
        nationality,
        roles: field("roles"),
        affiliations: field("affiliations"),
        medals_og: medal_table.map(parse_medals).unwrap_or_default(),
    };

    let events = results_table
        .map(|table| parse_results(table, athlete_id))
        .unwrap_or_default();

    Ok(AthleteDetail { record, events })
}

/// Maps every `th`/`td` row of the biography table to `lowercase_key → text`
fn parse_bio(table: ElementRef<'_>) -> HashMap<String, String> {
    let mut bio = HashMap::new();
    let (Ok(row_selector), Ok(th_selector), Ok(td_selector), Ok(a_selector)) = (
        Selector::parse("tr"),
        Selector::parse("th"),
        Selector::parse("td"),
        Selector::parse("a"),
    ) else {
        return bio;
    };

    for row in table.select(&row_selector) {
        let (Some(th), Some(td)) = (row.select(&th_selector).next(), row.select(&td_selector).next())
        else {
            continue;
        };

        let key = compact_text(th).to_lowercase().replace(' ', "_");
        let value = if key == "noc" {
            // The linked country name beats the cell's flag and code clutter
            td.select(&a_selector)
                .next()
                .map(spaced_text)
                .unwrap_or_else(|| spaced_text(td))
        } else {
            spaced_text(td)
        };
        bio.insert(key, value);
    }

    bio
}

fn parse_medals(table: ElementRef<'_>) -> MedalTally {
    let mut medals = MedalTally::new();
    let (Ok(row_selector), Ok(cell_selector)) = (Selector::parse("tr"), Selector::parse("th, td"))
    else {
        return medals;
    };

    for row in table.select(&row_selector) {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_selector).collect();
        if cells.len() < 2 {
            continue;
        }
        let Some(class) = MedalClass::from_label(&compact_text(cells[0])) else {
            continue;
        };
        let value: String = cells[1].text().collect();
        if let Some(count) = first_number(&value) {
            medals.insert(class, count);
        }
    }

    medals
}

/// Turns every row with at least six cells into an event
///
/// Rows that continue the previous Games leave its cell blank; they inherit
/// the last non-empty Games label.
fn parse_results(table: ElementRef<'_>, athlete_id: AthleteId) -> Vec<EventRecord> {
    let mut events = Vec::new();
    let (Ok(row_selector), Ok(td_selector)) = (Selector::parse("tbody tr"), Selector::parse("td"))
    else {
        return events;
    };

    let mut current_games = String::new();
    for row in table.select(&row_selector) {
        let cells: Vec<String> = row.select(&td_selector).map(spaced_text).collect();
        if cells.len() < 6 {
            continue;
        }

        if !cells[0].is_empty() {
            current_games = cells[0].clone();
        }

        events.push(EventRecord {
            athlete_id,
            games: current_games.clone(),
            discipline: cells[1].clone(),
            team: non_empty(&cells[2]),
            pos: non_empty(&cells[3]),
            medal: non_empty(&cells[4]),
            used_as: non_empty(&cells[5]),
        });
    }

    events
}

fn page_heading(document: &Html) -> Option<String> {
    let h1 = Selector::parse("h1").ok()?;
    document
        .select(&h1)
        .next()
        .map(spaced_text)
        .filter(|text| !text.is_empty())
}

/// Text nodes trimmed and joined with single spaces
fn spaced_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text nodes trimmed and joined with nothing between them
fn compact_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// First run of ASCII digits in the text
fn first_number(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
