//! Listing-page parsing
//!
//! Extracts edition identifiers from a delegation's country page and athlete
//! identifiers from an edition page. Both scans degrade to an empty set when
//! the markup changes; they never fail.

use crate::AthleteId;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Source-assigned edition identifier
pub type EditionId = u32;

/// URL of a delegation's country page, e.g. `/countries/IND`
pub fn country_url(base_url: &Url, country_code: &str) -> Result<Url, url::ParseError> {
    base_url.join(&format!("/countries/{}", country_code))
}

/// URL of one edition page of a delegation, e.g. `/countries/IND/editions/61`
pub fn edition_url(
    base_url: &Url,
    country_code: &str,
    edition_id: EditionId,
) -> Result<Url, url::ParseError> {
    base_url.join(&format!(
        "/countries/{}/editions/{}",
        country_code, edition_id
    ))
}

/// URL of an athlete profile, e.g. `/athletes/923441`
pub fn athlete_url(base_url: &Url, athlete_id: AthleteId) -> Result<Url, url::ParseError> {
    base_url.join(&format!("/athletes/{}", athlete_id))
}

/// Extracts the distinct edition IDs linked from a country page
///
/// Only links of the form `/countries/{country_code}/editions/{id}` count.
///
/// # Example
///
/// ```
/// use olympedia_sync::crawler::extract_edition_ids;
/// use url::Url;
///
/// let html = r#"<a href="/countries/IND/editions/61">2020</a>
///               <a href="/countries/IND/editions/5">1920</a>"#;
/// let base = Url::parse("https://www.olympedia.org").unwrap();
/// let ids: Vec<u32> = extract_edition_ids(html, &base, "IND").into_iter().collect();
/// assert_eq!(ids, vec![5, 61]);
/// ```
pub fn extract_edition_ids(html: &str, base_url: &Url, country_code: &str) -> BTreeSet<EditionId> {
    let prefix = ["countries", country_code, "editions"];
    linked_ids(html, base_url, &prefix)
}

/// Extracts the distinct athlete IDs linked from an edition page
pub fn extract_athlete_ids(html: &str, base_url: &Url) -> BTreeSet<AthleteId> {
    linked_ids(html, base_url, &["athletes"])
}

/// Collects the numeric segment that follows `prefix` in every anchor target
fn linked_ids(html: &str, base_url: &Url, prefix: &[&str]) -> BTreeSet<u32> {
    let document = Html::parse_document(html);
    let mut ids = BTreeSet::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return ids;
    };

    for element in document.select(&a_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(target) = resolve_link(href, base_url) else {
            continue;
        };
        if let Some(id) = id_after_prefix(&target, prefix) {
            ids.insert(id);
        }
    }

    ids
}

/// Resolves a link href against the page's base URL
///
/// Returns None for empty and fragment-only hrefs, unparseable links, and
/// anything that is not HTTP(S) after resolution.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}

fn id_after_prefix(url: &Url, prefix: &[&str]) -> Option<u32> {
    let segments: Vec<&str> = url.path_segments()?.collect();
    if segments.len() <= prefix.len() {
        return None;
    }

    let matches = prefix
        .iter()
        .zip(&segments)
        .all(|(expected, actual)| expected.eq_ignore_ascii_case(actual));
    if !matches {
        return None;
    }

    segments[prefix.len()].parse::<u32>().ok().filter(|id| *id > 0)
}
