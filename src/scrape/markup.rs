//! Upstream page grammar: CSS selectors and the row classifier.
//!
//! Everything that depends on the club site's markup lives here.  The rest
//! of the pipeline only sees `DirectoryEntry`, `SectionScan` and `Card`.

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::rows::RowKind;

const TEAM_BOX: &str = "div.team-box";
const TEAM_NAME: &str = ".team-name";
const TEAM_LINK: &str = "a[href]";

const FIXTURES_SECTION: &str = "#fixtures";
const RESULTS_SECTION: &str = "#results";
const NO_MATCHES: &str = ".no-matches";
const ROW: &str = "tr";
const DATE_HEADER_CLASS: &str = "date-header";
const MATCH_CARD: &str = ".match-card";
const HOME_TEAM: &str = ".home-team";
const AWAY_TEAM: &str = ".away-team";
const MATCH_TIME: &str = ".match-time";
const MATCH_LOCATION: &str = ".match-location";
const HOME_SCORE: &str = ".home-score";
const AWAY_SCORE: &str = ".away-score";
const MATCH_SUMMARY: &str = ".match-summary";
const SCORECARD_LINK: &str = "a.scorecard-link[href]";

fn sel(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{}': {:?}", css, e))
}

/// Whitespace-collapsed text content of an element.
fn text_of(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(el: ElementRef, selector: &Selector) -> Option<String> {
    el.select(selector)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

// ── Team directory ────────────────────────────────────────────────────────────

/// One team box from the directory page, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    /// Link resolved against the page URL; `None` if absent or unresolvable
    pub link: Option<Url>,
}

/// Extract every team box on the directory page, in document order.
pub fn parse_directory(html: &str, page_url: &Url) -> Result<Vec<DirectoryEntry>> {
    let team_box = sel(TEAM_BOX)?;
    let team_name = sel(TEAM_NAME)?;
    let team_link = sel(TEAM_LINK)?;

    let document = Html::parse_document(html);
    let entries = document
        .select(&team_box)
        .map(|b| {
            let link_el = b.select(&team_link).next();
            let name = first_text(b, &team_name)
                .or_else(|| link_el.map(text_of).filter(|t| !t.is_empty()))
                .unwrap_or_default();
            let link = link_el
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok());
            DirectoryEntry { name, link }
        })
        .collect();
    Ok(entries)
}

// ── Team page sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Fixtures,
    Results,
}

impl Section {
    fn selector(self) -> &'static str {
        match self {
            Section::Fixtures => FIXTURES_SECTION,
            Section::Results => RESULTS_SECTION,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Section::Fixtures => "fixtures",
            Section::Results => "results",
        }
    }
}

/// Plain-data view of one match card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Card {
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub home_score: Option<String>,
    pub away_score: Option<String>,
    pub summary: Option<String>,
    pub match_url: Option<String>,
}

/// Result of looking for a section on a team page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionScan {
    /// The page has no such section at all
    Missing,
    /// The section says there is nothing to list
    Empty,
    Rows(Vec<RowKind<Card>>),
}

impl SectionScan {
    pub fn into_rows(self) -> Vec<RowKind<Card>> {
        match self {
            SectionScan::Rows(rows) => rows,
            SectionScan::Missing | SectionScan::Empty => Vec::new(),
        }
    }
}

struct CardSelectors {
    card: Selector,
    home_team: Selector,
    away_team: Selector,
    time: Selector,
    location: Selector,
    home_score: Selector,
    away_score: Selector,
    summary: Selector,
    scorecard: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self> {
        Ok(CardSelectors {
            card: sel(MATCH_CARD)?,
            home_team: sel(HOME_TEAM)?,
            away_team: sel(AWAY_TEAM)?,
            time: sel(MATCH_TIME)?,
            location: sel(MATCH_LOCATION)?,
            home_score: sel(HOME_SCORE)?,
            away_score: sel(AWAY_SCORE)?,
            summary: sel(MATCH_SUMMARY)?,
            scorecard: sel(SCORECARD_LINK)?,
        })
    }
}

/// Locate `section` on a team page and classify its rows in document order.
pub fn scan_section(html: &str, section: Section, page_url: &Url) -> Result<SectionScan> {
    let section_sel = sel(section.selector())?;
    let no_matches = sel(NO_MATCHES)?;
    let row = sel(ROW)?;
    let cards = CardSelectors::new()?;

    let document = Html::parse_document(html);
    let Some(root) = document.select(&section_sel).next() else {
        return Ok(SectionScan::Missing);
    };
    if root.select(&no_matches).next().is_some() {
        return Ok(SectionScan::Empty);
    }

    let rows = root
        .select(&row)
        .map(|r| classify_row(r, &cards, page_url))
        .collect();
    Ok(SectionScan::Rows(rows))
}

fn classify_row(row: ElementRef, s: &CardSelectors, page_url: &Url) -> RowKind<Card> {
    if row.value().classes().any(|c| c == DATE_HEADER_CLASS) {
        return RowKind::DateHeader(text_of(row));
    }
    match row.select(&s.card).next() {
        Some(card) => RowKind::MatchCard(read_card(card, s, page_url)),
        None => RowKind::Other,
    }
}

fn read_card(card: ElementRef, s: &CardSelectors, page_url: &Url) -> Card {
    let match_url = card
        .select(&s.scorecard)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .map(String::from);

    Card {
        home_team: first_text(card, &s.home_team),
        away_team: first_text(card, &s.away_team),
        time: first_text(card, &s.time),
        location: first_text(card, &s.location),
        home_score: first_text(card, &s.home_score),
        away_score: first_text(card, &s.away_score),
        summary: first_text(card, &s.summary),
        match_url,
    }
}
