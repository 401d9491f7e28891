use anyhow::Result;
use tracing::debug;
use url::Url;

use super::classify::classify;
use super::markup::{scan_section, Card, Section, SectionScan};
use super::rows::{scan_rows, DateState};
use crate::db::models::{Fixture, MatchResult};

/// Common part of a fixture or result; `None` when either side is missing.
fn base_record(card: &Card, date: &DateState, team_id: &str) -> Option<Fixture> {
    let home_team = card.home_team.clone()?;
    let away_team = card.away_team.clone()?;
    Some(Fixture {
        team_id: team_id.to_string(),
        date_raw: date.raw().to_string(),
        date_iso: date.iso(),
        home_team,
        away_team,
        time: card.time.clone(),
        location: card.location.clone(),
        match_url: card.match_url.clone(),
    })
}

fn section_rows(html: &str, section: Section, team_id: &str, page_url: &Url) -> Result<SectionScan> {
    let scan = scan_section(html, section, page_url)?;
    match &scan {
        SectionScan::Missing => debug!("Team {}: no {} section", team_id, section.name()),
        SectionScan::Empty => debug!("Team {}: {} section is empty", team_id, section.name()),
        SectionScan::Rows(rows) => {
            debug!("Team {}: {} {} rows", team_id, rows.len(), section.name())
        }
    }
    Ok(scan)
}

/// Scheduled matches listed on a team page.
pub fn extract_fixtures(html: &str, team_id: &str, page_url: &Url) -> Result<Vec<Fixture>> {
    let rows = section_rows(html, Section::Fixtures, team_id, page_url)?.into_rows();
    Ok(scan_rows(rows, |card, date| base_record(&card, date, team_id)))
}

/// Completed matches listed on a team page, classified for `club_name`.
pub fn extract_results(
    html: &str,
    team_id: &str,
    page_url: &Url,
    club_name: &str,
) -> Result<Vec<MatchResult>> {
    let rows = section_rows(html, Section::Results, team_id, page_url)?.into_rows();
    Ok(scan_rows(rows, |card, date| {
        let fixture = base_record(&card, date, team_id)?;
        let summary = card.summary.unwrap_or_default();
        let (is_win, is_loss) = classify(&summary, club_name).flags();
        Some(MatchResult {
            fixture,
            home_score: card.home_score,
            away_score: card.away_score,
            summary,
            is_win,
            is_loss,
        })
    }))
}

#[cfg(test)]
pub(crate) mod sample {
    //! Canned upstream pages shared by scraper tests.

    pub const DIRECTORY: &str = r#"
        <html><body><div class="teams">
          <div class="team-box"><a href="/Teams/101"><h3 class="team-name">1st XI</h3></a></div>
          <div class="team-box"><a href="/Teams/102"><h3 class="team-name">2nd XI</h3></a></div>
          <div class="team-box"><a href="/Teams/103"><h3 class="team-name">Sunday XI</h3></a></div>
        </div></body></html>
    "#;

    /// Team page with one fixture and one result; `url` is the shared scorecard link.
    pub fn team_page(opponent: &str, url: &str, result_url: &str) -> String {
        format!(
            r#"<html><body>
            <div id="fixtures"><table>
              <tr class="date-header"><th>Saturday 15 November 2025</th></tr>
              <tr><td><div class="match-card">
                <span class="home-team">Wickersley Old Village CC</span>
                <span class="away-team">{opponent}</span>
                <span class="match-time">13:00</span>
                <span class="match-location">Northfield Lane</span>
                <a class="scorecard-link" href="{url}">Match</a>
              </div></td></tr>
            </table></div>
            <div id="results"><table>
              <tr class="date-header"><th>Sunday 09 November 2025</th></tr>
              <tr><td><div class="match-card">
                <span class="home-team">{opponent}</span>
                <span class="away-team">Wickersley Old Village CC</span>
                <span class="home-score">143</span>
                <span class="away-score">144/3</span>
                <div class="match-summary">WICKERSLEY OLD VILLAGE CC WON BY 7 WICKETS</div>
                <a class="scorecard-link" href="{result_url}">Scorecard</a>
              </div></td></tr>
            </table></div>
            </body></html>"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const CLUB: &str = "Wickersley Old Village CC";

    fn page_url() -> Url {
        Url::parse("https://club.example/Teams/101").unwrap()
    }

    const RESULTS_PAGE: &str = r#"
        <div id="results"><table>
          <tr><td><div class="match-card">
            <span class="home-team">Early CC</span>
            <span class="away-team">Wickersley Old Village CC</span>
            <div class="match-summary">MATCH ABANDONED</div>
          </div></td></tr>
          <tr class="date-header"><th>Sunday 09 November 2025</th></tr>
          <tr><td><div class="match-card">
            <span class="home-team">Wickersley Old Village CC</span>
            <span class="away-team">Moorgate CC</span>
            <span class="home-score">201/5</span>
            <span class="away-score">181</span>
            <div class="match-summary">WICKERSLEY OLD VILLAGE CC WON BY 20 RUNS</div>
            <a class="scorecard-link" href="/website/results/900">Scorecard</a>
          </div></td></tr>
          <tr><td><div class="match-card">
            <span class="away-team">Orphan CC</span>
          </div></td></tr>
          <tr class="date-header"><th>Date to be confirmed</th></tr>
          <tr><td><div class="match-card">
            <span class="home-team">Moorgate CC</span>
            <span class="away-team">Wickersley Old Village CC</span>
            <div class="match-summary">MOORGATE CC WON BY 5 WICKETS</div>
          </div></td></tr>
        </table></div>
    "#;

    #[test]
    fn test_extract_results() {
        let results = extract_results(RESULTS_PAGE, "101", &page_url(), CLUB).unwrap();
        assert_eq!(results.len(), 3, "card without a home team must be skipped");

        let early = &results[0];
        assert_eq!(early.fixture.date_raw, "");
        assert_eq!(early.fixture.date_iso, None);
        assert_eq!((early.is_win, early.is_loss), (false, false));

        let win = &results[1];
        assert_eq!(win.fixture.team_id, "101");
        assert_eq!(win.fixture.date_iso, NaiveDate::from_ymd_opt(2025, 11, 9));
        assert_eq!(win.home_score.as_deref(), Some("201/5"));
        assert_eq!(win.away_score.as_deref(), Some("181"));
        assert_eq!(
            win.fixture.match_url.as_deref(),
            Some("https://club.example/website/results/900")
        );
        assert!(win.is_win && !win.is_loss);

        let loss = &results[2];
        assert_eq!(loss.fixture.date_raw, "Date to be confirmed");
        assert_eq!(loss.fixture.date_iso, None);
        assert!(loss.is_loss && !loss.is_win);
        assert_eq!(loss.fixture.match_url, None);
    }

    #[test]
    fn test_extract_fixtures_from_sample_page() {
        let html = sample::team_page("Moorgate CC", "/website/results/1", "/website/results/2");
        let fixtures = extract_fixtures(&html, "101", &page_url()).unwrap();
        assert_eq!(fixtures.len(), 1);
        let f = &fixtures[0];
        assert_eq!(f.date_raw, "Saturday 15 November 2025");
        assert_eq!(f.date_iso, NaiveDate::from_ymd_opt(2025, 11, 15));
        assert_eq!(f.away_team, "Moorgate CC");
        assert_eq!(f.time.as_deref(), Some("13:00"));
        assert_eq!(f.location.as_deref(), Some("Northfield Lane"));
    }

    #[test]
    fn test_missing_and_empty_sections_yield_nothing() {
        let html = r#"<div id="fixtures"><div class="no-matches">No fixtures</div></div>"#;
        assert!(extract_fixtures(html, "101", &page_url()).unwrap().is_empty());
        assert!(extract_results(html, "101", &page_url(), CLUB).unwrap().is_empty());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let html = sample::team_page("Moorgate CC", "/m/1", "/m/2");
        let first = extract_results(&html, "101", &page_url(), CLUB).unwrap();
        let second = extract_results(&html, "101", &page_url(), CLUB).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
