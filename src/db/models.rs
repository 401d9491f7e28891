use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A club team as listed on the upstream team directory page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Opaque upstream identifier taken from the detail-page link
    pub id: String,
    pub name: String,
    /// Absolute URL of the team's detail page
    pub source_url: String,
}

/// A scheduled match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub team_id: String,
    /// Date header text exactly as shown upstream ("" when no header preceded the card)
    pub date_raw: String,
    /// `None` when `date_raw` could not be normalized
    pub date_iso: Option<NaiveDate>,
    pub home_team: String,
    pub away_team: String,
    pub time: Option<String>,
    pub location: Option<String>,
    /// Canonical scorecard link, used as the cross-team dedup key
    pub match_url: Option<String>,
}

/// A completed match with scores and the club's outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(flatten)]
    pub fixture: Fixture,
    pub home_score: Option<String>,
    pub away_score: Option<String>,
    pub summary: String,
    /// Mutually exclusive with `is_loss`; both false means drawn or unclassified
    pub is_win: bool,
    pub is_loss: bool,
}

/// Full persisted state served to API consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub teams: Vec<Team>,
    pub fixtures: Vec<Fixture>,
    pub results: Vec<MatchResult>,
    /// Time of the last update attempt, successful or not
    pub last_updated: Option<DateTime<Utc>>,
    pub last_scrape_success: bool,
    pub scrape_error_message: Option<String>,
}

/// Input to `Database::update`.
///
/// On success the provided collections replace the stored ones; on failure
/// they are ignored and only the freshness metadata changes.
#[derive(Debug, Clone, Default)]
pub struct SnapshotUpdate {
    pub teams: Option<Vec<Team>>,
    pub fixtures: Option<Vec<Fixture>>,
    pub results: Option<Vec<MatchResult>>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl SnapshotUpdate {
    pub fn failure(message: impl Into<String>) -> Self {
        SnapshotUpdate {
            success: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Common view over fixtures and results used for dedup and ordering
pub trait MatchRecord {
    fn match_url(&self) -> Option<&str>;
    fn date_iso(&self) -> Option<NaiveDate>;
}

impl MatchRecord for Fixture {
    fn match_url(&self) -> Option<&str> {
        self.match_url.as_deref()
    }

    fn date_iso(&self) -> Option<NaiveDate> {
        self.date_iso
    }
}

impl MatchRecord for MatchResult {
    fn match_url(&self) -> Option<&str> {
        self.fixture.match_url.as_deref()
    }

    fn date_iso(&self) -> Option<NaiveDate> {
        self.fixture.date_iso
    }
}
