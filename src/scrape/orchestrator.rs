use anyhow::{Context, Result};
use chrono::Duration;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::aggregate::{aggregate, sort_newest_first, AggregateMode};
use super::directory::{directory_url, parse_teams};
use super::extract::{extract_fixtures, extract_results};
use super::fetch::PageFetcher;
use super::ScrapeError;
use crate::cache::FileCache;
use crate::db::models::{Fixture, MatchResult, Team};

const TEAMS_CACHE_KEY: &str = "teams";

/// Knobs for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub base_url: Url,
    /// Canonical club name used to classify result summaries
    pub club_name: String,
    pub directory_max_age: Duration,
    pub team_max_age: Duration,
    /// Minimum gap between consecutive upstream requests
    pub request_delay: std::time::Duration,
}

/// Everything one team page contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamRecords {
    pub fixtures: Vec<Fixture>,
    pub results: Vec<MatchResult>,
}

pub type TeamOutcome = Result<TeamRecords>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamFailure {
    pub team_id: String,
    pub error: String,
}

/// Assembled output of a run, ready to be committed.
#[derive(Debug, Clone)]
pub struct ScrapeOutput {
    pub teams: Vec<Team>,
    pub fixtures: Vec<Fixture>,
    /// Newest first, undated last
    pub results: Vec<MatchResult>,
    /// Teams whose page could not be scraped; their records are absent
    pub failed_teams: Vec<TeamFailure>,
}

/// Sequences directory resolution, per-team extraction and aggregation.
///
/// Runs are strictly sequential: one request at a time, teams in directory
/// order. A team that fails is dropped from the output; only a directory
/// failure (or cancellation) fails the whole run.
pub struct Orchestrator {
    fetcher: Arc<dyn PageFetcher>,
    cache: FileCache,
    settings: ScrapeSettings,
    cancel: Arc<AtomicBool>,
    last_request: Mutex<Option<Instant>>,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cache: FileCache, settings: ScrapeSettings) -> Self {
        Orchestrator {
            fetcher,
            cache,
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
            last_request: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Shutdown flag. Once set, every running and later run stops before its
    /// next team.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Fetch a page, spacing requests by the configured delay.
    async fn fetch(&self, url: &Url) -> Result<String> {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let next_allowed = prev + self.settings.request_delay;
            if next_allowed > Instant::now() {
                tokio::time::sleep_until(next_allowed).await;
            }
        }
        let result = self.fetcher.fetch(url.as_str()).await;
        *last = Some(Instant::now());
        result
    }

    /// The club's teams, from cache when fresh enough.
    ///
    /// A directory page without a single usable team is an error and is
    /// never cached.
    pub async fn resolve_teams(&self) -> Result<Vec<Team>> {
        if let Some(teams) = self
            .cache
            .read::<Vec<Team>>(TEAMS_CACHE_KEY, self.settings.directory_max_age)
            .filter(|teams| !teams.is_empty())
        {
            return Ok(teams);
        }

        let url = directory_url(&self.settings.base_url)?;
        let html = self.fetch(&url).await.context("failed to fetch team directory")?;
        let teams = parse_teams(&html, &url).context("failed to parse team directory")?;
        if teams.is_empty() {
            anyhow::bail!("team directory at {} lists no teams", url);
        }
        info!("Resolved {} teams from {}", teams.len(), url);

        self.cache.write(TEAMS_CACHE_KEY, &teams);
        Ok(teams)
    }

    /// Fixtures and results for one team.
    ///
    /// The page is fetched at most once, and only if either list is not
    /// already cached.
    pub async fn scrape_team(&self, team: &Team) -> TeamOutcome {
        let fixtures_key = format!("fixtures_{}", team.id);
        let results_key = format!("results_{}", team.id);
        let max_age = self.settings.team_max_age;

        let cached_fixtures = self.cache.read::<Vec<Fixture>>(&fixtures_key, max_age);
        let cached_results = self.cache.read::<Vec<MatchResult>>(&results_key, max_age);
        if let (Some(fixtures), Some(results)) = (&cached_fixtures, &cached_results) {
            debug!("Team {} served from cache", team.id);
            return Ok(TeamRecords {
                fixtures: fixtures.clone(),
                results: results.clone(),
            });
        }

        let page_url = Url::parse(&team.source_url)
            .with_context(|| format!("bad team URL '{}'", team.source_url))?;
        let html = self.fetch(&page_url).await?;

        let fixtures = match cached_fixtures {
            Some(fixtures) => fixtures,
            None => {
                let fixtures = extract_fixtures(&html, &team.id, &page_url)?;
                self.cache.write(&fixtures_key, &fixtures);
                fixtures
            }
        };
        let results = match cached_results {
            Some(results) => results,
            None => {
                let results =
                    extract_results(&html, &team.id, &page_url, &self.settings.club_name)?;
                self.cache.write(&results_key, &results);
                results
            }
        };

        Ok(TeamRecords { fixtures, results })
    }

    /// Scrape every team, or only `team_id` when given.
    pub async fn run(&self, team_id: Option<&str>) -> Result<ScrapeOutput, ScrapeError> {
        let directory = self.resolve_teams().await.map_err(ScrapeError::Directory)?;

        let (teams, mode) = match team_id {
            None => (directory, AggregateMode::AllTeams),
            Some(id) => {
                let team = directory
                    .into_iter()
                    .find(|t| t.id == id)
                    .ok_or_else(|| ScrapeError::UnknownTeam(id.to_string()))?;
                (vec![team], AggregateMode::SingleTeam)
            }
        };

        let mut outcomes: Vec<(&Team, TeamOutcome)> = Vec::with_capacity(teams.len());
        for team in &teams {
            if self.cancel.load(Ordering::SeqCst) {
                warn!("Scrape cancelled after {} of {} teams", outcomes.len(), teams.len());
                return Err(ScrapeError::Cancelled);
            }
            outcomes.push((team, self.scrape_team(team).await));
        }

        let mut fixtures = Vec::new();
        let mut results = Vec::new();
        let mut failed_teams = Vec::new();
        for (team, outcome) in outcomes {
            match outcome {
                Ok(records) => {
                    fixtures.push(records.fixtures);
                    results.push(records.results);
                }
                Err(e) => {
                    warn!("Skipping team {} ({}): {:#}", team.id, team.name, e);
                    failed_teams.push(TeamFailure {
                        team_id: team.id.clone(),
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        let fixtures = aggregate(fixtures, mode);
        let mut results = aggregate(results, mode);
        sort_newest_first(&mut results);

        info!(
            "Scrape finished: {} teams, {} fixtures, {} results, {} team failures",
            teams.len(),
            fixtures.len(),
            results.len(),
            failed_teams.len()
        );

        Ok(ScrapeOutput {
            teams,
            fixtures,
            results,
            failed_teams,
        })
    }
}
