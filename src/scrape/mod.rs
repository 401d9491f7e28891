pub mod aggregate;
pub mod classify;
pub mod directory;
pub mod extract;
pub mod fetch;
pub mod markup;
pub mod orchestrator;
pub mod rows;

pub use fetch::HttpFetcher;
pub use orchestrator::{Orchestrator, ScrapeSettings, TeamFailure};

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::models::SnapshotUpdate;
use crate::db::Database;

/// Reasons a whole run fails. Anything milder degrades to partial data.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("team directory unavailable: {0:#}")]
    Directory(anyhow::Error),
    #[error("team {0} is not listed in the team directory")]
    UnknownTeam(String),
    #[error("scrape cancelled")]
    Cancelled,
}

/// Outcome of one refresh, as reported to operators and the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub team_id: Option<String>,
    pub teams: usize,
    pub fixtures: usize,
    pub results: usize,
    pub failed_teams: Vec<TeamFailure>,
    pub error: Option<String>,
}

/// Run the orchestrator and commit its outcome to the store.
///
/// A completed run replaces fixtures and results (and the team list, for
/// all-teams runs). A failed run only records the error, leaving the last
/// good data in place. The returned error covers store failures only.
pub async fn refresh(
    orchestrator: &Orchestrator,
    db: &Database,
    team_id: Option<&str>,
) -> Result<RunReport> {
    match orchestrator.run(team_id).await {
        Ok(output) => {
            let report = RunReport {
                success: true,
                team_id: team_id.map(str::to_string),
                teams: output.teams.len(),
                fixtures: output.fixtures.len(),
                results: output.results.len(),
                failed_teams: output.failed_teams,
                error: None,
            };
            db.update(SnapshotUpdate {
                teams: team_id.is_none().then_some(output.teams),
                fixtures: Some(output.fixtures),
                results: Some(output.results),
                success: true,
                error_message: None,
            })?;
            info!(
                "Refresh committed: {} fixtures, {} results",
                report.fixtures, report.results
            );
            Ok(report)
        }
        Err(e) => {
            let message = e.to_string();
            warn!("Refresh failed, keeping previous snapshot: {}", message);
            db.update(SnapshotUpdate::failure(message.clone()))?;
            Ok(RunReport {
                success: false,
                team_id: team_id.map(str::to_string),
                teams: 0,
                fixtures: 0,
                results: 0,
                failed_teams: Vec::new(),
                error: Some(message),
            })
        }
    }
}
