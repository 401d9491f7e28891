use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{debug, error};

use crate::cache::CacheLookup;
use crate::db::models::Snapshot;
use crate::db::Database;
use crate::scrape::{self, Orchestrator};

/// In-memory copy of the persisted snapshot.
///
/// Reloaded only when the store's version moves, so most requests never
/// touch the rows.
pub struct SnapshotReader {
    db: Database,
    cached: RwLock<Option<(i64, Arc<Snapshot>)>>,
}

impl SnapshotReader {
    pub fn new(db: Database) -> Self {
        SnapshotReader {
            db,
            cached: RwLock::new(None),
        }
    }

    pub async fn current(&self) -> anyhow::Result<Arc<Snapshot>> {
        let version = self.db.version()?;
        if let Some((cached_version, snapshot)) = self.cached.read().await.as_ref() {
            if *cached_version == version {
                return Ok(Arc::clone(snapshot));
            }
        }

        debug!("Reloading snapshot (version {})", version);
        let snapshot = Arc::new(self.db.read()?);
        *self.cached.write().await = Some((version, Arc::clone(&snapshot)));
        Ok(snapshot)
    }

    /// Drop the in-memory copy; the next read goes to the store.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub reader: Arc<SnapshotReader>,
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the Axum router for the read API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/teams", get(teams_handler))
        .route("/api/fixtures", get(fixtures_handler))
        .route("/api/results", get(results_handler))
        .route("/api/status", get(status_handler))
        .route("/api/refresh", post(refresh_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

type ApiError = (StatusCode, String);

fn internal(e: anyhow::Error) -> ApiError {
    error!("Read API error: {:#}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[derive(Debug, Default, Deserialize)]
pub struct TeamFilter {
    pub team_id: Option<String>,
}

impl TeamFilter {
    fn matches(&self, team_id: &str) -> bool {
        self.team_id.as_deref().map_or(true, |id| id == team_id)
    }
}

/// GET /api/snapshot
async fn snapshot_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.reader.current().await.map_err(internal)?;
    Ok(Json(snapshot.as_ref().clone()))
}

/// GET /api/teams
async fn teams_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.reader.current().await.map_err(internal)?;
    Ok(Json(snapshot.teams.clone()))
}

/// GET /api/fixtures?team_id=123
async fn fixtures_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TeamFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.reader.current().await.map_err(internal)?;
    let fixtures: Vec<_> = snapshot
        .fixtures
        .iter()
        .filter(|f| filter.matches(&f.team_id))
        .cloned()
        .collect();
    Ok(Json(fixtures))
}

/// GET /api/results?team_id=123
async fn results_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TeamFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.reader.current().await.map_err(internal)?;
    let results: Vec<_> = snapshot
        .results
        .iter()
        .filter(|r| filter.matches(&r.fixture.team_id))
        .cloned()
        .collect();
    Ok(Json(results))
}

#[derive(Debug, Serialize)]
struct Status {
    last_updated: Option<DateTime<Utc>>,
    last_scrape_success: bool,
    scrape_error_message: Option<String>,
    teams: usize,
    fixtures: usize,
    results: usize,
    cache_disabled: bool,
    last_cache_lookup: Option<CacheLookup>,
}

/// GET /api/status
async fn status_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.reader.current().await.map_err(internal)?;
    let cache = state.orchestrator.cache();
    Ok(Json(Status {
        last_updated: snapshot.last_updated,
        last_scrape_success: snapshot.last_scrape_success,
        scrape_error_message: snapshot.scrape_error_message.clone(),
        teams: snapshot.teams.len(),
        fixtures: snapshot.fixtures.len(),
        results: snapshot.results.len(),
        cache_disabled: cache.is_disabled(),
        last_cache_lookup: cache.last_lookup(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshParams {
    pub team_id: Option<String>,
    /// Drop cached upstream data first so the refresh really hits upstream
    #[serde(default)]
    pub force: bool,
}

/// POST /api/refresh?team_id=123&force=true
async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RefreshParams>,
) -> Result<impl IntoResponse, ApiError> {
    if params.force {
        state.orchestrator.cache().clear().map_err(internal)?;
    }
    let report = scrape::refresh(&state.orchestrator, &state.db, params.team_id.as_deref())
        .await
        .map_err(internal)?;
    state.reader.invalidate().await;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{SnapshotUpdate, Team};

    fn team(id: &str) -> Team {
        Team {
            id: id.into(),
            name: id.into(),
            source_url: format!("https://club.example/Teams/{}", id),
        }
    }

    fn commit_teams(db: &Database, ids: &[&str]) {
        db.update(SnapshotUpdate {
            teams: Some(ids.iter().map(|id| team(id)).collect()),
            success: true,
            ..Default::default()
        })
        .unwrap();
    }

    #[tokio::test]
    async fn test_reader_reuses_copy_until_store_changes() {
        let db = Database::open_in_memory().unwrap();
        commit_teams(&db, &["1"]);
        let reader = SnapshotReader::new(db.clone());

        let first = reader.current().await.unwrap();
        let again = reader.current().await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        commit_teams(&db, &["1", "2"]);
        let reloaded = reader.current().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &reloaded));
        assert_eq!(reloaded.teams.len(), 2);
    }

    #[tokio::test]
    async fn test_reader_sees_failure_metadata() {
        let db = Database::open_in_memory().unwrap();
        commit_teams(&db, &["1"]);
        let reader = SnapshotReader::new(db.clone());
        reader.current().await.unwrap();

        db.update(SnapshotUpdate::failure("timeout")).unwrap();
        let snap = reader.current().await.unwrap();
        assert_eq!(snap.teams.len(), 1);
        assert!(!snap.last_scrape_success);
        assert_eq!(snap.scrape_error_message.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let db = Database::open_in_memory().unwrap();
        let reader = SnapshotReader::new(db);
        let first = reader.current().await.unwrap();
        reader.invalidate().await;
        let second = reader.current().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_team_filter() {
        assert!(TeamFilter::default().matches("anything"));
        let filter = TeamFilter {
            team_id: Some("101".into()),
        };
        assert!(filter.matches("101"));
        assert!(!filter.matches("102"));
    }
}
