use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

pub mod models;
use models::*;

/// Thread-safe SQLite snapshot store (single connection with mutex).
///
/// Holds the last committed teams/fixtures/results plus freshness metadata.
/// Collections are only replaced by a successful update; a failed update
/// touches the metadata alone, so readers keep seeing the last good data.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open a private in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Commit one scrape attempt.
    ///
    /// All changes land in a single transaction, so concurrent readers see
    /// either the previous snapshot or the new one, never a mix.
    pub fn update(&self, update: SnapshotUpdate) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if update.success {
            if let Some(teams) = &update.teams {
                replace_teams(&tx, teams)?;
            }
            if let Some(fixtures) = &update.fixtures {
                replace_fixtures(&tx, fixtures)?;
            }
            if let Some(results) = &update.results {
                replace_results(&tx, results)?;
            }
        }

        let error_message = if update.success {
            None
        } else {
            update.error_message.as_deref()
        };
        tx.execute(
            "UPDATE snapshot_meta
                SET last_updated = ?1,
                    last_scrape_success = ?2,
                    scrape_error_message = ?3,
                    version = version + 1
              WHERE id = 1",
            params![Utc::now(), update.success, error_message],
        )?;
        tx.commit()?;

        if update.success {
            info!(
                "Snapshot committed (teams={}, fixtures={}, results={})",
                update.teams.as_ref().map_or("kept".to_string(), |t| t.len().to_string()),
                update.fixtures.as_ref().map_or("kept".to_string(), |f| f.len().to_string()),
                update.results.as_ref().map_or("kept".to_string(), |r| r.len().to_string()),
            );
        } else {
            info!(
                "Scrape failure recorded, previous data kept: {}",
                error_message.unwrap_or("unknown error")
            );
        }
        Ok(())
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Monotonic counter bumped by every `update`; cheap change detection for readers
    pub fn version(&self) -> Result<i64> {
        let conn = self.conn()?;
        let version = conn.query_row("SELECT version FROM snapshot_meta WHERE id = 1", [], |r| {
            r.get(0)
        })?;
        Ok(version)
    }

    /// Current persisted snapshot, whatever the outcome of the last attempt
    pub fn read(&self) -> Result<Snapshot> {
        let mut conn = self.conn()?;
        // Read inside one transaction so the collections match the metadata.
        let tx = conn.transaction()?;

        let (last_updated, last_scrape_success, scrape_error_message): (
            Option<DateTime<Utc>>,
            bool,
            Option<String>,
        ) = tx
            .query_row(
                "SELECT last_updated, last_scrape_success, scrape_error_message
                   FROM snapshot_meta WHERE id = 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?
            .unwrap_or((None, false, None));

        let teams = {
            let mut stmt =
                tx.prepare("SELECT id, name, source_url FROM teams ORDER BY position")?;
            let rows = stmt
                .query_map([], map_team)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        let fixtures = {
            let mut stmt = tx.prepare(
                "SELECT team_id, date_raw, date_iso, home_team, away_team,
                        time, location, match_url
                   FROM fixtures ORDER BY position",
            )?;
            let rows = stmt
                .query_map([], map_fixture)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        let results = {
            let mut stmt = tx.prepare(
                "SELECT team_id, date_raw, date_iso, home_team, away_team,
                        time, location, match_url,
                        home_score, away_score, summary, is_win, is_loss
                   FROM results ORDER BY position",
            )?;
            let rows = stmt
                .query_map([], map_result)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        tx.commit()?;

        Ok(Snapshot {
            teams,
            fixtures,
            results,
            last_updated,
            last_scrape_success,
            scrape_error_message,
        })
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn replace_teams(tx: &Transaction, teams: &[Team]) -> Result<()> {
    tx.execute("DELETE FROM teams", [])?;
    let mut stmt =
        tx.prepare("INSERT INTO teams (position, id, name, source_url) VALUES (?1,?2,?3,?4)")?;
    for (pos, team) in teams.iter().enumerate() {
        stmt.execute(params![pos as i64, team.id, team.name, team.source_url])?;
    }
    Ok(())
}

fn replace_fixtures(tx: &Transaction, fixtures: &[Fixture]) -> Result<()> {
    tx.execute("DELETE FROM fixtures", [])?;
    let mut stmt = tx.prepare(
        "INSERT INTO fixtures (
            position, team_id, date_raw, date_iso, home_team, away_team,
            time, location, match_url
         ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
    )?;
    for (pos, f) in fixtures.iter().enumerate() {
        stmt.execute(params![
            pos as i64,
            f.team_id,
            f.date_raw,
            f.date_iso,
            f.home_team,
            f.away_team,
            f.time,
            f.location,
            f.match_url,
        ])?;
    }
    Ok(())
}

fn replace_results(tx: &Transaction, results: &[MatchResult]) -> Result<()> {
    tx.execute("DELETE FROM results", [])?;
    let mut stmt = tx.prepare(
        "INSERT INTO results (
            position, team_id, date_raw, date_iso, home_team, away_team,
            time, location, match_url,
            home_score, away_score, summary, is_win, is_loss
         ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
    )?;
    for (pos, r) in results.iter().enumerate() {
        let f = &r.fixture;
        stmt.execute(params![
            pos as i64,
            f.team_id,
            f.date_raw,
            f.date_iso,
            f.home_team,
            f.away_team,
            f.time,
            f.location,
            f.match_url,
            r.home_score,
            r.away_score,
            r.summary,
            r.is_win,
            r.is_loss,
        ])?;
    }
    Ok(())
}

fn map_team(row: &rusqlite::Row) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        source_url: row.get(2)?,
    })
}

fn map_fixture(row: &rusqlite::Row) -> rusqlite::Result<Fixture> {
    Ok(Fixture {
        team_id: row.get(0)?,
        date_raw: row.get(1)?,
        date_iso: row.get(2)?,
        home_team: row.get(3)?,
        away_team: row.get(4)?,
        time: row.get(5)?,
        location: row.get(6)?,
        match_url: row.get(7)?,
    })
}

fn map_result(row: &rusqlite::Row) -> rusqlite::Result<MatchResult> {
    Ok(MatchResult {
        fixture: map_fixture(row)?,
        home_score: row.get(8)?,
        away_score: row.get(9)?,
        summary: row.get(10)?,
        is_win: row.get(11)?,
        is_loss: row.get(12)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS snapshot_meta (
    id                   INTEGER PRIMARY KEY CHECK (id = 1),
    last_updated         TEXT,
    last_scrape_success  INTEGER NOT NULL DEFAULT 0,
    scrape_error_message TEXT,
    version              INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO snapshot_meta (id) VALUES (1);

CREATE TABLE IF NOT EXISTS teams (
    position   INTEGER PRIMARY KEY,
    id         TEXT    NOT NULL,
    name       TEXT    NOT NULL,
    source_url TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS fixtures (
    position   INTEGER PRIMARY KEY,
    team_id    TEXT    NOT NULL,
    date_raw   TEXT    NOT NULL,
    date_iso   TEXT,
    home_team  TEXT    NOT NULL,
    away_team  TEXT    NOT NULL,
    time       TEXT,
    location   TEXT,
    match_url  TEXT
);

CREATE TABLE IF NOT EXISTS results (
    position   INTEGER PRIMARY KEY,
    team_id    TEXT    NOT NULL,
    date_raw   TEXT    NOT NULL,
    date_iso   TEXT,
    home_team  TEXT    NOT NULL,
    away_team  TEXT    NOT NULL,
    time       TEXT,
    location   TEXT,
    match_url  TEXT,
    home_score TEXT,
    away_score TEXT,
    summary    TEXT    NOT NULL,
    is_win     INTEGER NOT NULL DEFAULT 0,
    is_loss    INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_fixtures_team ON fixtures(team_id);
CREATE INDEX IF NOT EXISTS idx_results_team ON results(team_id);
"#;
