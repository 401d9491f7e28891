use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod cache;
mod config;
mod dashboard;
mod db;
mod scrape;

use cache::FileCache;
use config::Config;
use dashboard::{AppState, SnapshotReader};
use db::Database;
use scrape::{HttpFetcher, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open database
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let cache = FileCache::new(&config.cache_dir, config.cache_disabled);
    if config.cache_disabled {
        info!("Cache disabled; every run fetches upstream");
    } else {
        info!("Cache directory: {}", cache.dir().display());
    }

    let fetcher = HttpFetcher::new(&config.user_agent, config.request_timeout())?;
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(fetcher),
        cache,
        config.scrape_settings()?,
    ));

    if config.once {
        let report = scrape::refresh(&orchestrator, &db, config.team_id.as_deref()).await?;
        info!(
            "Run finished: success={}, fixtures={}, results={}, failed teams={}",
            report.success,
            report.fixtures,
            report.results,
            report.failed_teams.len()
        );
        if !report.success {
            anyhow::bail!(
                "scrape failed: {}",
                report.error.unwrap_or_else(|| "unknown error".into())
            );
        }
        return Ok(());
    }

    let reader = Arc::new(SnapshotReader::new(db.clone()));

    // Scheduled refresh
    if config.refresh_interval_secs > 0 {
        let orchestrator = Arc::clone(&orchestrator);
        let reader = Arc::clone(&reader);
        let db = db.clone();
        let period = Duration::from_secs(config.refresh_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match scrape::refresh(&orchestrator, &db, None).await {
                    Ok(report) if report.success => reader.invalidate().await,
                    Ok(report) => {
                        warn!("Scheduled refresh failed: {}", report.error.unwrap_or_default());
                        reader.invalidate().await;
                    }
                    Err(e) => error!("Failed to commit scheduled refresh: {:#}", e),
                }
            }
        });
    } else {
        info!("Scheduled refresh disabled");
    }

    // Start the read API
    let app = dashboard::router(AppState {
        db,
        reader,
        orchestrator: Arc::clone(&orchestrator),
    });
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    info!("Read API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let cancel = orchestrator.cancel_handle();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down; any running scrape stops before its next team");
            cancel.store(true, Ordering::SeqCst);
        })
        .await?;

    Ok(())
}
