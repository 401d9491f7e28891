use clap::Parser;
use std::time::Duration;
use url::Url;

use crate::scrape::ScrapeSettings;

/// Cricket club fixture and result scraper
#[derive(Parser, Debug, Clone)]
#[command(name = "club-fixtures", version, about)]
pub struct Config {
    /// Root URL of the upstream club site
    #[arg(long, env = "SITE_BASE_URL")]
    pub base_url: String,

    /// Canonical club name, as it appears in result summaries
    #[arg(long, env = "CLUB_NAME")]
    pub club_name: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "fixtures.db")]
    pub database_path: String,

    /// Directory for cached upstream data
    #[arg(long, env = "CACHE_DIR", default_value = "cache")]
    pub cache_dir: String,

    /// Bypass the cache entirely (every run hits upstream)
    #[arg(long, env = "CACHE_DISABLED", default_value = "false")]
    pub cache_disabled: bool,

    /// Max age of the cached team directory in seconds
    #[arg(long, env = "DIRECTORY_MAX_AGE_SECS", default_value = "86400")]
    pub directory_max_age_secs: u64,

    /// Max age of cached per-team fixtures/results in seconds
    #[arg(long, env = "TEAM_MAX_AGE_SECS", default_value = "3600")]
    pub team_max_age_secs: u64,

    /// Upstream request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "15")]
    pub request_timeout_secs: u64,

    /// Minimum delay between upstream requests in milliseconds
    #[arg(long, env = "REQUEST_DELAY_MS", default_value = "0")]
    pub request_delay_ms: u64,

    /// User-Agent sent upstream
    #[arg(
        long,
        env = "USER_AGENT",
        default_value = concat!("club-fixtures/", env!("CARGO_PKG_VERSION"))
    )]
    pub user_agent: String,

    /// Read API listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,

    /// Scheduled refresh interval in seconds (0 disables the schedule)
    #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value = "3600")]
    pub refresh_interval_secs: u64,

    /// Run a single scrape, commit it and exit
    #[arg(long)]
    pub once: bool,

    /// Limit a `--once` run to one team
    #[arg(long, requires = "once")]
    pub team_id: Option<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if Url::parse(&self.base_url).is_err() {
            anyhow::bail!("base_url '{}' is not a valid URL", self.base_url);
        }
        if self.club_name.trim().is_empty() {
            anyhow::bail!("club_name must not be empty");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn scrape_settings(&self) -> anyhow::Result<ScrapeSettings> {
        Ok(ScrapeSettings {
            base_url: Url::parse(&self.base_url)?,
            club_name: self.club_name.trim().to_string(),
            directory_max_age: chrono::Duration::seconds(self.directory_max_age_secs as i64),
            team_max_age: chrono::Duration::seconds(self.team_max_age_secs as i64),
            request_delay: Duration::from_millis(self.request_delay_ms),
        })
    }
}
