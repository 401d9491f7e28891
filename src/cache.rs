//! File-backed key/value cache for upstream scrape data.
//!
//! Each key is stored as one JSON file holding the payload and the time it
//! was written.  Reads take a `max_age`; anything older is a miss, as is a
//! missing or unreadable file.  Nothing is ever evicted: a stale entry simply
//! gets overwritten by the next successful write for the same key.
//!
//! The cache is an optimisation only.  Read problems degrade to a miss and
//! write problems are logged, so callers never see a cache error.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Outcome of the most recent lookup, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheLookup {
    pub key: String,
    pub hit: bool,
}

#[derive(Serialize, Deserialize)]
struct Entry<T> {
    written_at: DateTime<Utc>,
    data: T,
}

pub struct FileCache {
    dir: PathBuf,
    disabled: bool,
    last_lookup: Mutex<Option<CacheLookup>>,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, disabled: bool) -> Self {
        FileCache {
            dir: dir.into(),
            disabled,
            last_lookup: Mutex::new(None),
        }
    }

    /// A cache that never hits and never writes
    #[cfg(test)]
    pub fn disabled() -> Self {
        FileCache::new(PathBuf::new(), true)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up `key`, treating entries older than `max_age` as absent.
    pub fn read<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
        self.read_at(key, max_age, Utc::now())
    }

    /// `read` against an explicit clock.
    pub fn read_at<T: DeserializeOwned>(
        &self,
        key: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Option<T> {
        let value = if self.disabled {
            None
        } else {
            self.load(key, max_age, now)
        };
        self.record_lookup(key, value.is_some());
        value
    }

    fn load<T: DeserializeOwned>(
        &self,
        key: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Option<T> {
        let path = self.path_for(key);
        let contents = std::fs::read_to_string(&path).ok()?;
        let entry: Entry<T> = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Cache entry {:?} unreadable, treating as miss: {}", path, e);
                return None;
            }
        };
        let age = now.signed_duration_since(entry.written_at);
        if age > max_age {
            debug!("Cache entry '{}' expired (age {}s)", key, age.num_seconds());
            return None;
        }
        Some(entry.data)
    }

    /// Store `data` under `key`. No-op when the cache is disabled.
    pub fn write<T: Serialize>(&self, key: &str, data: &T) {
        self.write_at(key, data, Utc::now());
    }

    /// `write` with an explicit timestamp.
    pub fn write_at<T: Serialize>(&self, key: &str, data: &T, now: DateTime<Utc>) {
        if self.disabled {
            return;
        }
        if let Err(e) = self.store(key, data, now) {
            warn!("Failed to write cache entry '{}': {:#}", key, e);
        }
    }

    fn store<T: Serialize>(&self, key: &str, data: &T, now: DateTime<Utc>) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string(&Entry {
            written_at: now,
            data,
        })?;
        // Write-then-rename so a reader never sees a half-written file
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Remove every cached entry.
    pub fn clear(&self) -> anyhow::Result<()> {
        if self.disabled || !self.dir.exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    pub fn last_lookup(&self) -> Option<CacheLookup> {
        self.last_lookup.lock().ok().and_then(|l| l.clone())
    }

    fn record_lookup(&self, key: &str, hit: bool) {
        debug!("Cache {} for '{}'", if hit { "hit" } else { "miss" }, key);
        if let Ok(mut last) = self.last_lookup.lock() {
            *last = Some(CacheLookup {
                key: key.to_string(),
                hit,
            });
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Map a cache key onto a safe file stem.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
