use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Source of upstream HTML pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page at `url` and return its body.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetcher backed by a real HTTP client with a bounded timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpFetcher { http })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        if !resp.status().is_success() {
            anyhow::bail!("Upstream error {} for {}", resp.status(), url);
        }

        resp.text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// In-memory fetcher: known URLs return their page, failing URLs return
    /// an error, anything else is a 404.
    #[derive(Default)]
    pub struct StaticFetcher {
        pages: HashMap<String, String>,
        failing: HashMap<String, String>,
        pub requests: Mutex<Vec<String>>,
        instants: Mutex<Vec<Instant>>,
    }

    impl StaticFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        pub fn failing(mut self, url: &str, message: &str) -> Self {
            self.failing.insert(url.to_string(), message.to_string());
            self
        }

        pub fn request_count(&self, url: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.as_str() == url)
                .count()
        }

        /// When each request arrived, in order.
        pub fn request_instants(&self) -> Vec<Instant> {
            self.instants.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.requests.lock().unwrap().push(url.to_string());
            self.instants.lock().unwrap().push(Instant::now());
            if let Some(message) = self.failing.get(url) {
                anyhow::bail!("{}", message);
            }
            match self.pages.get(url) {
                Some(body) => Ok(body.clone()),
                None => anyhow::bail!("Upstream error 404 Not Found for {}", url),
            }
        }
    }
}
