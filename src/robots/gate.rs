//! The politeness gate
//!
//! Answers allow/deny for a URL, fetching and caching each origin's
//! robots.txt on first access. The gate is fail-open: whenever the file cannot
//! be fetched, or the check itself fails, the URL is allowed.

use crate::robots::{product_token, RobotsEntry, RobotsRules};
use crate::url::origin;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

type Slot = Arc<OnceCell<RobotsEntry>>;

/// Per-origin robots.txt cache shared by all workers
pub struct RobotsGate {
    client: Client,
    /// Product token matched against `User-agent` groups
    agent: String,
    timeout: Duration,
    ttl: Option<Duration>,
    /// One slot per origin; concurrent first lookups share a single probe
    cache: Mutex<HashMap<String, Slot>>,
}

impl RobotsGate {
    /// Creates a gate
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client (its User-Agent header is sent with the probe)
    /// * `user_agent` - Full User-Agent string; its product token is used for matching
    /// * `timeout` - robots.txt request timeout
    /// * `ttl` - Optional lifetime of a cached entry
    pub fn new(client: Client, user_agent: &str, timeout: Duration, ttl: Option<Duration>) -> Self {
        Self {
            client,
            agent: product_token(user_agent),
            timeout,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if `url` may be fetched
    pub async fn can_fetch(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Robots check failed for {}: {}; allowing", url, e);
                return true;
            }
        };
        let Some(domain) = origin(&parsed) else {
            warn!("Robots check failed for {}: no host; allowing", url);
            return true;
        };

        let Some(slot) = self.slot(&domain) else {
            warn!("Robots cache unavailable for {}; allowing", url);
            return true;
        };

        let entry = slot.get_or_init(|| self.fetch_entry(&domain)).await;
        let allowed = entry.rules.is_allowed(parsed.as_str(), &self.agent);
        if !allowed {
            debug!("Disallowed by robots.txt: {}", url);
        }
        allowed
    }

    /// Returns the number of origins with a cached entry
    pub fn cached_domains(&self) -> usize {
        self.cache
            .lock()
            .map(|cache| cache.values().filter(|slot| slot.initialized()).count())
            .unwrap_or(0)
    }

    /// Returns the cache slot for `domain`, replacing it when stale
    fn slot(&self, domain: &str) -> Option<Slot> {
        let mut cache = self.cache.lock().ok()?;
        let slot = cache.entry(domain.to_string()).or_default();

        if slot.get().is_some_and(|entry| entry.is_stale(self.ttl)) {
            debug!("Robots entry for {} expired", domain);
            *slot = Slot::default();
        }
        Some(Arc::clone(slot))
    }

    /// Fetches and parses `domain/robots.txt`, failing open
    async fn fetch_entry(&self, domain: &str) -> RobotsEntry {
        let robots_url = format!("{}/robots.txt", domain);
        debug!("Fetching {}", robots_url);

        let rules = match self
            .client
            .get(&robots_url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) if response.status() == StatusCode::OK => match response.text().await {
                Ok(body) => RobotsRules::from_content(&body),
                Err(e) => {
                    warn!("Failed to read {}: {}; allowing all", robots_url, e);
                    RobotsRules::allow_all()
                }
            },
            Ok(response) => {
                debug!(
                    "{} answered {}; allowing all",
                    robots_url,
                    response.status()
                );
                RobotsRules::allow_all()
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}; allowing all", robots_url, e);
                RobotsRules::allow_all()
            }
        };

        RobotsEntry::new(domain, rules)
    }
}
