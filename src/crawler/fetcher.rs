//! HTTP fetcher implementation
//!
//! This module turns one crawl task into one page record:
//! - Politeness check through the robots gate
//! - Fixed delay before every request
//! - GET with the configured timeout and User-Agent
//! - Title and link extraction for HTML responses
//! - Queueing of discovered links while depth remains
//! - Retries with exponential backoff for timeouts and transport failures

use crate::config::CrawlerConfig;
use crate::crawler::frontier::{CrawlTask, Frontier};
use crate::crawler::limiter::ConnectionLimiter;
use crate::crawler::parser::parse_html;
use crate::robots::RobotsGate;
use crate::storage::PageRecord;
use crate::url::{is_valid, scope_of};
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// robots.txt disallows the URL; no request was made
    Blocked,

    /// A record for the final attempt, successful or not
    Page(PageRecord),
}

/// Why an attempt produced no response
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timeout")]
    Timeout,

    #[error("{0}")]
    Transport(reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e)
        }
    }
}

/// Builds the HTTP client shared by the fetcher and the robots gate
///
/// # Example
///
/// ```no_run
/// use seine::config::CrawlerConfig;
/// use seine::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    let timeout = config.timeout();

    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .pool_max_idle_per_host(config.max_connections_per_host as usize)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages for the worker pool
pub struct Fetcher {
    client: Client,
    gate: Arc<RobotsGate>,
    frontier: Arc<Frontier>,
    limiter: ConnectionLimiter,
    config: Arc<CrawlerConfig>,
}

impl Fetcher {
    pub fn new(
        client: Client,
        gate: Arc<RobotsGate>,
        frontier: Arc<Frontier>,
        config: Arc<CrawlerConfig>,
    ) -> Self {
        let limiter = ConnectionLimiter::new(
            config.max_connections as usize,
            config.max_connections_per_host as usize,
        );
        Self {
            client,
            gate,
            frontier,
            limiter,
            config,
        }
    }

    /// Fetches one task
    ///
    /// Never fails: every attempt that gets past the robots check ends in a
    /// page record, with `status_code = 0` and an error message when no
    /// response was received.
    pub async fn fetch(&self, task: &CrawlTask) -> FetchOutcome {
        if !self.gate.can_fetch(&task.url).await {
            return FetchOutcome::Blocked;
        }

        let mut attempt = 0;
        loop {
            match self.fetch_once(task).await {
                Ok(record) => return FetchOutcome::Page(record),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.backoff(attempt);
                    warn!(
                        "Fetch of {} failed ({}); retry {}/{} in {:?}",
                        task.url, e, attempt, self.config.max_retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    warn!("Fetch of {} failed: {}", task.url, e);
                    return FetchOutcome::Page(PageRecord::failed(&task.url, e.to_string()));
                }
            }
        }
    }

    /// `retry-delay × 2^(attempt-1)`
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.config.retry_delay().saturating_mul(factor)
    }

    async fn fetch_once(&self, task: &CrawlTask) -> Result<PageRecord, FetchError> {
        let delay = self.config.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let host = scope_of(&task.url).unwrap_or_default();
        let _permit = self.limiter.acquire(&host).await;

        let response = self.client.get(&task.url).send().await?;
        let status_code = response.status().as_u16();
        let final_url = response.url().clone();
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"));

        if !is_html {
            debug!("{} is not HTML; recording status only", task.url);
            return Ok(PageRecord {
                url: task.url.clone(),
                status_code,
                title: String::new(),
                content_length: 0,
                links: Vec::new(),
                fetched_at: Utc::now(),
                error: None,
            });
        }

        let body = response.text().await?;
        let parsed = parse_html(&body, &final_url);

        if task.depth < self.frontier.max_depth() {
            self.enqueue_links(task, &parsed.links);
        }

        Ok(PageRecord {
            url: task.url.clone(),
            status_code,
            title: parsed.title,
            content_length: body.len() as u64,
            links: parsed.links,
            fetched_at: Utc::now(),
            error: None,
        })
    }

    /// Queues links found on `task`'s page at the next depth
    ///
    /// With domain scoping the scope is the authority of the page the links
    /// were found on, not of each link.
    fn enqueue_links(&self, task: &CrawlTask, links: &[String]) {
        let scope = self
            .config
            .stay_in_domain
            .then(|| scope_of(&task.url).unwrap_or_default());

        let queued = links
            .iter()
            .filter(|link| is_valid(link, scope.as_deref()))
            .filter(|link| self.frontier.enqueue(link, task.depth + 1))
            .count();

        debug!(
            "Queued {} of {} links from {} at depth {}",
            queued,
            links.len(),
            task.url,
            task.depth + 1
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> CrawlerConfig {
        CrawlerConfig {
            max_depth: 1,
            delay: 0.0,
            timeout: 2.0,
            max_retries: 0,
            retry_delay: 0.01,
            user_agent: "TestBot/1.0".to_string(),
            ..Default::default()
        }
    }

    fn fetcher(config: CrawlerConfig) -> (Fetcher, Arc<Frontier>) {
        let config = Arc::new(config);
        let client = build_http_client(&config).unwrap();
        let gate = Arc::new(RobotsGate::new(
            client.clone(),
            &config.user_agent,
            config.robots_timeout(),
            None,
        ));
        let frontier = Arc::new(Frontier::new(config.max_depth));
        (
            Fetcher::new(client, gate, Arc::clone(&frontier), config),
            frontier,
        )
    }

    async fn server_without_robots() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    }

    fn task(url: String, depth: u32) -> CrawlTask {
        CrawlTask { url, depth }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&CrawlerConfig::default()).is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        let (fetcher, _) = fetcher(CrawlerConfig {
            retry_delay: 1.0,
            ..test_config()
        });
        assert_eq!(fetcher.backoff(1), Duration::from_secs(1));
        assert_eq!(fetcher.backoff(2), Duration::from_secs(2));
        assert_eq!(fetcher.backoff(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_html_page_record_and_scoped_links() {
        let server = server_without_robots().await;
        let html = r#"<html><head><title> Home </title></head><body>
                <a href="/x">X</a>
                <a href="https://b.test/y">Y</a>
            </body></html>"#;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
            .mount(&server)
            .await;

        let (fetcher, frontier) = fetcher(test_config());
        let seed = format!("{}/", server.uri());
        let FetchOutcome::Page(record) = fetcher.fetch(&task(seed.clone(), 0)).await else {
            panic!("seed should not be blocked");
        };

        assert_eq!(record.status_code, 200);
        assert_eq!(record.title, "Home");
        assert_eq!(record.content_length, html.len() as u64);
        assert_eq!(
            record.links,
            vec![format!("{}/x", server.uri()), "https://b.test/y".to_string()]
        );

        // Only the in-scope link is queued, one hop deeper
        assert_eq!(frontier.len(), 1);
        let claimed = frontier.dequeue(Duration::from_millis(100)).await.unwrap();
        assert_eq!(claimed.task(), &task(format!("{}/x", server.uri()), 1));
    }

    #[tokio::test]
    async fn test_external_links_queued_without_scoping() {
        let server = server_without_robots().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<a href="/x">X</a><a href="https://b.test/y">Y</a>"#,
                "text/html",
            ))
            .mount(&server)
            .await;

        let (fetcher, frontier) = fetcher(CrawlerConfig {
            stay_in_domain: false,
            ..test_config()
        });
        fetcher.fetch(&task(format!("{}/", server.uri()), 0)).await;
        assert_eq!(frontier.len(), 2);
    }

    #[tokio::test]
    async fn test_no_links_queued_at_max_depth() {
        let server = server_without_robots().await;
        Mock::given(method("GET"))
            .and(path("/deep"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"<a href="/x">X</a>"#, "text/html"),
            )
            .mount(&server)
            .await;

        let (fetcher, frontier) = fetcher(test_config());
        let outcome = fetcher.fetch(&task(format!("{}/deep", server.uri()), 1)).await;

        let FetchOutcome::Page(record) = outcome else {
            panic!("expected a page");
        };
        assert_eq!(record.links.len(), 1);
        assert!(frontier.is_empty());
    }

    #[tokio::test]
    async fn test_non_html_response() {
        let server = server_without_robots().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"a": "<a href='/x'>"}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let (fetcher, frontier) = fetcher(test_config());
        let FetchOutcome::Page(record) =
            fetcher.fetch(&task(format!("{}/data", server.uri()), 0)).await
        else {
            panic!("expected a page");
        };

        assert_eq!(record.status_code, 200);
        assert!(record.title.is_empty());
        assert!(record.links.is_empty());
        assert_eq!(record.content_length, 0);
        assert!(frontier.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_recorded() {
        let server = server_without_robots().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_raw("<title>Not Found</title>", "text/html"),
            )
            .mount(&server)
            .await;

        let (fetcher, _) = fetcher(test_config());
        let FetchOutcome::Page(record) =
            fetcher.fetch(&task(format!("{}/missing", server.uri()), 0)).await
        else {
            panic!("expected a page");
        };
        assert_eq!(record.status_code, 404);
        assert_eq!(record.title, "Not Found");
        assert_eq!(record.error, None);
    }

    #[tokio::test]
    async fn test_timeout_record() {
        let server = server_without_robots().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let (fetcher, _) = fetcher(CrawlerConfig {
            timeout: 0.3,
            ..test_config()
        });
        let FetchOutcome::Page(record) =
            fetcher.fetch(&task(format!("{}/slow", server.uri()), 0)).await
        else {
            panic!("expected a page");
        };
        assert_eq!(record.status_code, 0);
        assert_eq!(record.error.as_deref(), Some("Timeout"));
    }

    #[tokio::test]
    async fn test_timeouts_are_retried() {
        let server = server_without_robots().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .expect(3)
            .mount(&server)
            .await;

        let (fetcher, _) = fetcher(CrawlerConfig {
            timeout: 0.2,
            max_retries: 2,
            ..test_config()
        });
        let outcome = fetcher.fetch(&task(format!("{}/slow", server.uri()), 0)).await;
        assert!(matches!(outcome, FetchOutcome::Page(ref r) if r.status_code == 0));
    }

    #[tokio::test]
    async fn test_connection_error_record() {
        let (fetcher, _) = fetcher(test_config());
        let FetchOutcome::Page(record) = fetcher
            .fetch(&task("http://127.0.0.1:9/".to_string(), 0))
            .await
        else {
            panic!("expected a page");
        };
        assert_eq!(record.status_code, 0);
        assert!(record.error.is_some());
    }

    #[tokio::test]
    async fn test_blocked_by_robots() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: TestBot\nDisallow: /private"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/private"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (fetcher, _) = fetcher(test_config());
        let outcome = fetcher
            .fetch(&task(format!("{}/private", server.uri()), 0))
            .await;
        assert!(matches!(outcome, FetchOutcome::Blocked));
    }
}
