//! Crawler coordinator - main crawl orchestration logic
//!
//! This module owns the state every worker shares and drives a crawl from
//! start to finish:
//! - Initializing storage
//! - Seeding the frontier
//! - Running the worker pool until the frontier drains or the crawl stops
//! - Closing storage and reporting statistics

use crate::config::{validate_crawler_config, CrawlerConfig};
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::frontier::Frontier;
use crate::crawler::stats::{CrawlReport, CrawlStats};
use crate::crawler::worker::run_worker;
use crate::robots::RobotsGate;
use crate::storage::PageStore;
use crate::url::is_valid;
use crate::{Result, SeineError};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// State shared by every worker of one crawl
pub(crate) struct Shared {
    pub(crate) config: Arc<CrawlerConfig>,
    pub(crate) storage: Arc<dyn PageStore>,
    pub(crate) frontier: Arc<Frontier>,
    pub(crate) fetcher: Fetcher,
    pub(crate) stats: CrawlStats,
    pub(crate) cancel: CancellationToken,
}

/// Main crawler structure
///
/// # Example
///
/// ```no_run
/// use seine::config::CrawlerConfig;
/// use seine::storage::MemoryStore;
/// use seine::Crawler;
/// use std::sync::Arc;
///
/// # async fn example() -> seine::Result<()> {
/// let crawler = Crawler::new(CrawlerConfig::default(), Arc::new(MemoryStore::new()))?;
/// let report = crawler.run(&["https://example.com/".to_string()]).await?;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
pub struct Crawler {
    shared: Arc<Shared>,
    gate: Arc<RobotsGate>,
}

impl Crawler {
    /// Creates a crawler that hands its records to `storage`
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to run
    /// * `Err(SeineError)` - The configuration is invalid or the HTTP client
    ///   could not be built
    pub fn new(config: CrawlerConfig, storage: Arc<dyn PageStore>) -> Result<Self> {
        validate_crawler_config(&config)?;
        let config = Arc::new(config);
        let client = build_http_client(&config)?;
        let gate = Arc::new(RobotsGate::new(
            client.clone(),
            &config.user_agent,
            config.robots_timeout(),
            config.robots_ttl(),
        ));
        let frontier = Arc::new(Frontier::new(config.max_depth));
        let fetcher = Fetcher::new(
            client,
            Arc::clone(&gate),
            Arc::clone(&frontier),
            Arc::clone(&config),
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                storage,
                frontier,
                fetcher,
                stats: CrawlStats::new(),
                cancel: CancellationToken::new(),
            }),
            gate,
        })
    }

    /// Token that stops the worker pool when cancelled
    ///
    /// Workers finish the page they are on, then exit.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Current statistics
    pub fn report(&self) -> CrawlReport {
        self.shared.stats.snapshot()
    }

    pub fn frontier(&self) -> &Frontier {
        &self.shared.frontier
    }

    /// Runs the crawl
    ///
    /// Seeds that are not crawlable URLs are skipped with a warning. Fails
    /// only if no seed is usable or storage cannot be initialized or closed;
    /// page-level failures end up in the stored records.
    pub async fn run(&self, seeds: &[String]) -> Result<CrawlReport> {
        let shared = &self.shared;

        let mut seeded = 0;
        for seed in seeds {
            if !is_valid(seed, None) {
                tracing::warn!("Skipping invalid seed URL: {}", seed);
                continue;
            }
            if shared.frontier.enqueue(seed, 0) {
                seeded += 1;
            }
        }
        if seeded == 0 {
            return Err(SeineError::NoSeeds);
        }

        shared.storage.initialize().await?;

        let workers = shared.config.max_workers.max(1) as usize;
        tracing::info!(
            "Starting crawl: {} seed(s), {} workers, max depth {}, max pages {}",
            seeded,
            workers,
            shared.config.max_depth,
            shared.config.max_pages
        );

        let mut set = JoinSet::new();
        for id in 0..workers {
            set.spawn(run_worker(id, Arc::clone(shared)));
        }

        while let Some(result) = set.join_next().await {
            if let Err(e) = result {
                tracing::error!("Worker fault: {}", e);
            }
        }

        shared.storage.close().await?;

        let report = shared.stats.snapshot();
        tracing::info!(
            "Crawl completed: {} pages ({} successful, {} failed, {} blocked by robots) in {:.2}s, {:.2} pages/sec",
            report.total_crawled,
            report.successful,
            report.failed,
            report.robots_blocked,
            report.elapsed.as_secs_f64(),
            report.pages_per_sec
        );
        tracing::debug!(
            "Visited {} URLs, robots.txt cached for {} origins",
            shared.frontier.visited_count(),
            self.gate.cached_domains()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_no_valid_seeds() {
        let crawler = Crawler::new(CrawlerConfig::default(), Arc::new(MemoryStore::new())).unwrap();
        let seeds = vec!["ftp://example.com/".to_string(), "not a url".to_string()];
        assert!(matches!(
            crawler.run(&seeds).await,
            Err(SeineError::NoSeeds)
        ));
    }

    #[tokio::test]
    async fn test_empty_seed_list() {
        let crawler = Crawler::new(CrawlerConfig::default(), Arc::new(MemoryStore::new())).unwrap();
        assert!(matches!(crawler.run(&[]).await, Err(SeineError::NoSeeds)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_crawls_nothing() {
        let store = Arc::new(MemoryStore::new());
        let crawler = Crawler::new(CrawlerConfig::default(), store.clone()).unwrap();
        crawler.cancellation_token().cancel();

        let report = crawler
            .run(&["http://127.0.0.1:9/".to_string()])
            .await
            .unwrap();
        assert_eq!(report.total_crawled, 0);
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_seeds_are_normalized() {
        let crawler = Crawler::new(CrawlerConfig::default(), Arc::new(MemoryStore::new())).unwrap();
        crawler.frontier().enqueue("HTTPS://Example.com/#top", 0);
        assert!(!crawler.frontier().enqueue("https://example.com/", 0));
    }

    #[test]
    fn test_invalid_durations_are_rejected() {
        let negative = CrawlerConfig {
            delay: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            Crawler::new(negative, Arc::new(MemoryStore::new())),
            Err(SeineError::Config(_))
        ));

        let nan = CrawlerConfig {
            timeout: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            Crawler::new(nan, Arc::new(MemoryStore::new())),
            Err(SeineError::Config(_))
        ));
    }
}
