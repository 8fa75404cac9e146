//! Crawl statistics
//!
//! Counters are atomics shared by every worker. The page budget is enforced
//! with a separate reservation counter: a worker reserves a slot before it
//! fetches, so concurrent workers can never push the total past `max_pages`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for one crawl run
#[derive(Debug)]
pub struct CrawlStats {
    total_crawled: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    robots_blocked: AtomicU64,
    /// Fetches started or finished; never exceeds the page budget
    reserved: AtomicU64,
    start_time: Instant,
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlStats {
    pub fn new() -> Self {
        Self {
            total_crawled: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            robots_blocked: AtomicU64::new(0),
            reserved: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Claims one slot of the page budget
    ///
    /// Returns false once `max_pages` slots are taken. A budget of 0 is
    /// unlimited.
    pub fn try_reserve(&self, max_pages: u64) -> bool {
        if max_pages == 0 {
            self.reserved.fetch_add(1, Ordering::SeqCst);
            return true;
        }
        self.reserved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |reserved| {
                (reserved < max_pages).then_some(reserved + 1)
            })
            .is_ok()
    }

    /// Gives back a slot that did not turn into a crawled page
    pub fn release(&self) {
        let _ = self
            .reserved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |reserved| {
                reserved.checked_sub(1)
            });
    }

    /// Counts a completed fetch and returns the new total
    pub fn record_page(&self, status_code: u16) -> u64 {
        if status_code == 200 {
            self.successful.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        self.total_crawled.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_blocked(&self) {
        self.robots_blocked.fetch_add(1, Ordering::SeqCst);
    }

    pub fn total_crawled(&self) -> u64 {
        self.total_crawled.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Captures the counters for reporting
    pub fn snapshot(&self) -> CrawlReport {
        let elapsed = self.elapsed();
        let total_crawled = self.total_crawled();
        let secs = elapsed.as_secs_f64();

        CrawlReport {
            total_crawled,
            successful: self.successful.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            robots_blocked: self.robots_blocked.load(Ordering::SeqCst),
            elapsed,
            pages_per_sec: if secs > 0.0 {
                total_crawled as f64 / secs
            } else {
                0.0
            },
        }
    }
}

/// Final statistics of a crawl run
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlReport {
    pub total_crawled: u64,
    pub successful: u64,
    pub failed: u64,
    pub robots_blocked: u64,
    pub elapsed: Duration,
    pub pages_per_sec: f64,
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Crawl Statistics ===\n")?;
        writeln!(f, "  Total pages crawled: {}", self.total_crawled)?;
        writeln!(f, "  Successful: {}", self.successful)?;
        writeln!(f, "  Failed: {}", self.failed)?;
        writeln!(f, "  Blocked by robots: {}", self.robots_blocked)?;
        writeln!(f, "  Elapsed: {:.2}s", self.elapsed.as_secs_f64())?;
        write!(f, "  Throughput: {:.2} pages/sec", self.pages_per_sec)
    }
}
