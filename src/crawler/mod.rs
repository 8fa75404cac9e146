//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The URL frontier with deduplication and depth tracking
//! - HTTP fetching with retry logic and connection limits
//! - HTML parsing and link extraction
//! - The worker pool and overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod limiter;
mod parser;
mod stats;
mod worker;

pub use coordinator::Crawler;
pub use fetcher::{build_http_client, FetchError, FetchOutcome, Fetcher};
pub use frontier::{Claimed, CrawlTask, Frontier};
pub use limiter::{ConnectionLimiter, ConnectionPermit};
pub use parser::{parse_html, ParsedPage};
pub use stats::{CrawlReport, CrawlStats};
