//! Storage module for persisting crawl results
//!
//! This module handles everything that happens to a page record after the
//! crawler is done with it:
//! - SQLite and PostgreSQL backends sharing one schema
//! - An in-memory backend for tests and dry runs
//! - Summary and export queries used by the CLI

mod memory;
mod postgres;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use traits::{PageStore, StorageError, StorageResult};

use crate::config::{StorageBackend, StorageConfig};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Creates the storage backend selected by the configuration
///
/// No connection is made until [`PageStore::initialize`] is called.
pub fn open_store(config: &StorageConfig) -> Arc<dyn PageStore> {
    match config.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStore::new(&config.url)),
        StorageBackend::Postgres => Arc::new(PostgresStore::new(&config.url)),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    }
}

/// The outcome of one completed fetch attempt
///
/// Built once by the fetcher and handed to storage; never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub url: String,
    /// HTTP status, or 0 when no response was received
    pub status_code: u16,
    /// Text of `<title>`, empty for non-HTML responses and failures
    pub title: String,
    /// Body size in bytes for HTML responses, otherwise 0
    pub content_length: u64,
    /// Normalized outbound links, deduplicated, in document order
    pub links: Vec<String>,
    pub fetched_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl PageRecord {
    /// Creates a record for a fetch that produced no response
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status_code: 0,
            title: String::new(),
            content_length: 0,
            links: Vec::new(),
            fetched_at: Utc::now(),
            error: Some(error.into()),
        }
    }

    /// Returns true for HTTP 200 responses
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Totals over all stored records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredSummary {
    pub total: u64,
    /// Records with status 200
    pub successful: u64,
    /// Everything else, including status 0
    pub failed: u64,
    pub avg_content_length: f64,
    pub first_crawl: Option<DateTime<Utc>>,
    pub last_crawl: Option<DateTime<Utc>>,
}

/// Builds a `LIKE` pattern matching `query` anywhere in a column
///
/// `%`, `_` and the backslash escape character are matched literally.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Clamps a result limit to what SQL `LIMIT` accepts
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
