//! Storage traits and error types
//!
//! This module defines the interface the crawler hands page records to, and
//! the errors storage backends report.

use crate::storage::{PageRecord, StoredSummary};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Storage used before initialize() or after close()")]
    NotInitialized,

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Invalid timestamp in database: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawler only ever talks to this interface; it never inspects which
/// backend is behind it. Implementations must be safe to share between
/// workers.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Prepares the backing store (opens connections, creates the schema)
    ///
    /// Safe to call more than once.
    async fn initialize(&self) -> StorageResult<()>;

    /// Upserts a page record by URL
    ///
    /// Storing the same URL twice leaves exactly one record reflecting the
    /// latest call, including its outbound links.
    async fn store(&self, record: PageRecord) -> StorageResult<()>;

    /// Releases resources; further calls fail with `NotInitialized`
    async fn close(&self) -> StorageResult<()>;

    // ===== Queries =====

    /// Gets the stored record for a URL
    async fn get(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Aggregates totals over every stored record
    async fn summary(&self) -> StorageResult<StoredSummary>;

    /// Lists stored URLs in ascending order, optionally filtered by status code
    async fn urls(&self, status: Option<u16>) -> StorageResult<Vec<String>>;

    /// Lists up to `limit` records with the given status, most recently fetched first
    async fn pages_by_status(&self, status: u16, limit: usize) -> StorageResult<Vec<PageRecord>>;

    /// Finds up to `limit` records whose title or URL contains `query`,
    /// ignoring ASCII case, most recently fetched first
    async fn search(&self, query: &str, limit: usize) -> StorageResult<Vec<PageRecord>>;
}
