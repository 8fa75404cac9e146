//! Seine: a polite concurrent web harvester
//!
//! This crate crawls pages reachable from a set of seed URLs, honors robots.txt,
//! and hands one structured record per fetched page to a storage backend.

pub mod config;
pub mod crawler;
pub mod robots;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Seine operations
#[derive(Debug, Error)]
pub enum SeineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("No valid seed URLs to crawl")]
    NoSeeds,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Seine operations
pub type Result<T> = std::result::Result<T, SeineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlReport, Crawler};
pub use storage::{open_store, PageRecord, PageStore};
pub use url::{is_valid, normalize};
