//! Configuration module for Seine
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and merging command-line overrides on top of them.
//!
//! # Example
//!
//! ```no_run
//! use seine::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("seine.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ConfigOverrides, CrawlerConfig, LoggingConfig, StorageBackend, StorageConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_or_default,
    read_config, write_default_config,
};
pub use validation::{validate, validate_crawler_config};
