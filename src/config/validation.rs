use crate::config::types::{Config, CrawlerConfig, LoggingConfig, StorageBackend, StorageConfig};
use crate::ConfigError;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_storage_config(&config.storage)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates crawler configuration
///
/// Every duration must pass here before it reaches `Duration::from_secs_f64`.
pub fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > 100 {
        return Err(ConfigError::Validation(format!(
            "max-workers must be between 1 and 100, got {}",
            config.max_workers
        )));
    }

    validate_seconds("delay", config.delay, true)?;
    validate_seconds("timeout", config.timeout, false)?;
    validate_seconds("retry-delay", config.retry_delay, true)?;
    validate_seconds("idle-timeout", config.idle_timeout, false)?;
    validate_seconds("robots-timeout", config.robots_timeout, false)?;
    if let Some(ttl) = config.robots_ttl {
        validate_seconds("robots-ttl", ttl, false)?;
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.max_connections < 1 || config.max_connections_per_host < 1 {
        return Err(ConfigError::Validation(format!(
            "connection limits must be >= 1, got {} total / {} per host",
            config.max_connections, config.max_connections_per_host
        )));
    }

    Ok(())
}

/// Validates a duration given in seconds
///
/// `Duration::from_secs_f64` panics on negative or non-finite input, so
/// anything reaching the crawler must pass this check.
fn validate_seconds(name: &str, value: f64, allow_zero: bool) -> Result<(), ConfigError> {
    let in_range = if allow_zero { value >= 0.0 } else { value > 0.0 };
    if !value.is_finite() || !in_range || value > 86_400.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be a {} number of seconds up to one day, got {}",
            name,
            if allow_zero { "non-negative" } else { "positive" },
            value
        )));
    }
    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    match config.backend {
        StorageBackend::Memory => Ok(()),
        StorageBackend::Sqlite if config.url.is_empty() => Err(ConfigError::Validation(
            "storage url must name a SQLite database file".to_string(),
        )),
        StorageBackend::Postgres
            if !(config.url.starts_with("postgres://")
                || config.url.starts_with("postgresql://")
                || config.url.contains("host=")) =>
        {
            Err(ConfigError::InvalidUrl(format!(
                "'{}' is not a PostgreSQL connection string",
                config.url
            )))
        }
        _ => Ok(()),
    }
}

/// Validates logging configuration
fn validate_logging_config(config: &LoggingConfig) -> Result<(), ConfigError> {
    if !LOG_LEVELS.contains(&config.level.to_lowercase().as_str()) {
        return Err(ConfigError::Validation(format!(
            "log level must be one of {}, got '{}'",
            LOG_LEVELS.join(", "),
            config.level
        )));
    }

    if matches!(&config.file, Some(file) if file.is_empty()) {
        return Err(ConfigError::Validation(
            "log file path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
