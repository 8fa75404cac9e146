//! Cached robots.txt entries

use crate::robots::RobotsRules;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Robots rules cached for one `scheme://host` origin
#[derive(Debug, Clone)]
pub struct RobotsEntry {
    /// Cache key, e.g. `https://example.com`
    pub domain: String,

    pub rules: RobotsRules,

    /// When the robots.txt was fetched (or the fail-open default installed)
    pub fetched_at: DateTime<Utc>,
}

impl RobotsEntry {
    /// Creates a new entry stamped with the current time
    pub fn new(domain: impl Into<String>, rules: RobotsRules) -> Self {
        Self {
            domain: domain.into(),
            rules,
            fetched_at: Utc::now(),
        }
    }

    /// Returns the age of the entry
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.fetched_at
    }

    /// Checks whether the entry has outlived `ttl`
    ///
    /// Without a TTL an entry lives for the whole crawl.
    pub fn is_stale(&self, ttl: Option<Duration>) -> bool {
        match ttl.map(chrono::Duration::from_std) {
            Some(Ok(ttl)) => self.age() > ttl,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_not_stale() {
        let entry = RobotsEntry::new("https://example.com", RobotsRules::allow_all());
        assert!(!entry.is_stale(Some(Duration::from_secs(60))));
        assert!(!entry.is_stale(None));
    }

    #[test]
    fn test_entry_is_stale_after_ttl() {
        let mut entry = RobotsEntry::new("https://example.com", RobotsRules::allow_all());
        entry.fetched_at = Utc::now() - chrono::Duration::minutes(5);

        assert!(entry.is_stale(Some(Duration::from_secs(60))));
        assert!(!entry.is_stale(Some(Duration::from_secs(3600))));
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let mut entry = RobotsEntry::new("https://example.com", RobotsRules::allow_all());
        entry.fetched_at = Utc::now() - chrono::Duration::days(30);
        assert!(!entry.is_stale(None));
    }
}
