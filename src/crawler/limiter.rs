//! Connection limits
//!
//! reqwest pools connections but does not cap how many are open, so page
//! requests pass through two semaphores: one for the whole crawl and one per
//! host.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps concurrent page requests in total and per host
#[derive(Debug)]
pub struct ConnectionLimiter {
    global: Arc<Semaphore>,
    per_host: Mutex<HashMap<String, Arc<Semaphore>>>,
    per_host_limit: usize,
}

/// Held for the duration of one request
#[derive(Debug)]
pub struct ConnectionPermit {
    _host: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

impl ConnectionLimiter {
    pub fn new(max_connections: usize, max_per_host: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(max_connections.max(1))),
            per_host: Mutex::new(HashMap::new()),
            per_host_limit: max_per_host.max(1),
        }
    }

    /// Waits for a free connection slot to `host`
    ///
    /// The host slot is taken first so requests queued behind a busy host do
    /// not hold global slots other hosts could use. Returns `None` only if the
    /// semaphores were closed.
    pub async fn acquire(&self, host: &str) -> Option<ConnectionPermit> {
        let host_semaphore = {
            let mut per_host = self.per_host.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                per_host
                    .entry(host.to_string())
                    .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit))),
            )
        };

        let host_permit = host_semaphore.acquire_owned().await.ok()?;
        let global_permit = Arc::clone(&self.global).acquire_owned().await.ok()?;

        Some(ConnectionPermit {
            _host: host_permit,
            _global: global_permit,
        })
    }

    /// Global slots currently free
    pub fn available(&self) -> usize {
        self.global.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_permits_are_returned_on_drop() {
        let limiter = ConnectionLimiter::new(2, 2);
        let permit = limiter.acquire("a.test").await.unwrap();
        assert_eq!(limiter.available(), 1);
        drop(permit);
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test]
    async fn test_per_host_limit() {
        let limiter = Arc::new(ConnectionLimiter::new(10, 1));
        let _held = limiter.acquire("a.test").await.unwrap();

        // Another host is unaffected
        let other = tokio::time::timeout(Duration::from_millis(100), limiter.acquire("b.test"))
            .await
            .unwrap();
        assert!(other.is_some());

        // The same host has to wait
        let same =
            tokio::time::timeout(Duration::from_millis(100), limiter.acquire("a.test")).await;
        assert!(same.is_err());
    }

    #[tokio::test]
    async fn test_global_limit() {
        let limiter = ConnectionLimiter::new(1, 5);
        let _held = limiter.acquire("a.test").await.unwrap();
        let blocked =
            tokio::time::timeout(Duration::from_millis(100), limiter.acquire("b.test")).await;
        assert!(blocked.is_err());
    }
}
