//! In-memory storage, used by tests and `--db-type memory` dry runs

use crate::storage::traits::{PageStore, StorageError, StorageResult};
use crate::storage::{PageRecord, StoredSummary};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Keeps the latest record for every URL in a map
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, PageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored record, ordered by URL
    pub fn records(&self) -> Vec<PageRecord> {
        let mut records: Vec<PageRecord> = self
            .records
            .lock()
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.url.cmp(&b.url));
        records
    }

    fn newest_matching(
        &self,
        limit: usize,
        predicate: impl Fn(&PageRecord) -> bool,
    ) -> StorageResult<Vec<PageRecord>> {
        let mut matches: Vec<PageRecord> = self
            .lock()?
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at).then_with(|| a.url.cmp(&b.url)));
        matches.truncate(limit);
        Ok(matches)
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, PageRecord>>> {
        self.records.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn initialize(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn store(&self, record: PageRecord) -> StorageResult<()> {
        self.lock()?.insert(record.url.clone(), record);
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn get(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        Ok(self.lock()?.get(url).cloned())
    }

    async fn summary(&self) -> StorageResult<StoredSummary> {
        let records = self.lock()?;
        let total = records.len() as u64;
        let successful = records.values().filter(|r| r.is_success()).count() as u64;
        let avg_content_length = if total == 0 {
            0.0
        } else {
            records.values().map(|r| r.content_length as f64).sum::<f64>() / total as f64
        };

        Ok(StoredSummary {
            total,
            successful,
            failed: total - successful,
            avg_content_length,
            first_crawl: records.values().map(|r| r.fetched_at).min(),
            last_crawl: records.values().map(|r| r.fetched_at).max(),
        })
    }

    async fn urls(&self, status: Option<u16>) -> StorageResult<Vec<String>> {
        let mut urls: Vec<String> = self
            .lock()?
            .values()
            .filter(|r| status.map_or(true, |status| r.status_code == status))
            .map(|r| r.url.clone())
            .collect();
        urls.sort();
        Ok(urls)
    }

    async fn pages_by_status(&self, status: u16, limit: usize) -> StorageResult<Vec<PageRecord>> {
        self.newest_matching(limit, |r| r.status_code == status)
    }

    async fn search(&self, query: &str, limit: usize) -> StorageResult<Vec<PageRecord>> {
        let query = query.to_ascii_lowercase();
        self.newest_matching(limit, |r| {
            r.title.to_ascii_lowercase().contains(&query)
                || r.url.to_ascii_lowercase().contains(&query)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, status: u16) -> PageRecord {
        PageRecord {
            status_code: status,
            error: None,
            ..PageRecord::failed(url, "")
        }
    }

    #[tokio::test]
    async fn test_store_twice_keeps_latest() {
        let store = MemoryStore::new();
        store.store(record("https://example.com/", 503)).await.unwrap();
        store.store(record("https://example.com/", 200)).await.unwrap();

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status_code, 200);
    }

    #[tokio::test]
    async fn test_summary_and_urls() {
        let store = MemoryStore::new();
        store.store(record("https://example.com/b", 200)).await.unwrap();
        store.store(record("https://example.com/a", 404)).await.unwrap();

        let summary = store.summary().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);

        assert_eq!(
            store.urls(None).await.unwrap(),
            vec!["https://example.com/a", "https://example.com/b"]
        );
        assert_eq!(
            store.urls(Some(404)).await.unwrap(),
            vec!["https://example.com/a"]
        );
    }

    #[tokio::test]
    async fn test_pages_by_status_and_search() {
        let store = MemoryStore::new();
        let base = chrono::Utc::now();
        for (i, url) in ["https://example.com/rust", "https://example.com/b", "https://example.com/c"]
            .iter()
            .enumerate()
        {
            let mut page = record(url, 404);
            page.fetched_at = base + chrono::Duration::seconds(i as i64);
            store.store(page).await.unwrap();
        }
        let mut titled = record("https://example.com/d", 200);
        titled.title = "Learning RUST".to_string();
        store.store(titled).await.unwrap();

        let pages = store.pages_by_status(404, 2).await.unwrap();
        assert_eq!(pages[0].url, "https://example.com/c");
        assert_eq!(pages[1].url, "https://example.com/b");
        assert_eq!(pages.len(), 2);

        let found = store.search("Rust", 10).await.unwrap();
        let mut urls: Vec<_> = found.iter().map(|p| p.url.as_str()).collect();
        urls.sort();
        assert_eq!(urls, vec!["https://example.com/d", "https://example.com/rust"]);
        assert!(store.search("python", 10).await.unwrap().is_empty());
    }
}
