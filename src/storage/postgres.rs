//! PostgreSQL storage implementation

use crate::storage::schema::POSTGRES_SCHEMA;
use crate::storage::traits::{PageStore, StorageError, StorageResult};
use crate::storage::{like_pattern, sql_limit, PageRecord, StoredSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error};

/// PostgreSQL storage backend
pub struct PostgresStore {
    url: String,
    client: Mutex<Option<Client>>,
    /// Drives the connection; finishes once the client is dropped
    connection: Mutex<Option<JoinHandle<()>>>,
}

impl PostgresStore {
    /// Creates a store for the given connection string
    ///
    /// Accepts both URL (`postgres://user@host/db`) and key-value
    /// (`host=localhost user=crawler`) forms.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: Mutex::new(None),
            connection: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PageStore for PostgresStore {
    async fn initialize(&self) -> StorageResult<()> {
        let mut client = self.client.lock().await;
        if client.is_some() {
            return Ok(());
        }

        let (new_client, connection) = tokio_postgres::connect(&self.url, NoTls).await?;
        let handle = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        new_client.batch_execute(POSTGRES_SCHEMA).await?;
        debug!("Connected to PostgreSQL");

        *client = Some(new_client);
        *self.connection.lock().await = Some(handle);
        Ok(())
    }

    async fn store(&self, record: PageRecord) -> StorageResult<()> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(StorageError::NotInitialized)?;
        let tx = client.transaction().await?;

        let row = tx
            .query_one(
                "INSERT INTO crawled_pages (url, status_code, title, content_length, crawled_at, error_message)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (url) DO UPDATE SET
                     status_code = EXCLUDED.status_code,
                     title = EXCLUDED.title,
                     content_length = EXCLUDED.content_length,
                     crawled_at = EXCLUDED.crawled_at,
                     error_message = EXCLUDED.error_message
                 RETURNING id",
                &[
                    &record.url,
                    &i32::from(record.status_code),
                    &record.title,
                    &i64::try_from(record.content_length).unwrap_or(i64::MAX),
                    &record.fetched_at,
                    &record.error,
                ],
            )
            .await?;
        let page_id: i64 = row.get(0);

        tx.execute("DELETE FROM page_links WHERE page_id = $1", &[&page_id])
            .await?;
        if !record.links.is_empty() {
            let stmt = tx
                .prepare("INSERT INTO page_links (page_id, position, target_url) VALUES ($1, $2, $3)")
                .await?;
            for (position, link) in record.links.iter().enumerate() {
                tx.execute(&stmt, &[&page_id, &(position as i32), link])
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        drop(self.client.lock().await.take());
        if let Some(handle) = self.connection.lock().await.take() {
            handle.await?;
        }
        Ok(())
    }

    async fn get(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(StorageError::NotInitialized)?;

        let sql = format!("SELECT {} FROM crawled_pages WHERE url = $1", PAGE_COLUMNS);
        match client.query_opt(sql.as_str(), &[&url]).await? {
            Some(row) => Ok(Some(into_record(client, &row).await?)),
            None => Ok(None),
        }
    }

    async fn summary(&self) -> StorageResult<StoredSummary> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(StorageError::NotInitialized)?;

        let row = client
            .query_one(
                "SELECT COUNT(*),
                        COUNT(*) FILTER (WHERE status_code = 200),
                        COALESCE(AVG(content_length), 0)::DOUBLE PRECISION,
                        MIN(crawled_at),
                        MAX(crawled_at)
                 FROM crawled_pages",
                &[],
            )
            .await?;

        let total: i64 = row.get(0);
        let successful: i64 = row.get(1);
        Ok(StoredSummary {
            total: total as u64,
            successful: successful as u64,
            failed: (total - successful) as u64,
            avg_content_length: row.get(2),
            first_crawl: row.get::<_, Option<DateTime<Utc>>>(3),
            last_crawl: row.get::<_, Option<DateTime<Utc>>>(4),
        })
    }

    async fn urls(&self, status: Option<u16>) -> StorageResult<Vec<String>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(StorageError::NotInitialized)?;

        let rows = match status {
            Some(status) => {
                client
                    .query(
                        "SELECT url FROM crawled_pages WHERE status_code = $1 ORDER BY url",
                        &[&i32::from(status)],
                    )
                    .await?
            }
            None => {
                client
                    .query("SELECT url FROM crawled_pages ORDER BY url", &[])
                    .await?
            }
        };
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn pages_by_status(&self, status: u16, limit: usize) -> StorageResult<Vec<PageRecord>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(StorageError::NotInitialized)?;

        let sql = format!(
            "SELECT {} FROM crawled_pages WHERE status_code = $1
             ORDER BY crawled_at DESC, url LIMIT $2",
            PAGE_COLUMNS
        );
        let rows = client
            .query(sql.as_str(), &[&i32::from(status), &sql_limit(limit)])
            .await?;
        into_records(client, &rows).await
    }

    async fn search(&self, query: &str, limit: usize) -> StorageResult<Vec<PageRecord>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(StorageError::NotInitialized)?;

        let sql = format!(
            "SELECT {} FROM crawled_pages WHERE title ILIKE $1 OR url ILIKE $1
             ORDER BY crawled_at DESC, url LIMIT $2",
            PAGE_COLUMNS
        );
        let rows = client
            .query(sql.as_str(), &[&like_pattern(query), &sql_limit(limit)])
            .await?;
        into_records(client, &rows).await
    }
}

const PAGE_COLUMNS: &str =
    "id, url, status_code, title, content_length, crawled_at, error_message";

/// Builds a record from a `PAGE_COLUMNS` row, loading its links
async fn into_record(client: &Client, row: &Row) -> StorageResult<PageRecord> {
    let page_id: i64 = row.get(0);
    let links = client
        .query(
            "SELECT target_url FROM page_links WHERE page_id = $1 ORDER BY position",
            &[&page_id],
        )
        .await?
        .iter()
        .map(|row| row.get(0))
        .collect();

    Ok(PageRecord {
        url: row.get(1),
        status_code: u16::try_from(row.get::<_, i32>(2)).unwrap_or(0),
        title: row.get(3),
        content_length: row.get::<_, i64>(4).max(0) as u64,
        links,
        fetched_at: row.get(5),
        error: row.get(6),
    })
}

async fn into_records(client: &Client, rows: &[Row]) -> StorageResult<Vec<PageRecord>> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(into_record(client, row).await?);
    }
    Ok(records)
}
