//! SQLite storage implementation
//!
//! rusqlite is synchronous, so every operation runs on the blocking thread
//! pool while holding the connection lock.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{PageStore, StorageError, StorageResult};
use crate::storage::{like_pattern, sql_limit, PageRecord, StoredSummary};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// SQLite storage backend
pub struct SqliteStore {
    /// Database file; `None` keeps the database in memory
    path: Option<PathBuf>,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Creates a store backed by the database file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a store backed by a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            path: None,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Runs `f` against the open connection on the blocking thread pool
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            let conn = guard.as_mut().ok_or(StorageError::NotInitialized)?;
            f(conn)
        })
        .await?
    }
}

fn open_connection(path: Option<&Path>) -> Result<Connection, rusqlite::Error> {
    let conn = match path {
        Some(path) => {
            let conn = Connection::open(path)?;
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA temp_store = MEMORY;
                PRAGMA mmap_size = 268435456;
            ",
            )?;
            conn
        }
        None => Connection::open_in_memory()?,
    };
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    initialize_schema(&conn)?;
    Ok(conn)
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    // Fixed-width UTC so MIN/MAX over the text column order chronologically
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(text: &str) -> StorageResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
}

fn upsert(conn: &mut Connection, record: &PageRecord) -> StorageResult<()> {
    let tx = conn.transaction()?;

    let page_id: i64 = tx.query_row(
        "INSERT INTO crawled_pages (url, status_code, title, content_length, crawled_at, error_message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(url) DO UPDATE SET
             status_code = excluded.status_code,
             title = excluded.title,
             content_length = excluded.content_length,
             crawled_at = excluded.crawled_at,
             error_message = excluded.error_message
         RETURNING id",
        params![
            record.url,
            record.status_code,
            record.title,
            i64::try_from(record.content_length).unwrap_or(i64::MAX),
            format_timestamp(&record.fetched_at),
            record.error,
        ],
        |row| row.get(0),
    )?;

    tx.execute("DELETE FROM page_links WHERE page_id = ?1", params![page_id])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO page_links (page_id, position, target_url) VALUES (?1, ?2, ?3)",
        )?;
        for (position, link) in record.links.iter().enumerate() {
            stmt.execute(params![page_id, position as i64, link])?;
        }
    }

    tx.commit()?;
    Ok(())
}

const PAGE_COLUMNS: &str =
    "id, url, status_code, title, content_length, crawled_at, error_message";

/// A `crawled_pages` row before its links are attached
struct PageRow {
    id: i64,
    url: String,
    status_code: u16,
    title: String,
    content_length: i64,
    crawled_at: String,
    error: Option<String>,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PageRow> {
    Ok(PageRow {
        id: row.get(0)?,
        url: row.get(1)?,
        status_code: row.get(2)?,
        title: row.get(3)?,
        content_length: row.get(4)?,
        crawled_at: row.get(5)?,
        error: row.get(6)?,
    })
}

fn into_record(conn: &Connection, row: PageRow) -> StorageResult<PageRecord> {
    let mut stmt =
        conn.prepare("SELECT target_url FROM page_links WHERE page_id = ?1 ORDER BY position")?;
    let links = stmt
        .query_map(params![row.id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(PageRecord {
        url: row.url,
        status_code: row.status_code,
        title: row.title,
        content_length: row.content_length.max(0) as u64,
        links,
        fetched_at: parse_timestamp(&row.crawled_at)?,
        error: row.error,
    })
}

fn select_page(conn: &Connection, url: &str) -> StorageResult<Option<PageRecord>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM crawled_pages WHERE url = ?1", PAGE_COLUMNS),
            params![url],
            read_row,
        )
        .optional()?;

    row.map(|row| into_record(conn, row)).transpose()
}

/// Selects records matching `filter`, newest first
fn select_pages(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
    limit: usize,
) -> StorageResult<Vec<PageRecord>> {
    let rows = {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM crawled_pages WHERE {} ORDER BY crawled_at DESC, url LIMIT {}",
            PAGE_COLUMNS,
            filter,
            sql_limit(limit)
        ))?;
        let rows = stmt.query_map(params, read_row)?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    rows.into_iter().map(|row| into_record(conn, row)).collect()
}

#[async_trait]
impl PageStore for SqliteStore {
    async fn initialize(&self) -> StorageResult<()> {
        let conn = Arc::clone(&self.conn);
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let mut guard = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            if guard.is_none() {
                *guard = Some(open_connection(path.as_deref())?);
                debug!("Opened SQLite database {:?}", path);
            }
            Ok(())
        })
        .await?
    }

    async fn store(&self, record: PageRecord) -> StorageResult<()> {
        self.with_conn(move |conn| upsert(conn, &record)).await
    }

    async fn close(&self) -> StorageResult<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let mut guard = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            if let Some(conn) = guard.take() {
                conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
            }
            Ok(())
        })
        .await?
    }

    async fn get(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let url = url.to_string();
        self.with_conn(move |conn| select_page(conn, &url)).await
    }

    async fn summary(&self) -> StorageResult<StoredSummary> {
        self.with_conn(|conn| {
            let (total, successful, avg, first, last) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN status_code = 200 THEN 1 ELSE 0 END), 0),
                        COALESCE(AVG(content_length), 0.0),
                        MIN(crawled_at),
                        MAX(crawled_at)
                 FROM crawled_pages",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )?;

            Ok(StoredSummary {
                total: total as u64,
                successful: successful as u64,
                failed: (total - successful) as u64,
                avg_content_length: avg,
                first_crawl: first.as_deref().map(parse_timestamp).transpose()?,
                last_crawl: last.as_deref().map(parse_timestamp).transpose()?,
            })
        })
        .await
    }

    async fn urls(&self, status: Option<u16>) -> StorageResult<Vec<String>> {
        self.with_conn(move |conn| {
            let urls = match status {
                Some(status) => {
                    let mut stmt = conn.prepare(
                        "SELECT url FROM crawled_pages WHERE status_code = ?1 ORDER BY url",
                    )?;
                    let rows = stmt.query_map(params![status], |row| row.get(0))?;
                    rows.collect::<Result<Vec<String>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare("SELECT url FROM crawled_pages ORDER BY url")?;
                    let rows = stmt.query_map([], |row| row.get(0))?;
                    rows.collect::<Result<Vec<String>, _>>()?
                }
            };
            Ok(urls)
        })
        .await
    }

    async fn pages_by_status(&self, status: u16, limit: usize) -> StorageResult<Vec<PageRecord>> {
        self.with_conn(move |conn| {
            select_pages(conn, "status_code = ?1", params![status], limit)
        })
        .await
    }

    async fn search(&self, query: &str, limit: usize) -> StorageResult<Vec<PageRecord>> {
        let pattern = like_pattern(query);
        self.with_conn(move |conn| {
            select_pages(
                conn,
                r"title LIKE ?1 ESCAPE '\' OR url LIKE ?1 ESCAPE '\'",
                params![pattern],
                limit,
            )
        })
        .await
    }
}
