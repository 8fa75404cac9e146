//! Database schema definitions
//!
//! Both SQL backends share the same tables; only the column types differ.

/// SQLite schema
pub const SQLITE_SCHEMA: &str = r#"
-- One row per crawled URL, upserted on every fetch
CREATE TABLE IF NOT EXISTS crawled_pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    status_code INTEGER NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    content_length INTEGER NOT NULL DEFAULT 0,
    crawled_at TEXT NOT NULL,
    error_message TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_url ON crawled_pages(url);
CREATE INDEX IF NOT EXISTS idx_status ON crawled_pages(status_code);
CREATE INDEX IF NOT EXISTS idx_crawled_at ON crawled_pages(crawled_at);

-- Outbound links of the latest fetch of each page
CREATE TABLE IF NOT EXISTS page_links (
    page_id INTEGER NOT NULL REFERENCES crawled_pages(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    target_url TEXT NOT NULL,
    PRIMARY KEY (page_id, position)
);

CREATE INDEX IF NOT EXISTS idx_page_links_target ON page_links(target_url);
"#;

/// PostgreSQL schema
pub const POSTGRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS crawled_pages (
    id BIGSERIAL PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    status_code INTEGER NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    content_length BIGINT NOT NULL DEFAULT 0,
    crawled_at TIMESTAMPTZ NOT NULL,
    error_message TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_url ON crawled_pages(url);
CREATE INDEX IF NOT EXISTS idx_status ON crawled_pages(status_code);
CREATE INDEX IF NOT EXISTS idx_crawled_at ON crawled_pages(crawled_at);

CREATE TABLE IF NOT EXISTS page_links (
    page_id BIGINT NOT NULL REFERENCES crawled_pages(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    target_url TEXT NOT NULL,
    PRIMARY KEY (page_id, position)
);

CREATE INDEX IF NOT EXISTS idx_page_links_target ON page_links(target_url);
"#;

/// Initializes the SQLite schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SQLITE_SCHEMA)?;
    Ok(())
}
