//! Seine main entry point
//!
//! This is the command-line interface for the Seine web harvester.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use seine::config::{
    load_or_default, validate, write_default_config, Config, ConfigOverrides, LoggingConfig,
    StorageBackend,
};
use seine::storage::{open_store, PageRecord, PageStore, StoredSummary};
use seine::Crawler;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Seine: a polite concurrent web harvester
///
/// Seine crawls pages reachable from a set of seed URLs while respecting
/// robots.txt, and stores the status, title, size, and outbound links of
/// every page it fetches.
#[derive(Parser, Debug)]
#[command(name = "seine")]
#[command(version)]
#[command(about = "A polite concurrent web harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply if it does not exist)
    #[arg(short, long, global = true, default_value = "seine.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl from the seed URLs
    Crawl(CrawlArgs),

    /// Show statistics of the stored crawl results
    Stats(DbArgs),

    /// Write stored URLs to a text file, one per line
    Export {
        #[command(flatten)]
        db: DbArgs,

        /// Only export URLs with this HTTP status
        #[arg(long)]
        status: Option<u16>,

        /// Output file
        #[arg(short, long, default_value = "urls.txt")]
        output: PathBuf,
    },

    /// Search stored pages by title or URL
    Search {
        #[command(flatten)]
        db: DbArgs,

        /// Text to look for (case-insensitive)
        query: String,

        /// Maximum number of results
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// List the most recently crawled pages with an HTTP status
    Pages {
        #[command(flatten)]
        db: DbArgs,

        /// HTTP status to list (0 = no response)
        #[arg(long)]
        status: u16,

        /// Maximum number of results
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Write a configuration file with default values
    InitConfig {
        /// Where to write the file
        #[arg(default_value = "seine.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Seed URLs (replace the seeds in the config file)
    #[arg(long, num_args = 1.., value_name = "URL")]
    seeds: Vec<String>,

    /// Maximum link depth from a seed
    #[arg(long)]
    depth: Option<u32>,

    /// Stop after this many pages (0 = unlimited)
    #[arg(long)]
    max_pages: Option<u64>,

    /// Number of concurrent workers
    #[arg(long)]
    workers: Option<u32>,

    /// Seconds to wait before each request
    #[arg(long)]
    delay: Option<f64>,

    /// Page request timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,

    #[command(flatten)]
    db: DbArgs,

    /// Follow links to other hosts
    #[arg(long)]
    allow_external: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<String>,
}

#[derive(Args, Debug)]
struct DbArgs {
    /// SQLite file or PostgreSQL connection string
    #[arg(long, value_name = "PATH_OR_URL")]
    db: Option<String>,

    /// Storage backend (detected from --db when omitted)
    #[arg(long, value_enum)]
    db_type: Option<DbType>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DbType {
    Sqlite,
    Postgres,
    Memory,
}

impl From<DbType> for StorageBackend {
    fn from(db_type: DbType) -> Self {
        match db_type {
            DbType::Sqlite => StorageBackend::Sqlite,
            DbType::Postgres => StorageBackend::Postgres,
            DbType::Memory => StorageBackend::Memory,
        }
    }
}

impl DbArgs {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            database_url: self.db,
            backend: self.db_type.map(StorageBackend::from),
            ..Default::default()
        }
    }
}

impl CrawlArgs {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            seeds: self.seeds,
            max_depth: self.depth,
            max_pages: self.max_pages,
            max_workers: self.workers,
            delay: self.delay,
            timeout: self.timeout,
            allow_external: self.allow_external,
            log_level: self.log_level,
            log_file: self.log_file,
            ..self.db.into_overrides()
        }
    }
}

/// What to do once the configuration is resolved
enum Action {
    Crawl,
    Stats,
    Export { status: Option<u16>, output: PathBuf },
    Search { query: String, limit: usize },
    Pages { status: u16, limit: usize },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (overrides, action) = match cli.command {
        Command::InitConfig { path, force } => {
            setup_logging(cli.verbose, cli.quiet, &LoggingConfig::default())?;
            return handle_init_config(&path, force);
        }
        Command::Crawl(args) => (args.into_overrides(), Action::Crawl),
        Command::Stats(db) => (db.into_overrides(), Action::Stats),
        Command::Export { db, status, output } => {
            (db.into_overrides(), Action::Export { status, output })
        }
        Command::Search { db, query, limit } => {
            (db.into_overrides(), Action::Search { query, limit })
        }
        Command::Pages { db, status, limit } => {
            (db.into_overrides(), Action::Pages { status, limit })
        }
    };

    let (mut config, config_hash) = load_or_default(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    overrides.apply(&mut config);
    validate(&config).context("Invalid configuration")?;

    setup_logging(cli.verbose, cli.quiet, &config.logging)?;
    match config_hash {
        Some(hash) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            cli.config.display(),
            hash
        ),
        None => tracing::info!(
            "No configuration file at {}, using defaults",
            cli.config.display()
        ),
    }

    match action {
        Action::Crawl => handle_crawl(config).await,
        Action::Stats => handle_stats(&config).await,
        Action::Export { status, output } => handle_export(&config, status, &output).await,
        Action::Search { query, limit } => handle_search(&config, &query, limit).await,
        Action::Pages { status, limit } => handle_pages(&config, status, limit).await,
    }
}

/// Sets up the logging/tracing subscriber
///
/// `RUST_LOG` takes precedence, then `-q`/`-v`, then the configured level.
fn setup_logging(verbose: u8, quiet: bool, logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = if let Ok(filter) = EnvFilter::try_from_default_env() {
        filter
    } else if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new(format!("seine={},warn", logging.level.to_lowercase())),
            1 => EnvFilter::new("seine=debug,info"),
            2 => EnvFilter::new("seine=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }

    Ok(())
}

/// Handles `init-config`: writes the default configuration
fn handle_init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    write_default_config(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("✓ Default configuration written to: {}", path.display());
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config.storage);
    let crawler = Crawler::new(config.crawler.clone(), store)?;

    let token = crawler.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing pages in flight");
            token.cancel();
        }
    });

    match crawler.run(&config.seeds).await {
        Ok(report) => {
            if report.total_crawled == 0 {
                tracing::warn!("No pages were crawled");
            }
            println!("\n{}", report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles `stats`: prints totals from storage
async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let store = open_for_query(config).await?;
    let summary = store.summary().await?;
    store.close().await?;

    println!("Database: {}\n", config.storage.url);
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &StoredSummary) {
    println!("=== Crawl Statistics ===\n");
    println!("  Total pages: {}", summary.total);

    let percentage = |count: u64| {
        if summary.total > 0 {
            count as f64 / summary.total as f64 * 100.0
        } else {
            0.0
        }
    };
    println!(
        "  Successful (200): {} ({:.1}%)",
        summary.successful,
        percentage(summary.successful)
    );
    println!(
        "  Failed: {} ({:.1}%)",
        summary.failed,
        percentage(summary.failed)
    );
    println!(
        "  Average content length: {:.0} bytes",
        summary.avg_content_length
    );

    if let (Some(first), Some(last)) = (summary.first_crawl, summary.last_crawl) {
        println!("  First crawl: {}", first.to_rfc3339());
        println!("  Last crawl: {}", last.to_rfc3339());
    }
}

/// Handles `export`: writes stored URLs to a file
async fn handle_export(config: &Config, status: Option<u16>, output: &Path) -> anyhow::Result<()> {
    let store = open_for_query(config).await?;
    let urls = store.urls(status).await?;
    store.close().await?;

    let mut content = urls.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    std::fs::write(output, content)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("✓ Exported {} URLs to: {}", urls.len(), output.display());
    Ok(())
}

/// Opens the configured storage for a read-only query
async fn open_for_query(config: &Config) -> anyhow::Result<Arc<dyn PageStore>> {
    let store = open_store(&config.storage);
    store
        .initialize()
        .await
        .with_context(|| format!("Failed to open storage {}", config.storage.url))?;
    Ok(store)
}

/// Handles `search`: lists pages whose title or URL contains the query
async fn handle_search(config: &Config, query: &str, limit: usize) -> anyhow::Result<()> {
    let store = open_for_query(config).await?;
    let pages = store.search(query, limit).await?;
    store.close().await?;

    println!("=== Search Results for \"{}\" ===\n", query);
    print_pages(&pages);
    Ok(())
}

/// Handles `pages`: lists the latest pages with one status
async fn handle_pages(config: &Config, status: u16, limit: usize) -> anyhow::Result<()> {
    let store = open_for_query(config).await?;
    let pages = store.pages_by_status(status, limit).await?;
    store.close().await?;

    println!("=== Pages with Status {} ===\n", status);
    print_pages(&pages);
    Ok(())
}

fn print_pages(pages: &[PageRecord]) {
    if pages.is_empty() {
        println!("  (none)");
        return;
    }
    for page in pages {
        println!("  [{}] {}", page.status_code, page.url);
        if !page.title.is_empty() {
            println!("        {}", page.title);
        }
        if let Some(error) = &page.error {
            println!("        error: {}", error);
        }
        println!(
            "        {} bytes, crawled {}",
            page.content_length,
            page.fetched_at.to_rfc3339()
        );
    }
    println!("\n  {} page(s)", pages.len());
}
