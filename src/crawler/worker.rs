//! Worker loop
//!
//! Each worker repeatedly takes a task from the frontier, fetches it, and
//! hands the record to storage. Workers stop when the frontier runs dry or
//! the crawl is cancelled, either by the page budget or from outside.

use crate::crawler::coordinator::Shared;
use crate::crawler::fetcher::FetchOutcome;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Progress is logged every this many pages
const PROGRESS_INTERVAL: u64 = 10;

pub(crate) async fn run_worker(id: usize, shared: Arc<Shared>) {
    let idle = shared.config.idle_timeout();
    let max_pages = shared.config.max_pages;
    debug!("Worker {} started", id);

    loop {
        let claimed = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            claimed = shared.frontier.dequeue(idle) => match claimed {
                Some(claimed) => claimed,
                None => break,
            },
        };
        let task = claimed.task().clone();

        if !shared.frontier.mark_visited(&task.url) {
            continue;
        }

        // Checked again here: the budget may have run out while this worker waited
        if shared.cancel.is_cancelled() || !shared.stats.try_reserve(max_pages) {
            shared.cancel.cancel();
            break;
        }

        match shared.fetcher.fetch(&task).await {
            FetchOutcome::Blocked => {
                info!("Blocked by robots.txt: {}", task.url);
                shared.stats.record_blocked();
                shared.stats.release();
            }
            FetchOutcome::Page(record) => {
                let status_code = record.status_code;
                info!(
                    "Crawled {} [{}] depth {}",
                    task.url,
                    if status_code == 0 {
                        record.error.as_deref().unwrap_or("error").to_string()
                    } else {
                        status_code.to_string()
                    },
                    task.depth
                );

                if let Err(e) = shared.storage.store(record).await {
                    error!("Failed to store {}: {}", task.url, e);
                }

                let total = shared.stats.record_page(status_code);
                if total % PROGRESS_INTERVAL == 0 {
                    info!(
                        "Progress: {} pages crawled, {} in frontier, {:.2} pages/sec",
                        total,
                        shared.frontier.len(),
                        shared.stats.snapshot().pages_per_sec
                    );
                }
                if max_pages > 0 && total >= max_pages {
                    info!("Page budget of {} reached, stopping workers", max_pages);
                    shared.cancel.cancel();
                }
            }
        }

        drop(claimed);
    }

    debug!("Worker {} finished", id);
}
