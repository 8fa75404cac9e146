//! The crawl frontier
//!
//! A FIFO queue of (URL, depth) tasks plus the `queued` and `visited` sets
//! that admit every normalized URL at most once per run. All state sits
//! behind one mutex; idle workers park on a [`Notify`].
//!
//! The frontier also counts tasks that have been dequeued but not yet
//! finished. An empty queue with nothing in flight can never grow again, so
//! waiting workers are released immediately instead of sitting out the idle
//! timeout.

use crate::url::normalize;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized URL
    pub url: String,
    /// Link hops from the seed
    pub depth: u32,
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<CrawlTask>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    in_flight: usize,
}

impl FrontierState {
    fn drained(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0
    }
}

/// Shared frontier used by every worker
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    notify: Notify,
    max_depth: u32,
}

impl Frontier {
    pub fn new(max_depth: u32) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            notify: Notify::new(),
            max_depth,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock is still safe to use
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `url` at `depth`
    ///
    /// Returns false (and changes nothing) if the URL was already queued or
    /// visited, or if `depth` exceeds the maximum depth.
    pub fn enqueue(&self, url: &str, depth: u32) -> bool {
        if depth > self.max_depth {
            trace!("Not queueing {} at depth {}: too deep", url, depth);
            return false;
        }

        let key = normalize(url);
        {
            let mut state = self.lock();
            if state.queued.contains(&key) || state.visited.contains(&key) {
                return false;
            }
            state.queued.insert(key.clone());
            state.queue.push_back(CrawlTask { url: key, depth });
        }

        self.notify.notify_one();
        true
    }

    /// Takes the next task, waiting up to `idle` for one to appear
    ///
    /// Returns `None` when the idle timeout elapses, or as soon as the queue
    /// is empty with no task in flight. The returned [`Claimed`] keeps the task
    /// counted as in flight until it is dropped.
    pub async fn dequeue(self: &Arc<Self>, idle: Duration) -> Option<Claimed> {
        let deadline = Instant::now() + idle;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the queue so a concurrent enqueue is not missed
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                // The key stays in `queued` until `mark_visited` moves it over
                if let Some(task) = state.queue.pop_front() {
                    state.in_flight += 1;
                    return Some(Claimed {
                        task,
                        frontier: Arc::clone(self),
                    });
                }
                if state.in_flight == 0 {
                    debug!("Frontier drained");
                    return None;
                }
            }

            if timeout_at(deadline, notified).await.is_err() {
                debug!("Frontier idle for {:?}", idle);
                return None;
            }
        }
    }

    /// Records `url` as visited
    ///
    /// Returns false if it had already been visited.
    pub fn mark_visited(&self, url: &str) -> bool {
        let key = normalize(url);
        let mut state = self.lock();
        state.queued.remove(&key);
        state.visited.insert(key)
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.lock().visited.contains(&normalize(url))
    }

    /// Number of tasks waiting in the queue
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    fn finish(&self) {
        let drained = {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.drained()
        };
        if drained {
            self.notify.notify_waiters();
        }
    }
}

/// A dequeued task, counted as in flight until dropped
#[derive(Debug)]
pub struct Claimed {
    task: CrawlTask,
    frontier: Arc<Frontier>,
}

impl Claimed {
    pub fn task(&self) -> &CrawlTask {
        &self.task
    }
}

impl Drop for Claimed {
    fn drop(&mut self) {
        self.frontier.finish();
    }
}
