//! Per-domain frontier and scheduling
//!
//! This module handles:
//! - FIFO queue of discovered URLs, bounded by depth and page budget
//! - Deduplication through the session's seen-set
//! - Per-domain politeness spacing and 429 backoff
//! - Delayed re-queueing of transient failures
//! - Acquiring a permit from the global fetch ceiling before dispatch

use crate::config::CrawlerConfig;
use crate::state::DomainState;
use crate::url::SeenSet;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// A URL waiting to be crawled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized URL; identity within the session
    pub url: Url,
    pub domain: String,
    /// Link hops from the seed
    pub depth: u32,
    pub discovered_at: DateTime<Utc>,
    /// Discovery order within the session
    pub sequence: u64,
}

/// Outcome of an enqueue attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Already seen in this session
    Duplicate,
    /// Beyond the configured maximum depth
    TooDeep,
    /// The page budget is already spoken for
    OverBudget,
}

/// A task cleared for fetching, holding one global permit
///
/// The permit is released when this value (or the task it is moved into)
/// is dropped.
pub struct ScheduledFetch {
    pub task: CrawlTask,
    /// Retries already spent on this URL
    pub attempt: u32,
    pub _permit: OwnedSemaphorePermit,
}

#[derive(Debug)]
struct RetryEntry {
    ready_at: Instant,
    attempt: u32,
    task: CrawlTask,
}

/// Frontier for one domain session
///
/// Owned by a single coordinator; only the global semaphore is shared with
/// other domains.
pub struct Frontier {
    domain: String,
    queue: VecDeque<CrawlTask>,
    retries: Vec<RetryEntry>,
    in_flight: HashSet<Url>,
    completed: HashSet<Url>,
    seen: SeenSet,
    pacing: DomainState,
    global: Arc<Semaphore>,
    max_depth: u32,
    max_pages: u32,
    /// First attempts handed out; counted against `max_pages`
    dispatched: u32,
    /// Set once a URL has been refused for budget reasons
    over_budget: bool,
    next_sequence: u64,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `domain` - Domain this session covers
    /// * `config` - Budgets and politeness settings
    /// * `global` - The fetch ceiling shared by every running domain
    pub fn new(domain: &str, config: &CrawlerConfig, global: Arc<Semaphore>) -> Self {
        Self {
            domain: domain.to_string(),
            queue: VecDeque::new(),
            retries: Vec::new(),
            in_flight: HashSet::new(),
            completed: HashSet::new(),
            seen: SeenSet::new(),
            pacing: DomainState::new(config.politeness_delay()),
            global,
            max_depth: config.max_depth,
            max_pages: config.max_pages,
            dispatched: 0,
            over_budget: false,
            next_sequence: 0,
        }
    }

    /// Adds a normalized URL at the given depth
    ///
    /// A no-op unless the URL is new, within depth, and within budget.
    pub fn enqueue(&mut self, url: Url, depth: u32) -> EnqueueOutcome {
        if depth > self.max_depth {
            return EnqueueOutcome::TooDeep;
        }

        if self.seen.contains(&url) {
            return EnqueueOutcome::Duplicate;
        }

        let committed = self.dispatched as usize + self.queue.len();
        if committed >= self.max_pages as usize {
            self.over_budget = true;
            return EnqueueOutcome::OverBudget;
        }

        if !self.seen.check_and_mark(&url) {
            return EnqueueOutcome::Duplicate;
        }

        let task = CrawlTask {
            url,
            domain: self.domain.clone(),
            depth,
            discovered_at: Utc::now(),
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        tracing::trace!("Queued {} at depth {}", task.url, depth);
        self.queue.push_back(task);
        EnqueueOutcome::Queued
    }

    /// Marks a URL seen without queueing it
    ///
    /// Returns true the first time a URL is rejected, so a refused URL is
    /// only counted once however often it is linked.
    pub fn mark_seen(&mut self, url: &Url) -> bool {
        self.seen.check_and_mark(url)
    }

    /// Waits for the next task that may be fetched
    ///
    /// Honors the politeness interval, retry readiness, and the global
    /// ceiling, in that order. Returns None when nothing is pending.
    ///
    /// Cancel safe: no state changes until a permit is held, and everything
    /// after that is synchronous.
    pub async fn next(&mut self) -> Option<ScheduledFetch> {
        loop {
            let wait = self.time_until_ready(Instant::now())?;
            if !wait.is_zero() {
                tracing::trace!("{}: waiting {:?} before next dispatch", self.domain, wait);
                tokio::time::sleep(wait).await;
                continue;
            }

            let permit = Arc::clone(&self.global).acquire_owned().await.ok()?;

            let now = Instant::now();
            let (task, attempt) = self.pop_ready(now)?;
            self.pacing.record_request(now);
            self.in_flight.insert(task.url.clone());
            if attempt == 0 {
                self.dispatched += 1;
            }

            return Some(ScheduledFetch {
                task,
                attempt,
                _permit: permit,
            });
        }
    }

    /// Time until some pending task may be dispatched, None if nothing is pending
    fn time_until_ready(&self, now: Instant) -> Option<Duration> {
        let politeness = self.pacing.time_until_next_request(now).unwrap_or_default();

        if !self.queue.is_empty() {
            return Some(politeness);
        }

        let earliest_retry = self.retries.iter().map(|r| r.ready_at).min()?;
        let retry_wait = earliest_retry.saturating_duration_since(now);
        Some(politeness.max(retry_wait))
    }

    /// Removes the earliest-discovered task that is ready
    fn pop_ready(&mut self, now: Instant) -> Option<(CrawlTask, u32)> {
        let ready_retry = self
            .retries
            .iter()
            .enumerate()
            .filter(|(_, r)| r.ready_at <= now)
            .min_by_key(|(_, r)| r.task.sequence)
            .map(|(index, r)| (index, r.task.sequence));

        let queued_sequence = self.queue.front().map(|t| t.sequence);

        match (ready_retry, queued_sequence) {
            (Some((index, retry_seq)), Some(queue_seq)) if retry_seq < queue_seq => {
                let entry = self.retries.swap_remove(index);
                Some((entry.task, entry.attempt))
            }
            (Some((index, _)), None) => {
                let entry = self.retries.swap_remove(index);
                Some((entry.task, entry.attempt))
            }
            (_, Some(_)) => self.queue.pop_front().map(|t| (t, 0)),
            (None, None) => None,
        }
    }

    /// Re-queues a task after a transient failure
    ///
    /// # Arguments
    ///
    /// * `task` - The task that failed
    /// * `attempt` - Retries spent so far, including this one
    /// * `delay` - Backoff before the task becomes ready again
    pub fn retry(&mut self, task: CrawlTask, attempt: u32, delay: Duration) {
        self.in_flight.remove(&task.url);
        self.retries.push(RetryEntry {
            ready_at: Instant::now() + delay,
            attempt,
            task,
        });
    }

    /// Marks a task finished, whatever its outcome
    pub fn mark_done(&mut self, task: &CrawlTask) {
        self.in_flight.remove(&task.url);
        self.completed.insert(task.url.clone());
    }

    /// Doubles the politeness interval after an HTTP 429
    pub fn back_off(&mut self) {
        self.pacing.mark_rate_limited();
        tracing::debug!(
            "{}: rate limited, politeness interval now {:?}",
            self.domain,
            self.pacing.interval
        );
    }

    /// Applies a robots.txt crawl delay
    pub fn apply_crawl_delay(&mut self, delay: Duration) {
        self.pacing.raise_interval(delay);
    }

    /// Records a request made outside `next` (robots.txt)
    pub fn record_request(&mut self) {
        self.pacing.record_request(Instant::now());
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty() || !self.retries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len() + self.retries.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// True once the page budget has turned work away
    pub fn is_over_budget(&self) -> bool {
        self.over_budget
    }

    pub fn politeness_interval(&self) -> Duration {
        self.pacing.interval
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}
