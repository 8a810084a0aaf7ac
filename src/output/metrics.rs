//! Run-wide metrics collection
//!
//! Every domain coordinator reports what it does as a [`CrawlEvent`]; the
//! collector folds those into per-domain and run-level counters. Counters are
//! increment-only. Recording never fails the crawl: a poisoned lock is
//! logged and the event dropped.

use crate::classify::Verdict;
use crate::crawler::FetchErrorKind;
use crate::state::DomainStatus;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Why a URL was given up on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Transient failures outlasted the retry budget
    Transient,
    /// 4xx, decode failure, protocol error or a non-HTML body
    Permanent,
    /// Disallowed by robots.txt
    RobotsDenied,
}

/// A single observable step of the crawl
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    DomainStarted {
        domain: String,
    },
    FetchAttempted {
        domain: String,
    },
    FetchSucceeded {
        domain: String,
        retried: bool,
        latency: Duration,
    },
    FetchFailed {
        domain: String,
        kind: FetchErrorKind,
    },
    RetryScheduled {
        domain: String,
    },
    Classified {
        domain: String,
        verdict: Verdict,
    },
    Skipped {
        domain: String,
        reason: SkipReason,
    },
    LinkRejected {
        domain: String,
    },
    DomainFinished {
        domain: String,
        status: DomainStatus,
    },
}

impl CrawlEvent {
    pub fn domain(&self) -> &str {
        match self {
            CrawlEvent::DomainStarted { domain }
            | CrawlEvent::FetchAttempted { domain }
            | CrawlEvent::FetchSucceeded { domain, .. }
            | CrawlEvent::FetchFailed { domain, .. }
            | CrawlEvent::RetryScheduled { domain }
            | CrawlEvent::Classified { domain, .. }
            | CrawlEvent::Skipped { domain, .. }
            | CrawlEvent::LinkRejected { domain }
            | CrawlEvent::DomainFinished { domain, .. } => domain,
        }
    }
}

/// Counters for one domain (also used for run-level totals)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainMetrics {
    pub fetch_attempts: u64,
    pub pages_fetched: u64,
    pub retries: u64,
    pub retried_then_succeeded: u64,
    pub transient_skips: u64,
    pub permanent_skips: u64,
    pub robots_denied: u64,
    pub links_rejected: u64,
    pub products: u64,
    pub non_products: u64,
    pub uncertain: u64,
    /// Keyed by [`FetchErrorKind::label`]
    pub errors_by_kind: BTreeMap<String, u64>,
    pub total_latency: Duration,
}

impl DomainMetrics {
    pub fn total_errors(&self) -> u64 {
        self.errors_by_kind.values().sum()
    }

    /// Mean latency of successful fetches
    pub fn average_latency(&self) -> Option<Duration> {
        u32::try_from(self.pages_fetched)
            .ok()
            .filter(|n| *n > 0)
            .map(|n| self.total_latency / n)
    }

    fn apply(&mut self, event: &CrawlEvent) {
        match event {
            CrawlEvent::DomainStarted { .. } | CrawlEvent::DomainFinished { .. } => {}
            CrawlEvent::FetchAttempted { .. } => self.fetch_attempts += 1,
            CrawlEvent::FetchSucceeded {
                retried, latency, ..
            } => {
                self.pages_fetched += 1;
                self.total_latency += *latency;
                if *retried {
                    self.retried_then_succeeded += 1;
                }
            }
            CrawlEvent::FetchFailed { kind, .. } => {
                *self.errors_by_kind.entry(kind.label()).or_insert(0) += 1;
            }
            CrawlEvent::RetryScheduled { .. } => self.retries += 1,
            CrawlEvent::Classified { verdict, .. } => match verdict {
                Verdict::Product => self.products += 1,
                Verdict::NonProduct => self.non_products += 1,
                Verdict::Uncertain => self.uncertain += 1,
            },
            CrawlEvent::Skipped { reason, .. } => match reason {
                SkipReason::Transient => self.transient_skips += 1,
                SkipReason::Permanent => self.permanent_skips += 1,
                SkipReason::RobotsDenied => self.robots_denied += 1,
            },
            CrawlEvent::LinkRejected { .. } => self.links_rejected += 1,
        }
    }
}

/// Process-wide aggregate of everything recorded so far
#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub started_at: DateTime<Utc>,
    pub totals: DomainMetrics,
    pub domains: BTreeMap<String, DomainMetrics>,
    pub statuses: BTreeMap<String, DomainStatus>,
}

impl RunMetrics {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            totals: DomainMetrics::default(),
            domains: BTreeMap::new(),
            statuses: BTreeMap::new(),
        }
    }

    fn apply(&mut self, event: &CrawlEvent) {
        let domain = event.domain().to_string();
        match event {
            CrawlEvent::DomainStarted { .. } => {
                self.statuses.insert(domain.clone(), DomainStatus::Running);
            }
            CrawlEvent::DomainFinished { status, .. } => {
                self.statuses.insert(domain.clone(), *status);
            }
            _ => {}
        }
        self.totals.apply(event);
        self.domains.entry(domain).or_default().apply(event);
    }
}

/// Shared sink for [`CrawlEvent`]s
///
/// Held behind an `Arc` by every coordinator. The lock is only taken for the
/// duration of a counter update.
#[derive(Debug)]
pub struct MetricsCollector {
    inner: Mutex<RunMetrics>,
    started: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RunMetrics::new()),
            started: Instant::now(),
        }
    }

    /// Records one event
    pub fn record(&self, event: CrawlEvent) {
        match self.inner.lock() {
            Ok(mut metrics) => metrics.apply(&event),
            Err(_) => {
                tracing::warn!(
                    domain = event.domain(),
                    "Metrics lock poisoned, dropping event {:?}",
                    event
                );
            }
        }
    }

    /// Copy of the current aggregate
    pub fn snapshot(&self) -> Option<RunMetrics> {
        match self.inner.lock() {
            Ok(metrics) => Some(metrics.clone()),
            Err(_) => {
                tracing::warn!("Metrics lock poisoned, snapshot unavailable");
                None
            }
        }
    }

    /// Counters for a single domain; zeroed if nothing was recorded
    pub fn domain(&self, domain: &str) -> DomainMetrics {
        self.snapshot()
            .and_then(|mut m| m.domains.remove(domain))
            .unwrap_or_default()
    }

    /// Time since the collector was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
