use std::time::{Duration, Instant};

/// Upper bound on the politeness interval after repeated HTTP 429 responses
const MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Tracks per-domain pacing during crawling
///
/// Holds the politeness interval (configured delay, raised by robots.txt
/// `Crawl-delay` and doubled on every HTTP 429) and the time of the last
/// dispatched request.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Number of requests dispatched to this domain
    pub request_count: u32,

    /// Timestamp of the last request to this domain
    pub last_request_time: Option<Instant>,

    /// Minimum spacing between consecutive requests
    pub interval: Duration,

    /// How many times the domain answered HTTP 429
    pub rate_limited_count: u32,
}

impl DomainState {
    /// Creates a new DomainState with the given politeness interval
    pub fn new(interval: Duration) -> Self {
        Self {
            request_count: 0,
            last_request_time: None,
            interval,
            rate_limited_count: 0,
        }
    }

    /// Checks if the politeness interval has elapsed
    pub fn can_request(&self, now: Instant) -> bool {
        self.time_until_next_request(now).is_none()
    }

    /// Records that a request was dispatched to this domain
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.interval {
            Some(self.interval - elapsed)
        } else {
            None
        }
    }

    /// Doubles the politeness interval after an HTTP 429, capped at 60 seconds
    pub fn mark_rate_limited(&mut self) {
        self.rate_limited_count += 1;
        let doubled = if self.interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.interval.saturating_mul(2)
        };
        self.interval = doubled.min(MAX_INTERVAL);
    }

    /// Raises the interval to at least `delay` (robots.txt `Crawl-delay`)
    pub fn raise_interval(&mut self, delay: Duration) {
        if delay > self.interval {
            self.interval = delay.min(MAX_INTERVAL);
        }
    }
}
