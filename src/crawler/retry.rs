use crate::config::CrawlerConfig;
use crate::crawler::FetchErrorKind;
use std::time::Duration;

/// Ceiling on a single backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Bounded exponential backoff for transient fetch failures
///
/// No jitter: identical inputs give identical schedules, which keeps runs
/// against deterministic responses reproducible.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: config.retry_backoff(),
        }
    }

    /// Delay before retry number `retry` (1-based): base, 2×base, 4×base, ...
    pub fn calculate_backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }

    /// Whether a failed attempt should be tried again
    ///
    /// # Arguments
    ///
    /// * `retries_so_far` - Retries already spent on this URL
    /// * `kind` - Why the last attempt failed
    pub fn should_retry(&self, retries_so_far: u32, kind: FetchErrorKind) -> bool {
        kind.is_transient() && retries_so_far < self.max_retries
    }
}
