//! Crawler module for page fetching and crawl coordination
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the [`Fetcher`] trait
//! - HTML link extraction
//! - The per-domain frontier with politeness and budget enforcement
//! - Retry policy for transient failures
//! - Domain session and whole-run coordination

mod coordinator;
mod fetcher;
mod parser;
mod retry;
mod scheduler;

pub use coordinator::{run_crawl, CrawlPlan, Crawler, SeedPlan, TUNING_TARGET};
pub use fetcher::{FetchError, FetchErrorKind, FetchResult, FetchedPage, Fetcher, HttpFetcher};
pub use parser::extract_links;
pub use retry::RetryPolicy;
pub use scheduler::{CrawlTask, EnqueueOutcome, Frontier, ScheduledFetch};
