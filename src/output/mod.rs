//! Output module for run metrics and reports
//!
//! This module handles:
//! - Collecting crawl events into per-domain and run-level counters
//! - Building domain and run summaries
//! - Rendering the markdown run report

mod markdown;
mod metrics;
mod summary;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use metrics::{CrawlEvent, DomainMetrics, MetricsCollector, RunMetrics, SkipReason};
pub use summary::{print_summary, DomainSummary, RunSummary};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
