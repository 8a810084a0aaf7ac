//! Result sink trait and error types
//!
//! A sink receives one [`DomainReport`] per domain at its terminal transition
//! and one [`RunSummary`] at run end.

use crate::output::RunSummary;
use crate::storage::DomainReport;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Sink lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only destination for crawl results
///
/// Implementations must make each `append` atomic: either every record of
/// the report becomes visible or none does. A domain is appended at most once
/// per run.
pub trait ResultSink: Send {
    /// Persists one finished domain's records and summary
    fn append(&mut self, report: &DomainReport) -> StorageResult<()>;

    /// Stamps the run-level summary once every domain has finished
    fn finalize(&mut self, summary: &RunSummary) -> StorageResult<()>;
}

/// Fans every call out to a list of sinks
///
/// All sinks are attempted even when one fails; the first error is returned.
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<Box<dyn ResultSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn ResultSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ResultSink for SinkSet {
    fn append(&mut self, report: &DomainReport) -> StorageResult<()> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.append(report) {
                tracing::error!(domain = %report.summary.domain, "Result sink append failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn finalize(&mut self, summary: &RunSummary) -> StorageResult<()> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.finalize(summary) {
                tracing::error!("Result sink finalize failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
