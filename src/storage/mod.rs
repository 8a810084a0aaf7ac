//! Storage module for persisting crawl results
//!
//! This module handles every durable artifact of a run:
//! - SQLite database with runs, domains, products and uncertain pages
//! - The `product_urls.json` results file
//!
//! Both are written through the [`ResultSink`] trait, once per domain at its
//! terminal transition, so a crash loses at most the domains still running.

mod json;
mod schema;
mod sqlite;
mod traits;

pub use json::JsonSink;
pub use sqlite::SqliteSink;
pub use traits::{ResultSink, SinkSet, StorageError, StorageResult};

use crate::config::OutputConfig;
use crate::output::DomainSummary;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Opens every sink named in the output configuration
///
/// # Arguments
///
/// * `config` - Output paths
/// * `config_hash` - Hash stamped on the run record
///
/// # Returns
///
/// * `Ok(SinkSet)` - SQLite and JSON sinks, ready for appends
/// * `Err(StorageError)` - A sink could not be opened
pub fn open_sinks(config: &OutputConfig, config_hash: &str) -> StorageResult<SinkSet> {
    let mut sinks = SinkSet::new();
    sinks.push(Box::new(SqliteSink::open(
        Path::new(&config.database_path),
        config_hash,
    )?));
    sinks.push(Box::new(JsonSink::open(Path::new(&config.results_path))?));
    Ok(sinks)
}

/// A discovered product page
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProductRecord {
    pub url: String,
    pub domain: String,
    pub discovered_at: DateTime<Utc>,
    /// Id of the strategy that produced the verdict
    pub strategy: String,
}

/// A page the classifier could not decide on, kept for tuning
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UncertainRecord {
    pub url: String,
    pub domain: String,
    pub discovered_at: DateTime<Utc>,
    pub strategy: String,
    /// Comma-separated signal names
    pub signals: String,
}

/// Everything a sink receives for one finished domain
#[derive(Debug, Clone)]
pub struct DomainReport {
    pub summary: DomainSummary,
    pub products: Vec<ProductRecord>,
    pub uncertain: Vec<UncertainRecord>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}
