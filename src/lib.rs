//! Product-Scout: a polite product-page discovery crawler
//!
//! This crate crawls e-commerce sites outward from seed URLs, classifies every
//! fetched page as a product detail page or not, and flushes the discovered
//! product URLs to durable storage each time a domain finishes.

pub mod classify;
pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Product-Scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("No seed URLs configured")]
    NoSeeds,

    #[error("Unknown classification strategy '{0}'")]
    UnknownStrategy(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// Reasons the normalizer rejects a URL
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),

    #[error("URL host {0} is outside the crawl scope")]
    OutOfScope(String),

    #[error("URL points at a static asset: {0}")]
    StaticAsset(String),
}

/// Result type alias for Product-Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use classify::{ClassificationVerdict, ProductClassifier, StrategyRegistry, Verdict};
pub use config::Config;
pub use crawler::{run_crawl, CrawlPlan, Crawler, Fetcher};
pub use state::DomainStatus;
pub use output::{MetricsCollector, RunSummary};
pub use storage::{ProductRecord, ResultSink};
pub use url::{extract_domain, Normalizer};
