//! JSON results file sink
//!
//! Maintains `product_urls.json`: run metadata, per-domain metadata, the
//! uncertain pages, and one sorted URL list per domain keyed by domain name.
//! An existing file is loaded on open so earlier runs' domains are kept. The
//! whole file is rewritten through a temp file and a rename after every
//! domain, so readers never observe a half-written document.

use crate::output::RunSummary;
use crate::storage::traits::{ResultSink, StorageResult};
use crate::storage::DomainReport;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub(crate) struct RunMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub total_domains: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<String>,
    #[serde(default)]
    pub total_products: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct DomainMetadata {
    pub crawl_date: String,
    pub product_count: usize,
    pub duration_seconds: f64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    pub strategy: String,
    pub pages_fetched: u64,
    #[serde(default)]
    pub errors_by_kind: BTreeMap<String, u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ResultsFile {
    #[serde(default)]
    pub metadata: RunMetadata,
    #[serde(default)]
    pub domain_metadata: BTreeMap<String, DomainMetadata>,
    #[serde(default)]
    pub uncertain: BTreeMap<String, Vec<String>>,
    #[serde(flatten)]
    pub products: BTreeMap<String, Vec<String>>,
}

impl ResultsFile {
    fn total_products(&self) -> usize {
        self.products.values().map(Vec::len).sum()
    }
}

/// Writes results to the JSON file after every domain
pub struct JsonSink {
    path: PathBuf,
    results: ResultsFile,
}

impl JsonSink {
    /// Opens the results file, loading prior content if it parses
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let results = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(results) => {
                    tracing::info!("Loaded existing results from {}", path.display());
                    results
                }
                Err(e) => {
                    tracing::warn!(
                        "Could not parse existing file {} ({}), starting fresh",
                        path.display(),
                        e
                    );
                    ResultsFile::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ResultsFile::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            results,
        })
    }

    /// Product URLs currently held for a domain
    pub fn product_urls(&self, domain: &str) -> Option<&[String]> {
        self.results.products.get(domain).map(Vec::as_slice)
    }

    fn write_atomic(&self) -> StorageResult<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.results)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ResultSink for JsonSink {
    fn append(&mut self, report: &DomainReport) -> StorageResult<()> {
        let summary = &report.summary;

        let mut urls: Vec<String> = report.products.iter().map(|r| r.url.clone()).collect();
        urls.sort();
        urls.dedup();

        let mut uncertain: Vec<String> = report.uncertain.iter().map(|r| r.url.clone()).collect();
        uncertain.sort();
        uncertain.dedup();

        self.results.domain_metadata.insert(
            summary.domain.clone(),
            DomainMetadata {
                crawl_date: summary.finished_at.format(TIMESTAMP_FORMAT).to_string(),
                product_count: urls.len(),
                duration_seconds: summary.duration_seconds(),
                status: summary.status.to_db_string().to_string(),
                abort_reason: summary.abort_reason().map(|r| r.to_db_string().to_string()),
                strategy: summary.strategy.clone(),
                pages_fetched: summary.metrics.pages_fetched,
                errors_by_kind: summary.metrics.errors_by_kind.clone(),
            },
        );
        if uncertain.is_empty() {
            self.results.uncertain.remove(&summary.domain);
        } else {
            self.results.uncertain.insert(summary.domain.clone(), uncertain);
        }
        self.results.products.insert(summary.domain.clone(), urls);

        let total_products = self.results.total_products();
        let total_domains = self.results.domain_metadata.len();
        let metadata = &mut self.results.metadata;
        metadata.last_updated = Some(Utc::now().format(TIMESTAMP_FORMAT).to_string());
        metadata.total_domains = total_domains;
        metadata.total_products = total_products;

        self.write_atomic()?;
        tracing::info!(
            domain = %summary.domain,
            "Saved intermediate results to {}",
            self.path.display()
        );
        Ok(())
    }

    fn finalize(&mut self, summary: &RunSummary) -> StorageResult<()> {
        let total_products = self.results.total_products();
        let total_domains = self.results.domain_metadata.len();
        let metadata = &mut self.results.metadata;
        metadata.completion_time = Some(summary.finished_at.format(TIMESTAMP_FORMAT).to_string());
        metadata.total_products = total_products;
        metadata.total_domains = total_domains;

        self.write_atomic()?;
        tracing::info!(
            total_products,
            "Final results saved to {}",
            self.path.display()
        );
        Ok(())
    }
}
