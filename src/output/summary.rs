//! Per-domain and run-level summaries
//!
//! A [`DomainSummary`] is built by the coordinator at a domain's terminal
//! transition and travels with that domain's records into every sink. The
//! [`RunSummary`] aggregates them at run end.

use crate::output::metrics::DomainMetrics;
use crate::state::{AbortReason, DomainStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Outcome of one domain session
#[derive(Debug, Clone)]
pub struct DomainSummary {
    pub domain: String,
    pub seed: String,
    pub strategy: String,
    pub status: DomainStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub product_count: u64,
    pub uncertain_count: u64,
    pub metrics: DomainMetrics,
}

impl DomainSummary {
    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.status.abort_reason()
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub domains: Vec<DomainSummary>,
    pub totals: DomainMetrics,
}

impl RunSummary {
    /// Builds the run summary from the finished domains
    ///
    /// Domains are ordered by name so the report is stable across runs.
    pub fn from_domains(
        config_hash: impl Into<String>,
        started_at: DateTime<Utc>,
        elapsed_seconds: f64,
        mut domains: Vec<DomainSummary>,
    ) -> Self {
        domains.sort_by(|a, b| a.domain.cmp(&b.domain));

        let mut totals = DomainMetrics::default();
        for d in &domains {
            let m = &d.metrics;
            totals.fetch_attempts += m.fetch_attempts;
            totals.pages_fetched += m.pages_fetched;
            totals.retries += m.retries;
            totals.retried_then_succeeded += m.retried_then_succeeded;
            totals.transient_skips += m.transient_skips;
            totals.permanent_skips += m.permanent_skips;
            totals.robots_denied += m.robots_denied;
            totals.links_rejected += m.links_rejected;
            totals.products += m.products;
            totals.non_products += m.non_products;
            totals.uncertain += m.uncertain;
            totals.total_latency += m.total_latency;
            for (kind, count) in &m.errors_by_kind {
                *totals.errors_by_kind.entry(kind.clone()).or_insert(0) += count;
            }
        }

        Self {
            config_hash: config_hash.into(),
            started_at,
            finished_at: Utc::now(),
            elapsed_seconds,
            domains,
            totals,
        }
    }

    pub fn total_products(&self) -> u64 {
        self.domains.iter().map(|d| d.product_count).sum()
    }

    /// Number of domains per status label ("completed", "aborted", ...)
    pub fn status_breakdown(&self) -> BTreeMap<String, u64> {
        let mut breakdown = BTreeMap::new();
        for d in &self.domains {
            *breakdown.entry(d.status.to_string()).or_insert(0) += 1;
        }
        breakdown
    }

    /// Percentage of fetch attempts that returned a page
    pub fn success_rate(&self) -> f64 {
        if self.totals.fetch_attempts == 0 {
            0.0
        } else {
            (self.totals.pages_fetched as f64 / self.totals.fetch_attempts as f64) * 100.0
        }
    }
}

/// Prints the run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Overview:");
    println!("  Domains crawled: {}", summary.domains.len());
    println!("  Pages fetched: {}", summary.totals.pages_fetched);
    println!("  Product URLs: {}", summary.total_products());
    println!("  Uncertain pages: {}", summary.totals.uncertain);
    println!("  Elapsed: {:.1}s", summary.elapsed_seconds);
    println!();

    println!("Domains:");
    for d in &summary.domains {
        println!(
            "  {}: {} ({} products, {} pages, {:.1}s)",
            d.domain,
            d.status,
            d.product_count,
            d.metrics.pages_fetched,
            d.duration_seconds()
        );
    }
    println!();

    if !summary.totals.errors_by_kind.is_empty() {
        println!("Errors by Kind:");
        let mut error_counts: Vec<_> = summary.totals.errors_by_kind.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (kind, count) in error_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} fetch attempts)",
        summary.success_rate(),
        summary.totals.pages_fetched,
        summary.totals.fetch_attempts
    );
}
