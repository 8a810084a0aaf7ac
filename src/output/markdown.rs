//! Markdown summary generation
//!
//! This module renders the run summary as a human-readable markdown report:
//! run metadata, overall counters, one row per domain and the error table.

use crate::output::summary::RunSummary;
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown report for a finished run
///
/// # Arguments
///
/// * `summary` - The run summary
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Product-Scout Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Finished**: {}\n",
        summary.finished_at.to_rfc3339()
    ));
    md.push_str(&format!(
        "- **Elapsed**: {:.1} seconds ({:.2} minutes)\n",
        summary.elapsed_seconds,
        summary.elapsed_seconds / 60.0
    ));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    let totals = &summary.totals;
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Domains**: {}\n", summary.domains.len()));
    md.push_str(&format!("- **Fetch Attempts**: {}\n", totals.fetch_attempts));
    md.push_str(&format!("- **Pages Fetched**: {}\n", totals.pages_fetched));
    md.push_str(&format!("- **Product URLs**: {}\n", summary.total_products()));
    md.push_str(&format!("- **Uncertain Pages**: {}\n", totals.uncertain));
    md.push_str(&format!("- **Retries**: {}\n", totals.retries));
    md.push_str(&format!(
        "- **Retried Then Succeeded**: {}\n",
        totals.retried_then_succeeded
    ));
    md.push_str(&format!("- **Transient Skips**: {}\n", totals.transient_skips));
    md.push_str(&format!("- **Permanent Skips**: {}\n", totals.permanent_skips));
    md.push_str(&format!("- **Robots Denied**: {}\n", totals.robots_denied));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        summary.success_rate()
    ));

    if !summary.domains.is_empty() {
        md.push_str("## Domains\n\n");
        md.push_str("| Domain | Strategy | Status | Products | Uncertain | Pages | Retried OK | Skipped | Errors | Duration (s) |\n");
        md.push_str("|--------|----------|--------|----------|-----------|-------|------------|---------|--------|--------------|\n");

        for d in &summary.domains {
            let m = &d.metrics;
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {:.1} |\n",
                d.domain,
                d.strategy,
                d.status,
                d.product_count,
                d.uncertain_count,
                m.pages_fetched,
                m.retried_then_succeeded,
                m.transient_skips + m.permanent_skips + m.robots_denied,
                m.total_errors(),
                d.duration_seconds()
            ));
        }
        md.push('\n');
    }

    if !totals.errors_by_kind.is_empty() {
        md.push_str("## Error Summary\n\n");
        md.push_str("| Error Kind | Count |\n");
        md.push_str("|------------|-------|\n");

        for (kind, count) in &totals.errors_by_kind {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');
    }

    let aborted: Vec<_> = summary
        .domains
        .iter()
        .filter_map(|d| d.abort_reason().map(|r| (&d.domain, r)))
        .collect();
    if !aborted.is_empty() {
        md.push_str("## Aborted Domains\n\n");
        for (domain, reason) in aborted {
            md.push_str(&format!("- {} ({})\n", domain, reason));
        }
        md.push('\n');
    }

    md
}
