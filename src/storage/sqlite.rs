//! SQLite result sink
//!
//! This module provides the SQLite implementation of [`ResultSink`]. Every
//! run gets a row in `runs`; every finished domain is written in a single
//! transaction.

use crate::output::RunSummary;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ResultSink, StorageResult};
use crate::storage::{DomainReport, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteSink {
    conn: Connection,
    run_id: i64,
}

impl SqliteSink {
    /// Opens (or creates) the database and registers a new run
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `config_hash` - Hash of the configuration that drives this run
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path, config_hash: &str) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;
        Self::with_connection(conn, config_hash)
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Self::with_connection(conn, "test")
    }

    fn with_connection(conn: Connection, config_hash: &str) -> StorageResult<Self> {
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![
                Utc::now().to_rfc3339(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        let run_id = conn.last_insert_rowid();
        Ok(Self { conn, run_id })
    }

    /// Id of the run this sink writes to
    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Product URLs recorded for a domain in this run, sorted
    pub fn product_urls(&self, domain: &str) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT url FROM products WHERE run_id = ?1 AND domain = ?2 ORDER BY url",
        )?;
        let urls = stmt
            .query_map(params![self.run_id, domain], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    /// Recorded status label and abort reason for a domain in this run
    pub fn domain_status(&self, domain: &str) -> StorageResult<Option<(String, Option<String>)>> {
        let status = self
            .conn
            .query_row(
                "SELECT status, abort_reason FROM domains WHERE run_id = ?1 AND domain = ?2",
                params![self.run_id, domain],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(status)
    }

    /// Status of this run
    pub fn run_status(&self) -> StorageResult<Option<RunStatus>> {
        let status: String = self.conn.query_row(
            "SELECT status FROM runs WHERE id = ?1",
            params![self.run_id],
            |row| row.get(0),
        )?;
        Ok(RunStatus::from_db_string(&status))
    }
}

impl ResultSink for SqliteSink {
    fn append(&mut self, report: &DomainReport) -> StorageResult<()> {
        let summary = &report.summary;
        let m = &summary.metrics;
        let errors_by_kind = serde_json::to_string(&m.errors_by_kind)?;

        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO domains (
                run_id, domain, seed, strategy, status, abort_reason, started_at, finished_at,
                duration_seconds, product_count, uncertain_count, pages_fetched, retries,
                retried_then_succeeded, transient_skips, permanent_skips, robots_denied,
                errors_by_kind
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                self.run_id,
                summary.domain,
                summary.seed,
                summary.strategy,
                summary.status.to_db_string(),
                summary.abort_reason().map(|r| r.to_db_string()),
                summary.started_at.to_rfc3339(),
                summary.finished_at.to_rfc3339(),
                summary.duration_seconds(),
                summary.product_count as i64,
                summary.uncertain_count as i64,
                m.pages_fetched as i64,
                m.retries as i64,
                m.retried_then_succeeded as i64,
                m.transient_skips as i64,
                m.permanent_skips as i64,
                m.robots_denied as i64,
                errors_by_kind,
            ],
        )?;

        {
            let mut insert_product = tx.prepare(
                "INSERT OR IGNORE INTO products (run_id, url, domain, discovered_at, strategy)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in &report.products {
                insert_product.execute(params![
                    self.run_id,
                    record.url,
                    record.domain,
                    record.discovered_at.to_rfc3339(),
                    record.strategy,
                ])?;
            }

            let mut insert_uncertain = tx.prepare(
                "INSERT OR IGNORE INTO uncertain_pages (run_id, url, domain, discovered_at, strategy, signals)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in &report.uncertain {
                insert_uncertain.execute(params![
                    self.run_id,
                    record.url,
                    record.domain,
                    record.discovered_at.to_rfc3339(),
                    record.strategy,
                    record.signals,
                ])?;
            }
        }

        tx.commit()?;

        tracing::debug!(
            domain = %summary.domain,
            products = report.products.len(),
            "Domain results committed to SQLite"
        );
        Ok(())
    }

    fn finalize(&mut self, summary: &RunSummary) -> StorageResult<()> {
        let errors_by_kind = serde_json::to_string(&summary.totals.errors_by_kind)?;
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, elapsed_seconds = ?3,
                pages_fetched = ?4, total_products = ?5, errors_by_kind = ?6
             WHERE id = ?7",
            params![
                RunStatus::Completed.to_db_string(),
                summary.finished_at.to_rfc3339(),
                summary.elapsed_seconds,
                summary.totals.pages_fetched as i64,
                summary.total_products() as i64,
                errors_by_kind,
                self.run_id,
            ],
        )?;
        Ok(())
    }
}
