//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the results database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    elapsed_seconds REAL,
    pages_fetched INTEGER,
    total_products INTEGER,
    errors_by_kind TEXT
);

-- One row per domain session that reached a terminal state
CREATE TABLE IF NOT EXISTS domains (
    run_id INTEGER NOT NULL REFERENCES runs(id),
    domain TEXT NOT NULL,
    seed TEXT NOT NULL,
    strategy TEXT NOT NULL,
    status TEXT NOT NULL,
    abort_reason TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    duration_seconds REAL NOT NULL,
    product_count INTEGER NOT NULL,
    uncertain_count INTEGER NOT NULL,
    pages_fetched INTEGER NOT NULL,
    retries INTEGER NOT NULL,
    retried_then_succeeded INTEGER NOT NULL,
    transient_skips INTEGER NOT NULL,
    permanent_skips INTEGER NOT NULL,
    robots_denied INTEGER NOT NULL,
    errors_by_kind TEXT NOT NULL,
    PRIMARY KEY (run_id, domain)
);

-- Discovered product URLs
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    domain TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    strategy TEXT NOT NULL,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_products_domain ON products(domain);

-- Pages with conflicting signals, kept for classifier tuning
CREATE TABLE IF NOT EXISTS uncertain_pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    domain TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    strategy TEXT NOT NULL,
    signals TEXT NOT NULL,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_uncertain_domain ON uncertain_pages(domain);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
