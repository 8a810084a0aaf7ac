//! URL handling module for Product-Scout
//!
//! This module provides canonicalization, crawl-scope checks, domain pattern
//! matching, and the per-session seen-set used for deduplication.

mod domain;
mod matcher;
mod normalize;
mod seen;

pub use domain::{extract_domain, scope_base};
pub use matcher::{matches_wildcard, suffix_match_len};
pub use normalize::{normalize_url, Normalizer};
pub use seen::SeenSet;
