//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `DomainStatus`: Lifecycle of a domain session (pending, running, completed, aborted)
//! - `DomainState`: Per-domain politeness pacing and backoff

mod domain_state;
mod session;

pub use domain_state::DomainState;
pub use session::{AbortReason, DomainStatus, InvalidTransition};
