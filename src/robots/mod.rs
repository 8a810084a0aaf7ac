//! Robots.txt handling module
//!
//! robots.txt is fetched once per domain session, through the same fetcher as
//! pages, and consulted before every URL is enqueued.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::Fetcher;
use tracing::debug;
use url::Url;

/// Fetches robots.txt for the origin of `seed`
///
/// Any failure (missing file, HTTP error, network error) yields a permissive
/// policy; robots.txt never stops a domain from being crawled on its own.
pub async fn fetch_robots(fetcher: &dyn Fetcher, seed: &Url) -> ParsedRobots {
    let robots_url = match seed.join("/robots.txt") {
        Ok(url) => url,
        Err(e) => {
            debug!("Cannot build robots.txt URL for {}: {}", seed, e);
            return ParsedRobots::allow_all();
        }
    };

    let result = fetcher.fetch(&robots_url).await;
    match result.outcome {
        Ok(page) => {
            debug!("Loaded robots.txt from {} ({} bytes)", robots_url, page.body.len());
            ParsedRobots::from_content(&page.body)
        }
        Err(e) => {
            debug!("No usable robots.txt at {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
