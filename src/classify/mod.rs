//! Product page classification
//!
//! A fetched page is judged by a [`ProductStrategy`]. Strategies are values
//! held in a [`StrategyRegistry`] and selected by domain, so supporting a new
//! storefront means registering a strategy rather than editing dispatch code.
//!
//! # Components
//!
//! - `signals`: Independent evidence found in a page (URL shape, markup, buttons)
//! - `generic`: Default strategy combining signals with a fixed weighted rule
//! - `sites`: Data-driven strategies for known storefronts
//! - `registry`: Strategy catalog and domain bindings

mod generic;
mod registry;
mod signals;
mod sites;

pub use generic::{combine_signals, GenericStrategy};
pub use registry::StrategyRegistry;
pub use signals::{Signal, SignalDetector, SignalStrength, WeakGroup};
pub use sites::{builtin_profiles, SiteProfile, SiteStrategy};

use crate::crawler::{extract_links, FetchedPage};
use crate::ConfigError;
use regex::Regex;
use scraper::{Html, Selector};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Classification outcome for a fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verdict {
    Product,
    NonProduct,
    /// Signals disagree; persisted separately for manual review
    Uncertain,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::NonProduct => "non_product",
            Self::Uncertain => "uncertain",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict plus the evidence it was based on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationVerdict {
    pub url: Url,
    pub label: Verdict,
    /// Id of the strategy that produced the verdict
    pub strategy: String,
    /// Signals found on the page, in a stable order
    pub signals: Vec<Signal>,
}

impl ClassificationVerdict {
    /// Builds a verdict by applying the weighted rule to `signals`
    pub fn from_signals(url: &Url, strategy: &str, signals: Vec<Signal>) -> Self {
        let mut signals = signals;
        signals.sort();
        signals.dedup();

        Self {
            url: url.clone(),
            label: combine_signals(&signals),
            strategy: strategy.to_string(),
            signals,
        }
    }

    /// Comma-separated signal names, for logs and storage
    pub fn signal_names(&self) -> String {
        self.signals
            .iter()
            .map(Signal::name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A parsed page as seen by a strategy
///
/// Borrowing the parsed document keeps it on the current task: `Html` is not
/// `Send`, so parsing and classification never span an await point.
pub struct PageView<'a> {
    /// URL the page is judged and recorded under
    pub url: &'a Url,
    pub document: &'a Html,
    pub body: &'a str,
}

/// A classification rule set
///
/// Implementations must always return one of the three verdicts and must not
/// panic on unexpected markup.
pub trait ProductStrategy: Send + Sync {
    /// Registry id, also recorded on every product found with this strategy
    fn id(&self) -> &str;

    fn classify(&self, page: &PageView<'_>) -> ClassificationVerdict;

    /// Whether a discovered in-scope URL should be crawled at all
    fn should_follow(&self, _url: &Url) -> bool {
        true
    }

    /// Links beyond plain anchors, e.g. product tiles carrying data attributes
    fn extra_links(&self, _page: &PageView<'_>) -> Vec<String> {
        Vec::new()
    }
}

/// Result of analysing one fetched page
#[derive(Debug, Clone)]
pub struct PageAnalysis {
    pub verdict: ClassificationVerdict,
    /// Raw hrefs, not yet normalized
    pub links: Vec<String>,
}

/// The classifier bound to one domain session
#[derive(Clone)]
pub struct ProductClassifier {
    strategy: Arc<dyn ProductStrategy>,
}

impl ProductClassifier {
    pub fn new(strategy: Arc<dyn ProductStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_id(&self) -> &str {
        self.strategy.id()
    }

    /// Judges a fetched page
    pub fn classify(&self, url: &Url, page: &FetchedPage) -> ClassificationVerdict {
        let document = Html::parse_document(&page.body);
        let view = PageView {
            url,
            document: &document,
            body: &page.body,
        };
        self.strategy.classify(&view)
    }

    /// Judges a fetched page and collects its outgoing links in one parse
    ///
    /// Links are collected whatever the verdict: listing pages are how
    /// product pages get discovered.
    pub fn analyze(&self, url: &Url, page: &FetchedPage) -> PageAnalysis {
        let document = Html::parse_document(&page.body);
        let view = PageView {
            url,
            document: &document,
            body: &page.body,
        };

        let verdict = self.strategy.classify(&view);
        let mut links = extract_links(&document, &page.final_url);
        links.extend(self.strategy.extra_links(&view));

        PageAnalysis { verdict, links }
    }

    pub fn should_follow(&self, url: &Url) -> bool {
        self.strategy.should_follow(url)
    }
}

impl fmt::Debug for ProductClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductClassifier")
            .field("strategy", &self.strategy.id())
            .finish()
    }
}

pub(crate) fn compile_selector(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css)
        .map_err(|e| ConfigError::InvalidPattern(format!("Invalid selector '{}': {:?}", css, e)))
}

pub(crate) fn compile_regex(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern)
        .map_err(|e| ConfigError::InvalidPattern(format!("Invalid pattern '{}': {}", pattern, e)))
}
