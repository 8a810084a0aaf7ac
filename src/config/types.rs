use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Product-Scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub seed: Vec<SeedEntry>,
    #[serde(default)]
    pub site: Vec<SiteEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Global ceiling on simultaneous fetches across every domain
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: u32,

    /// How many domains are crawled at the same time
    #[serde(rename = "max-concurrent-domains", default = "default_concurrent_domains")]
    pub max_concurrent_domains: u32,

    /// Simultaneous fetches allowed within one domain
    #[serde(rename = "per-domain-concurrency", default = "default_per_domain_concurrency")]
    pub per_domain_concurrency: u32,

    /// Minimum time between requests to the same domain (milliseconds)
    #[serde(rename = "politeness-delay-ms")]
    pub politeness_delay_ms: u64,

    /// Hard cap on pages fetched per domain
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Maximum link depth from the seed URL
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Wall-clock budget per domain (seconds)
    #[serde(rename = "domain-deadline-secs")]
    pub domain_deadline_secs: u64,

    /// Retries for transient fetch failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay of the exponential retry backoff (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Whether robots.txt rules and crawl delays are honored
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,
}

impl CrawlerConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn domain_deadline(&self) -> Duration {
        Duration::from_secs(self.domain_deadline_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Verify TLS certificates; some storefronts ship broken chains
    #[serde(rename = "verify-tls", default = "default_true")]
    pub verify_tls: bool,

    /// Total request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum redirect hops followed per request
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            verify_tls: true,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,

    /// Full user agent string sent instead of the generated one
    #[serde(rename = "user-agent-override", default)]
    pub override_string: Option<String>,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        match &self.override_string {
            Some(ua) => ua.clone(),
            None => format!(
                "{}/{} (+{}; {})",
                self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
            ),
        }
    }

    /// Token matched against robots.txt user-agent groups
    pub fn robots_token(&self) -> &str {
        &self.crawler_name
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite results database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the JSON results file
    #[serde(rename = "results-path")]
    pub results_path: String,

    /// Path to the markdown run report
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

/// URL canonicalization knobs
#[derive(Debug, Clone, Deserialize)]
pub struct NormalizerConfig {
    /// When non-empty, only these query parameters survive normalization
    #[serde(rename = "query-allow-list", default)]
    pub query_allow_list: Vec<String>,

    /// Path extensions that are never fetched
    #[serde(rename = "skip-extensions", default = "default_skip_extensions")]
    pub skip_extensions: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            query_allow_list: Vec::new(),
            skip_extensions: default_skip_extensions(),
        }
    }
}

/// A seed URL; its host defines the crawl scope of one domain session
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub url: String,

    /// Strategy id forced for this seed's domain
    #[serde(default)]
    pub strategy: Option<String>,

    /// Additional hosts considered in scope (e.g. a CDN-less mobile host)
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,
}

/// Binds a domain pattern ("example.com" or "*.example.com") to a strategy id
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    pub domain: String,
    pub strategy: String,
}

fn default_true() -> bool {
    true
}

fn default_concurrent_domains() -> u32 {
    1
}

fn default_per_domain_concurrency() -> u32 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_redirects() -> u32 {
    10
}

fn default_skip_extensions() -> Vec<String> {
    [
        "css", "js", "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "pdf", "zip", "woff",
        "woff2", "mp4",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
