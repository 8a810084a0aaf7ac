//! Integration tests for the crawler
//!
//! Most tests drive a whole run through a scripted in-memory fetcher. The
//! last one uses wiremock to run the real HTTP fetcher and every result sink
//! end-to-end.

use async_trait::async_trait;
use product_scout::config::{parse_config, Config};
use product_scout::crawler::{
    run_crawl, CrawlPlan, FetchError, FetchErrorKind, FetchResult, FetchedPage, Fetcher,
};
use product_scout::output::RunSummary;
use product_scout::state::{AbortReason, DomainStatus};
use product_scout::storage::{DomainReport, ResultSink, StorageResult};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a configuration for the given seeds with robots.txt disabled
fn create_test_config(seeds: &[&str]) -> Config {
    let mut toml = String::from(
        r#"
[crawler]
max-concurrent-fetches = 8
max-concurrent-domains = 4
per-domain-concurrency = 4
politeness-delay-ms = 0
max-pages = 200
max-depth = 5
domain-deadline-secs = 30
max-retries = 3
retry-backoff-ms = 1
respect-robots = false

[user-agent]
crawler-name = "TestScout"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "unused.db"
results-path = "unused.json"
summary-path = "unused.md"
"#,
    );
    for seed in seeds {
        toml.push_str(&format!("\n[[seed]]\nurl = \"{}\"\n", seed));
    }
    parse_config(&toml).expect("test config should parse")
}

#[derive(Clone)]
enum Script {
    Html(String),
    Status(u16),
    /// Times out this many times, then serves the page
    Flaky(u32, String),
    /// Never answers within any test deadline
    Hang,
}

/// Scripted fetcher; unknown URLs get a 404
#[derive(Default)]
struct ScriptedFetcher {
    scripts: HashMap<String, Script>,
    failures: Mutex<HashMap<String, u32>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn script(&mut self, url: &str, script: Script) {
        self.scripts.insert(url.to_string(), script);
    }

    fn page(&mut self, url: &str, body: impl Into<String>) {
        self.script(url, Script::Html(body.into()));
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let script = self
            .scripts
            .get(url.as_str())
            .cloned()
            .unwrap_or(Script::Status(404));

        let body = match script {
            Script::Html(body) => body,
            Script::Status(code) => {
                return Err(FetchError::new(
                    FetchErrorKind::HttpError(code),
                    format!("{} returned {}", url, code),
                ))
            }
            Script::Flaky(times, body) => {
                let mut failures = self.failures.lock().unwrap();
                let seen = failures.entry(url.to_string()).or_insert(0);
                if *seen < times {
                    *seen += 1;
                    return Err(FetchError::new(FetchErrorKind::Timeout, "scripted timeout"));
                }
                body
            }
            Script::Hang => unreachable!("handled before respond"),
        };

        Ok(FetchedPage {
            final_url: url.clone(),
            status: 200,
            headers: [("content-type".to_string(), "text/html".to_string())]
                .into_iter()
                .collect(),
            body,
        })
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if matches!(self.scripts.get(url.as_str()), Some(Script::Hang)) {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = self.respond(url);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        FetchResult {
            url: url.clone(),
            outcome,
            latency: self.delay,
        }
    }
}

/// Keeps every flushed report in memory
#[derive(Clone, Default)]
struct MemorySink {
    reports: Arc<Mutex<Vec<DomainReport>>>,
    finalized: Arc<Mutex<bool>>,
}

impl ResultSink for MemorySink {
    fn append(&mut self, report: &DomainReport) -> StorageResult<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }

    fn finalize(&mut self, _summary: &RunSummary) -> StorageResult<()> {
        *self.finalized.lock().unwrap() = true;
        Ok(())
    }
}

impl MemorySink {
    fn report(&self, domain: &str) -> DomainReport {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.summary.domain == domain)
            .cloned()
            .unwrap_or_else(|| panic!("no report flushed for {}", domain))
    }
}

fn product_page(name: &str) -> String {
    format!(
        r#"<html><head><title>{0}</title>
        <script type="application/ld+json">{{"@context":"https://schema.org","@type":"Product","name":"{0}"}}</script>
        </head><body><h1>{0}</h1></body></html>"#,
        name
    )
}

fn plain_page(title: &str) -> String {
    format!(
        "<html><head><title>{0}</title></head><body><p>{0}</p></body></html>",
        title
    )
}

fn link_page(links: &[String]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{0}">{0}</a>"#, href))
        .collect();
    format!("<html><body><nav>{}</nav></body></html>", anchors)
}

async fn execute(config: Config, fetcher: Arc<ScriptedFetcher>) -> (RunSummary, MemorySink) {
    let sink = MemorySink::default();
    let plan = CrawlPlan::new(config).expect("plan should build");
    let summary = plan
        .execute(fetcher, Box::new(sink.clone()), "test-hash")
        .await
        .expect("run should finish");
    (summary, sink)
}

/// A 50-page storefront: 10 products, 5 dead links, 2 pages that time out
/// twice before answering, and 32 ordinary pages
fn storefront(base: &str) -> ScriptedFetcher {
    let mut fetcher = ScriptedFetcher::default();
    let mut links = Vec::new();

    for i in 1..=10 {
        let href = format!("/p/item-{}", i);
        fetcher.page(&format!("{}{}", base, href), product_page(&format!("Item {}", i)));
        links.push(href);
    }
    for i in 1..=5 {
        links.push(format!("/gone/{}", i));
    }
    for i in 1..=2 {
        let href = format!("/help/{}", i);
        fetcher.script(
            &format!("{}{}", base, href),
            Script::Flaky(2, plain_page("Help")),
        );
        links.push(href);
    }
    for i in 1..=32 {
        let href = format!("/info/{}", i);
        fetcher.page(&format!("{}{}", base, href), plain_page("Info"));
        links.push(href);
    }

    fetcher.page(&format!("{}/", base), link_page(&links));
    fetcher
}

#[tokio::test]
async fn test_storefront_products_errors_and_retries() {
    let mut config = create_test_config(&["https://shop.example/"]);
    let fetcher = Arc::new(storefront("https://shop.example"));

    let (summary, sink) = execute(config, Arc::clone(&fetcher)).await;
    let report = sink.report("shop.example");

    assert_eq!(report.summary.status, DomainStatus::Completed);
    assert_eq!(report.products.len(), 10);
    assert!(report
        .products
        .iter()
        .all(|p| p.url.starts_with("https://shop.example/p/item-")));

    let m = &report.summary.metrics;
    assert_eq!(m.pages_fetched, 45);
    assert_eq!(m.permanent_skips, 5);
    assert_eq!(m.errors_by_kind["http_404"], 5);
    assert_eq!(m.retried_then_succeeded, 2);
    assert_eq!(m.retries, 4);
    assert_eq!(m.transient_skips, 0);

    assert_eq!(summary.total_products(), 10);
    assert!(*sink.finalized.lock().unwrap());
}

#[tokio::test]
async fn test_global_fetch_ceiling_across_domains() {
    let mut config = create_test_config(
        &[
            "https://one.example/",
            "https://two.example/",
            "https://three.example/",
        ],
    );
    config.crawler.max_concurrent_fetches = 5;
    config.crawler.max_concurrent_domains = 3;
    config.crawler.per_domain_concurrency = 4;

    let mut fetcher = ScriptedFetcher::with_delay(Duration::from_millis(20));
    for host in ["one.example", "two.example", "three.example"] {
        let links: Vec<String> = (1..=10).map(|i| format!("/p/{}", i)).collect();
        fetcher.page(&format!("https://{}/", host), link_page(&links));
        for i in 1..=10 {
            fetcher.page(
                &format!("https://{}/p/{}", host, i),
                product_page(&format!("{} {}", host, i)),
            );
        }
    }
    let fetcher = Arc::new(fetcher);

    let (summary, _) = execute(config, Arc::clone(&fetcher)).await;

    assert!(
        fetcher.max_in_flight() <= 5,
        "saw {} concurrent fetches",
        fetcher.max_in_flight()
    );
    assert!(fetcher.max_in_flight() > 1);
    assert_eq!(summary.domains.len(), 3);
    assert_eq!(summary.total_products(), 30);
    assert!(summary
        .domains
        .iter()
        .all(|d| d.status == DomainStatus::Completed));
}

#[tokio::test]
async fn test_deadline_abort_keeps_earlier_records() {
    let mut config = create_test_config(&["https://slow.example/"]);
    config.crawler.domain_deadline_secs = 1;

    let mut fetcher = ScriptedFetcher::default();
    fetcher.page(
        "https://slow.example/",
        link_page(&["/p/fast".to_string(), "/stuck".to_string()]),
    );
    fetcher.page("https://slow.example/p/fast", product_page("Fast"));
    fetcher.script("https://slow.example/stuck", Script::Hang);

    let (summary, sink) = execute(config, Arc::new(fetcher)).await;
    let report = sink.report("slow.example");

    assert_eq!(
        report.summary.status,
        DomainStatus::Aborted(AbortReason::DeadlineExceeded)
    );
    let urls: Vec<_> = report.products.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls, vec!["https://slow.example/p/fast"]);
    assert_eq!(summary.status_breakdown().get("aborted (deadline_exceeded)"), Some(&1));
}

#[tokio::test]
async fn test_budget_exhaustion_is_flushed_as_aborted() {
    let mut config = create_test_config(&["https://shop.example/"]);
    config.crawler.max_pages = 5;

    let (_, sink) = execute(config, Arc::new(storefront("https://shop.example"))).await;
    let report = sink.report("shop.example");

    assert_eq!(
        report.summary.status,
        DomainStatus::Aborted(AbortReason::BudgetExhausted)
    );
    assert!(report.summary.metrics.fetch_attempts >= 5);
    assert!(report.summary.metrics.pages_fetched <= 5);
}

#[tokio::test]
async fn test_repeated_runs_find_the_same_products() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut config = create_test_config(&["https://shop.example/"]);
        let fetcher = Arc::new(storefront("https://shop.example"));
        let (_, sink) = execute(config, fetcher).await;
        let report = sink.report("shop.example");
        let found: BTreeSet<(String, String)> = report
            .products
            .iter()
            .map(|p| (p.url.clone(), p.strategy.clone()))
            .collect();
        runs.push(found);
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[0].len(), 10);
}

#[tokio::test]
async fn test_full_crawl_over_http() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let html = |body: String| ResponseTemplate::new(200).set_body_raw(body, "text/html");

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(link_page(&[
            format!("{}/p/1", base_url),
            "/p/2".to_string(),
            "/private/p/3".to_string(),
            "/about".to_string(),
            "/missing".to_string(),
        ])))
        .mount(&mock_server)
        .await;

    for (p, name) in [("/p/1", "Linen Shirt"), ("/p/2", "Wool Coat")] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(html(product_page(name)))
            .mount(&mock_server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html(plain_page("About us")))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("out").join("results.db");
    let json_path = dir.path().join("out").join("product_urls.json");
    let summary_path = dir.path().join("out").join("summary.md");

    let mut config = create_test_config(&[&format!("{}/", base_url)]);
    config.crawler.respect_robots = true;
    config.output.database_path = db_path.to_string_lossy().into_owned();
    config.output.results_path = json_path.to_string_lossy().into_owned();
    config.output.summary_path = summary_path.to_string_lossy().into_owned();

    let summary = run_crawl(config, "e2e-hash").await.expect("crawl should succeed");

    assert_eq!(summary.domains.len(), 1);
    let domain = &summary.domains[0];
    assert_eq!(domain.domain, "127.0.0.1");
    assert_eq!(domain.status, DomainStatus::Completed);
    assert_eq!(domain.product_count, 2);
    assert_eq!(domain.metrics.robots_denied, 1);
    assert_eq!(domain.metrics.permanent_skips, 1);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(
        json["127.0.0.1"],
        serde_json::json!([format!("{}/p/1", base_url), format!("{}/p/2", base_url)])
    );
    assert!(json["metadata"]["completion_time"].is_string());

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let (status, products): (String, i64) = conn
        .query_row(
            "SELECT status, total_products FROM runs ORDER BY id DESC LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(status, "completed");
    assert_eq!(products, 2);

    let markdown = std::fs::read_to_string(&summary_path).unwrap();
    assert!(markdown.contains("# Product-Scout Crawl Summary"));
    assert!(markdown.contains("127.0.0.1"));
}

#[tokio::test]
async fn test_run_without_seeds_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&[]);
    config.output.database_path = dir.path().join("results.db").to_string_lossy().into_owned();

    let result = run_crawl(config, "hash").await;

    assert!(matches!(result, Err(product_scout::ScoutError::NoSeeds)));
    assert!(!dir.path().join("results.db").exists());
}
