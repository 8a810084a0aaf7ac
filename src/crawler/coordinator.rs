//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates one domain session:
//! - Loading robots.txt and seeding the frontier
//! - Dispatching fetches under the per-domain and global ceilings
//! - Retrying transient failures and dropping permanent ones
//! - Classifying pages and feeding their links back through the normalizer
//! - Detecting completion, budget exhaustion and deadline expiry
//!
//! [`CrawlPlan`] runs many sessions concurrently and flushes each one to the
//! result sinks at its terminal transition.

use crate::classify::{ClassificationVerdict, ProductClassifier, StrategyRegistry, Verdict};
use crate::config::{Config, SeedEntry};
use crate::crawler::fetcher::{
    FetchError, FetchErrorKind, FetchResult, FetchedPage, Fetcher, HttpFetcher,
};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::scheduler::{CrawlTask, EnqueueOutcome, Frontier, ScheduledFetch};
use crate::output::{
    generate_markdown_summary, CrawlEvent, DomainSummary, MetricsCollector, RunSummary,
    SkipReason,
};
use crate::robots::{fetch_robots, ParsedRobots};
use crate::state::{AbortReason, DomainStatus};
use crate::storage::{
    open_sinks, DomainReport, ProductRecord, ResultSink, StorageError, UncertainRecord,
};
use crate::url::{extract_domain, Normalizer};
use crate::{Result, ScoutError};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use url::Url;

/// Log target for verdicts worth a manual look when tuning strategies
pub const TUNING_TARGET: &str = "product_scout::tuning";

type SharedSink = Arc<Mutex<Box<dyn ResultSink>>>;

/// One seed, resolved and ready to crawl
#[derive(Debug, Clone)]
pub struct SeedPlan {
    pub seed: Url,
    pub domain: String,
    pub classifier: ProductClassifier,
    pub normalizer: Normalizer,
}

/// Validated crawl plan for a whole run
///
/// Building the plan performs every run-fatal check (no seeds, bad seed
/// URLs, unknown strategies), so a plan that exists can run without writing
/// anything that a later configuration error would invalidate.
#[derive(Debug)]
pub struct CrawlPlan {
    config: Arc<Config>,
    seeds: Vec<SeedPlan>,
}

impl CrawlPlan {
    /// Resolves every seed against the built-in and configured strategies
    pub fn new(config: Config) -> Result<Self> {
        let registry = StrategyRegistry::from_config(&config)?;
        Self::with_registry(config, &registry)
    }

    /// Resolves every seed against `registry`
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlPlan)` - At least one seed, all resolvable
    /// * `Err(ScoutError::NoSeeds)` - The configuration names no seeds
    /// * `Err(ScoutError)` - A seed URL or forced strategy is invalid
    pub fn with_registry(config: Config, registry: &StrategyRegistry) -> Result<Self> {
        crate::config::validate_seeds(&config.seed)?;

        let mut seeds = Vec::new();
        let mut domains = HashSet::new();
        for entry in &config.seed {
            let plan = Self::plan_seed(&config, registry, entry)?;
            if !domains.insert(plan.domain.clone()) {
                tracing::warn!(
                    "Seed {} repeats domain {}, skipping",
                    entry.url,
                    plan.domain
                );
                continue;
            }
            seeds.push(plan);
        }

        if seeds.is_empty() {
            return Err(ScoutError::NoSeeds);
        }

        Ok(Self {
            config: Arc::new(config),
            seeds,
        })
    }

    fn plan_seed(config: &Config, registry: &StrategyRegistry, entry: &SeedEntry) -> Result<SeedPlan> {
        let raw = Url::parse(&entry.url)
            .map_err(|e| crate::UrlError::Parse(format!("{}: {}", entry.url, e)))?;
        let normalizer = Normalizer::for_seed(&raw, &entry.allowed_domains, &config.normalizer);
        let seed = normalizer.normalize(&entry.url, None)?;
        let domain = extract_domain(&seed).ok_or(crate::UrlError::MissingDomain)?;
        let classifier = registry.classifier_for(&domain, entry.strategy.as_deref())?;
        Ok(SeedPlan {
            seed,
            domain,
            classifier,
            normalizer,
        })
    }

    pub fn seeds(&self) -> &[SeedPlan] {
        &self.seeds
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Crawls every seed and flushes each domain as it finishes
    ///
    /// Domains run `max-concurrent-domains` at a time and share one pool of
    /// `max-concurrent-fetches` permits. A sink failure for one domain is
    /// logged and the run continues.
    pub async fn execute(
        self,
        fetcher: Arc<dyn Fetcher>,
        sink: Box<dyn ResultSink>,
        config_hash: &str,
    ) -> Result<RunSummary> {
        let started_at = Utc::now();
        let metrics = Arc::new(MetricsCollector::new());
        let global = Arc::new(Semaphore::new(
            self.config.crawler.max_concurrent_fetches as usize,
        ));
        let sink: SharedSink = Arc::new(Mutex::new(sink));
        let concurrent_domains = self.config.crawler.max_concurrent_domains.max(1) as usize;

        tracing::info!(
            "Crawling {} domain(s), {} at a time, {} fetches max",
            self.seeds.len(),
            concurrent_domains,
            self.config.crawler.max_concurrent_fetches
        );

        let config = Arc::clone(&self.config);
        let domains: Vec<DomainSummary> = stream::iter(self.seeds)
            .map(|plan| {
                let crawler = Crawler::new(
                    plan,
                    Arc::clone(&config),
                    Arc::clone(&fetcher),
                    Arc::clone(&global),
                    Arc::clone(&metrics),
                );
                let sink = Arc::clone(&sink);
                async move {
                    let report = crawler.run().await;
                    flush(&sink, report).await
                }
            })
            .buffer_unordered(concurrent_domains)
            .collect()
            .await;

        let summary = RunSummary::from_domains(
            config_hash,
            started_at,
            metrics.elapsed().as_secs_f64(),
            domains,
        );

        let finalize_summary = summary.clone();
        tokio::task::spawn_blocking(move || {
            let mut sink = sink.lock().map_err(|_| StorageError::Poisoned)?;
            sink.finalize(&finalize_summary)
        })
        .await??;

        tracing::info!(
            "Run finished: {} products across {} domains in {:.1}s",
            summary.total_products(),
            summary.domains.len(),
            summary.elapsed_seconds
        );
        Ok(summary)
    }
}

/// Appends one domain report on the blocking pool
async fn flush(sink: &SharedSink, report: DomainReport) -> DomainSummary {
    let summary = report.summary.clone();
    let sink = Arc::clone(sink);

    let result = tokio::task::spawn_blocking(move || {
        let mut sink = sink.lock().map_err(|_| StorageError::Poisoned)?;
        sink.append(&report)
    })
    .await;

    match result {
        Ok(Ok(())) => tracing::info!(
            domain = %summary.domain,
            "Flushed {} product URLs ({})",
            summary.product_count,
            summary.status
        ),
        Ok(Err(e)) => tracing::error!(domain = %summary.domain, "Failed to flush results: {}", e),
        Err(e) => tracing::error!(domain = %summary.domain, "Flush task failed: {}", e),
    }

    summary
}

/// Crawls one domain session from seed to terminal transition
pub struct Crawler {
    seed: Url,
    domain: String,
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    global: Arc<Semaphore>,
    metrics: Arc<MetricsCollector>,
    classifier: ProductClassifier,
    normalizer: Normalizer,
    frontier: Frontier,
    in_flight: JoinSet<(CrawlTask, u32, FetchResult)>,
    retry: RetryPolicy,
    robots: ParsedRobots,
    status: DomainStatus,
    products: BTreeMap<String, ProductRecord>,
    uncertain: BTreeMap<String, UncertainRecord>,
    started_at: DateTime<Utc>,
}

impl Crawler {
    pub fn new(
        plan: SeedPlan,
        config: Arc<Config>,
        fetcher: Arc<dyn Fetcher>,
        global: Arc<Semaphore>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let frontier = Frontier::new(&plan.domain, &config.crawler, Arc::clone(&global));
        let retry = RetryPolicy::from_config(&config.crawler);
        Self {
            seed: plan.seed,
            domain: plan.domain,
            config,
            fetcher,
            global,
            metrics,
            classifier: plan.classifier,
            normalizer: plan.normalizer,
            frontier,
            in_flight: JoinSet::new(),
            retry,
            robots: ParsedRobots::allow_all(),
            status: DomainStatus::Pending,
            products: BTreeMap::new(),
            uncertain: BTreeMap::new(),
            started_at: Utc::now(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn status(&self) -> DomainStatus {
        self.status
    }

    /// Runs the session to completion or abort and returns its report
    ///
    /// The report always carries every record found before the terminal
    /// transition, aborted sessions included.
    pub async fn run(mut self) -> DomainReport {
        self.started_at = Utc::now();
        self.set_status(DomainStatus::Running);
        self.metrics.record(CrawlEvent::DomainStarted {
            domain: self.domain.clone(),
        });
        tracing::info!(
            domain = %self.domain,
            strategy = self.classifier.strategy_id(),
            "Starting crawl for {}",
            self.seed
        );

        let deadline = Instant::now() + self.config.crawler.domain_deadline();
        let status = self.crawl(deadline).await;

        if !self.in_flight.is_empty() {
            tracing::debug!(
                domain = %self.domain,
                "Discarding {} in-flight fetches",
                self.in_flight.len()
            );
            self.in_flight.detach_all();
        }

        self.finish(status)
    }

    /// The fetch, classify, expand loop
    ///
    /// The deadline branch is polled first, so no result that arrives after
    /// the deadline is ever processed.
    async fn crawl(&mut self, deadline: Instant) -> DomainStatus {
        let expired = DomainStatus::Aborted(AbortReason::DeadlineExceeded);

        if self.config.crawler.respect_robots
            && tokio::time::timeout_at(deadline, self.load_robots())
                .await
                .is_err()
        {
            return expired;
        }

        let seed = self.seed.clone();
        if self.frontier.enqueue(seed, 0) != EnqueueOutcome::Queued {
            tracing::warn!(domain = %self.domain, "Seed could not be queued");
        }

        let per_domain = self.config.crawler.per_domain_concurrency.max(1) as usize;
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        loop {
            if !self.frontier.has_pending() && self.in_flight.is_empty() {
                return if self.frontier.is_over_budget() {
                    DomainStatus::Aborted(AbortReason::BudgetExhausted)
                } else {
                    DomainStatus::Completed
                };
            }

            let can_dispatch = self.frontier.has_pending() && self.in_flight.len() < per_domain;
            let has_in_flight = !self.in_flight.is_empty();

            tokio::select! {
                biased;

                _ = &mut sleep => {
                    tracing::warn!(
                        domain = %self.domain,
                        "Deadline reached with {} pending and {} in flight",
                        self.frontier.pending_count(),
                        self.in_flight.len()
                    );
                    return expired;
                }
                joined = self.in_flight.join_next(), if has_in_flight => {
                    match joined {
                        Some(Ok((task, attempt, result))) => self.handle_result(task, attempt, result),
                        Some(Err(e)) => {
                            tracing::error!(domain = %self.domain, "Fetch task failed: {}", e);
                        }
                        None => {}
                    }
                }
                scheduled = self.frontier.next(), if can_dispatch => {
                    if let Some(scheduled) = scheduled {
                        self.dispatch(scheduled);
                    }
                }
            }
        }
    }

    /// Fetches robots.txt under a global permit and applies its crawl delay
    async fn load_robots(&mut self) {
        let permit = match Arc::clone(&self.global).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        self.frontier.record_request();
        self.robots = fetch_robots(self.fetcher.as_ref(), &self.seed).await;
        drop(permit);

        if let Some(delay) = self.robots.crawl_delay(self.config.user_agent.robots_token()) {
            tracing::debug!(domain = %self.domain, "robots.txt crawl delay {:?}", delay);
            self.frontier.apply_crawl_delay(delay);
        }
    }

    fn dispatch(&mut self, scheduled: ScheduledFetch) {
        tracing::debug!(
            domain = %self.domain,
            attempt = scheduled.attempt,
            "Fetching {}",
            scheduled.task.url
        );
        self.metrics.record(CrawlEvent::FetchAttempted {
            domain: self.domain.clone(),
        });

        let fetcher = Arc::clone(&self.fetcher);
        self.in_flight.spawn(async move {
            let ScheduledFetch {
                task,
                attempt,
                _permit: permit,
            } = scheduled;
            let started = std::time::Instant::now();
            let result = match AssertUnwindSafe(fetcher.fetch(&task.url)).catch_unwind().await {
                Ok(result) => result,
                Err(_) => FetchResult {
                    url: task.url.clone(),
                    outcome: Err(FetchError::new(FetchErrorKind::Protocol, "fetcher panicked")),
                    latency: started.elapsed(),
                },
            };
            drop(permit);
            (task, attempt, result)
        });
    }

    fn handle_result(&mut self, task: CrawlTask, attempt: u32, result: FetchResult) {
        match result.outcome {
            Ok(page) => {
                self.metrics.record(CrawlEvent::FetchSucceeded {
                    domain: self.domain.clone(),
                    retried: attempt > 0,
                    latency: result.latency,
                });

                if page.is_html() {
                    self.process_page(&task, &page);
                } else {
                    tracing::debug!(
                        "Skipping {}: not HTML ({})",
                        task.url,
                        page.content_type().unwrap_or("unknown")
                    );
                    self.skip(SkipReason::Permanent);
                }
                self.frontier.mark_done(&task);
            }
            Err(error) => {
                self.metrics.record(CrawlEvent::FetchFailed {
                    domain: self.domain.clone(),
                    kind: error.kind,
                });

                if error.kind.is_rate_limited() {
                    self.frontier.back_off();
                }

                if self.retry.should_retry(attempt, error.kind) {
                    let next_attempt = attempt + 1;
                    let delay = self.retry.calculate_backoff(next_attempt);
                    tracing::debug!(
                        "Retrying {} in {:?} (retry {}/{}): {}",
                        task.url,
                        delay,
                        next_attempt,
                        self.retry.max_retries,
                        error
                    );
                    self.metrics.record(CrawlEvent::RetryScheduled {
                        domain: self.domain.clone(),
                    });
                    self.frontier.retry(task, next_attempt, delay);
                } else if error.kind.is_transient() {
                    tracing::warn!("Giving up on {} after {} retries: {}", task.url, attempt, error);
                    self.skip(SkipReason::Transient);
                    self.frontier.mark_done(&task);
                } else {
                    tracing::debug!("Dropping {}: {}", task.url, error);
                    self.skip(SkipReason::Permanent);
                    self.frontier.mark_done(&task);
                }
            }
        }
    }

    fn process_page(&mut self, task: &CrawlTask, page: &FetchedPage) {
        let analysis = self.classifier.analyze(&task.url, page);
        self.record_verdict(task, &analysis.verdict);

        let next_depth = task.depth + 1;
        for link in &analysis.links {
            let url = match self.normalizer.normalize(link, Some(&page.final_url)) {
                Ok(url) => url,
                Err(e) => {
                    tracing::trace!("Rejected link {}: {}", link, e);
                    self.metrics.record(CrawlEvent::LinkRejected {
                        domain: self.domain.clone(),
                    });
                    continue;
                }
            };

            if !self.classifier.should_follow(&url) {
                tracing::trace!("Strategy excludes {}", url);
                continue;
            }

            if self.config.crawler.respect_robots
                && !self
                    .robots
                    .is_allowed(url.as_str(), self.config.user_agent.robots_token())
            {
                if self.frontier.mark_seen(&url) {
                    tracing::debug!("{} disallowed by robots.txt", url);
                    self.skip(SkipReason::RobotsDenied);
                }
                continue;
            }

            let outcome = self.frontier.enqueue(url, next_depth);
            if outcome != EnqueueOutcome::Queued && outcome != EnqueueOutcome::Duplicate {
                tracing::trace!("Not queued ({:?}): {}", outcome, link);
            }
        }
    }

    fn record_verdict(&mut self, task: &CrawlTask, verdict: &ClassificationVerdict) {
        self.metrics.record(CrawlEvent::Classified {
            domain: self.domain.clone(),
            verdict: verdict.label,
        });

        let url = task.url.to_string();
        match verdict.label {
            Verdict::Product => {
                tracing::info!(
                    domain = %self.domain,
                    signals = %verdict.signal_names(),
                    "Product page: {}",
                    url
                );
                self.products.insert(
                    url.clone(),
                    ProductRecord {
                        url,
                        domain: self.domain.clone(),
                        discovered_at: task.discovered_at,
                        strategy: verdict.strategy.clone(),
                    },
                );
            }
            Verdict::Uncertain => {
                tracing::info!(
                    target: TUNING_TARGET,
                    domain = %self.domain,
                    strategy = %verdict.strategy,
                    signals = %verdict.signal_names(),
                    "Uncertain page: {}",
                    url
                );
                self.uncertain.insert(
                    url.clone(),
                    UncertainRecord {
                        url,
                        domain: self.domain.clone(),
                        discovered_at: task.discovered_at,
                        strategy: verdict.strategy.clone(),
                        signals: verdict.signal_names(),
                    },
                );
            }
            Verdict::NonProduct => {
                tracing::debug!("Not a product page: {}", url);
            }
        }
    }

    fn skip(&self, reason: SkipReason) {
        self.metrics.record(CrawlEvent::Skipped {
            domain: self.domain.clone(),
            reason,
        });
    }

    fn set_status(&mut self, next: DomainStatus) {
        if let Err(e) = self.status.transition(next) {
            tracing::error!(domain = %self.domain, "{}", e);
        }
    }

    fn finish(mut self, status: DomainStatus) -> DomainReport {
        self.set_status(status);
        self.metrics.record(CrawlEvent::DomainFinished {
            domain: self.domain.clone(),
            status: self.status,
        });

        let products: Vec<ProductRecord> = self.products.into_values().collect();
        let uncertain: Vec<UncertainRecord> = self.uncertain.into_values().collect();

        let summary = DomainSummary {
            domain: self.domain.clone(),
            seed: self.seed.to_string(),
            strategy: self.classifier.strategy_id().to_string(),
            status: self.status,
            started_at: self.started_at,
            finished_at: Utc::now(),
            product_count: products.len() as u64,
            uncertain_count: uncertain.len() as u64,
            metrics: self.metrics.domain(&self.domain),
        };

        tracing::info!(
            domain = %summary.domain,
            "Crawl {} with {} product URLs in {:.2}s ({} pages fetched)",
            summary.status,
            summary.product_count,
            summary.duration_seconds(),
            summary.metrics.pages_fetched
        );

        DomainReport {
            summary,
            products,
            uncertain,
        }
    }
}

/// Runs the main crawl operation
///
/// This function orchestrates the entire run:
///
/// 1. Resolve seeds and strategies (run-fatal errors surface here)
/// 2. Build the HTTP fetcher
/// 3. Open the SQLite and JSON result sinks
/// 4. Crawl every domain, flushing each at its terminal transition
/// 5. Finalize the sinks and write the markdown report
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file, stamped on the run
///
/// # Returns
///
/// * `Ok(RunSummary)` - Every domain reached a terminal state
/// * `Err(ScoutError)` - The run could not start, or its artifacts could not
///   be finalized
///
/// # Example
///
/// ```no_run
/// use product_scout::config::load_config_with_hash;
/// use product_scout::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("scout.toml"))?;
/// let summary = run_crawl(config, &hash).await?;
/// println!("{} products", summary.total_products());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, config_hash: &str) -> Result<RunSummary> {
    let plan = CrawlPlan::new(config)?;
    let fetcher = Arc::new(HttpFetcher::new(
        &plan.config().fetcher,
        &plan.config().user_agent,
    )?);
    let sinks = open_sinks(&plan.config().output, config_hash)?;
    let summary_path = plan.config().output.summary_path.clone();

    let summary = plan.execute(fetcher, Box::new(sinks), config_hash).await?;

    generate_markdown_summary(&summary, Path::new(&summary_path))?;
    tracing::info!("Summary written to {}", summary_path);

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::crawler::fetcher::{FetchError, FetchErrorKind};
    use crate::storage::StorageResult;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    const CONFIG: &str = r#"
[crawler]
max-concurrent-fetches = 4
per-domain-concurrency = 2
politeness-delay-ms = 0
max-pages = 50
max-depth = 5
domain-deadline-secs = 30
retry-backoff-ms = 1
respect-robots = false

[user-agent]
crawler-name = "TestScout"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "unused.db"
results-path = "unused.json"
summary-path = "unused.md"

[[seed]]
url = "https://shop.example/"
"#;

    #[derive(Clone)]
    enum Reply {
        Html(String),
        Status(u16),
        Fail(FetchErrorKind),
        Panic,
    }

    /// Serves canned replies; unknown URLs get a 404
    ///
    /// Queued replies for a URL are served first, in order.
    #[derive(Default)]
    struct MapFetcher {
        pages: HashMap<String, Reply>,
        queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    }

    impl MapFetcher {
        fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), Reply::Html(body.to_string()));
            self
        }

        fn reply(mut self, url: &str, reply: Reply) -> Self {
            self.pages.insert(url.to_string(), reply);
            self
        }

        fn replies(self, url: &str, replies: Vec<Reply>) -> Self {
            self.queued
                .lock()
                .unwrap()
                .insert(url.to_string(), replies.into_iter().collect());
            self
        }
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(&self, url: &Url) -> FetchResult {
            let queued = self
                .queued
                .lock()
                .unwrap()
                .get_mut(url.as_str())
                .and_then(VecDeque::pop_front);
            let reply = queued
                .or_else(|| self.pages.get(url.as_str()).cloned())
                .unwrap_or(Reply::Status(404));
            let outcome = match reply {
                Reply::Html(body) => Ok(FetchedPage {
                    final_url: url.clone(),
                    status: 200,
                    headers: [("content-type".to_string(), "text/html".to_string())]
                        .into_iter()
                        .collect(),
                    body,
                }),
                Reply::Status(code) => Err(FetchError::new(
                    FetchErrorKind::HttpError(code),
                    format!("{} returned {}", url, code),
                )),
                Reply::Fail(kind) => Err(FetchError::new(kind, "mock failure")),
                Reply::Panic => panic!("scripted fetcher panic"),
            };
            FetchResult {
                url: url.clone(),
                outcome,
                latency: Duration::from_millis(1),
            }
        }
    }

    #[derive(Default)]
    struct MemorySink {
        reports: Arc<Mutex<Vec<DomainReport>>>,
    }

    impl ResultSink for MemorySink {
        fn append(&mut self, report: &DomainReport) -> StorageResult<()> {
            self.reports.lock().unwrap().push(report.clone());
            Ok(())
        }

        fn finalize(&mut self, _summary: &RunSummary) -> StorageResult<()> {
            Ok(())
        }
    }

    fn product(name: &str) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{{"@type":"Product","name":"{}"}}</script></head><body></body></html>"#,
            name
        )
    }

    fn crawler(config: &str, fetcher: MapFetcher) -> (Crawler, Arc<MetricsCollector>) {
        let plan = CrawlPlan::new(parse_config(config).unwrap()).unwrap();
        let seed = plan.seeds()[0].clone();
        let metrics = Arc::new(MetricsCollector::new());
        let crawler = Crawler::new(
            seed,
            Arc::new(plan.config().clone()),
            Arc::new(fetcher),
            Arc::new(Semaphore::new(4)),
            Arc::clone(&metrics),
        );
        (crawler, metrics)
    }

    #[tokio::test]
    async fn test_crawl_collects_products_and_follows_links() {
        let fetcher = MapFetcher::default()
            .page(
                "https://shop.example/",
                r#"<a href="/p/1">one</a><a href="/p/2#reviews">two</a><a href="https://elsewhere.example/p/9">x</a>"#,
            )
            .page("https://shop.example/p/1", &product("one"))
            .page("https://shop.example/p/2", &product("two"));

        let (crawler, _) = crawler(CONFIG, fetcher);
        let report = crawler.run().await;

        assert_eq!(report.summary.status, DomainStatus::Completed);
        let urls: Vec<_> = report.products.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://shop.example/p/1", "https://shop.example/p/2"]);
        assert_eq!(report.summary.metrics.pages_fetched, 3);
        assert_eq!(report.summary.metrics.links_rejected, 1);
        assert!(report.products.iter().all(|p| p.strategy == "generic"));
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let fetcher = MapFetcher::default().page(
            "https://shop.example/",
            r#"<a href="/gone">gone</a><a href="/forbidden">403</a>"#,
        )
        .reply("https://shop.example/forbidden", Reply::Status(403));

        let (crawler, _) = crawler(CONFIG, fetcher);
        let report = crawler.run().await;

        let m = &report.summary.metrics;
        assert_eq!(m.permanent_skips, 2);
        assert_eq!(m.retries, 0);
        assert_eq!(m.errors_by_kind["http_404"], 1);
        assert_eq!(m.errors_by_kind["http_403"], 1);
        assert_eq!(report.summary.status, DomainStatus::Completed);
    }

    #[tokio::test]
    async fn test_transient_errors_retried_then_skipped() {
        let fetcher = MapFetcher::default()
            .page("https://shop.example/", r#"<a href="/slow">slow</a>"#)
            .reply("https://shop.example/slow", Reply::Fail(FetchErrorKind::Timeout));

        let (crawler, _) = crawler(CONFIG, fetcher);
        let report = crawler.run().await;

        let m = &report.summary.metrics;
        assert_eq!(m.retries, 3);
        assert_eq!(m.transient_skips, 1);
        assert_eq!(m.errors_by_kind["timeout"], 4);
        assert_eq!(report.summary.status, DomainStatus::Completed);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_aborts_with_partial_results() {
        let config = CONFIG.replace("max-pages = 50", "max-pages = 2");
        let fetcher = MapFetcher::default()
            .page(
                "https://shop.example/",
                r#"<a href="/p/1">1</a><a href="/p/2">2</a><a href="/p/3">3</a>"#,
            )
            .page("https://shop.example/p/1", &product("one"))
            .page("https://shop.example/p/2", &product("two"));

        let (crawler, _) = crawler(&config, fetcher);
        let report = crawler.run().await;

        assert_eq!(
            report.summary.status,
            DomainStatus::Aborted(AbortReason::BudgetExhausted)
        );
        assert_eq!(report.summary.metrics.pages_fetched, 2);
        assert_eq!(report.products.len(), 1);
    }

    #[tokio::test]
    async fn test_depth_limit_stops_expansion() {
        let config = CONFIG.replace("max-depth = 5", "max-depth = 1");
        let fetcher = MapFetcher::default()
            .page("https://shop.example/", r#"<a href="/c">c</a>"#)
            .page("https://shop.example/c", r#"<a href="/c/deep">deep</a>"#);

        let (crawler, _) = crawler(&config, fetcher);
        let report = crawler.run().await;

        assert_eq!(report.summary.status, DomainStatus::Completed);
        assert_eq!(report.summary.metrics.fetch_attempts, 2);
    }

    #[tokio::test]
    async fn test_uncertain_pages_kept_apart() {
        let listing = r#"<html><body>
            <span class="price">Rs. 499</span>
            <div class="product-card"><a href="/p/1">1</a></div>
            <div class="product-card"><a href="/p/2">2</a></div>
            <div class="product-card"><a href="/p/3">3</a></div>
            <div class="product-card"><a href="/p/4">4</a></div>
            <div class="product-card"><a href="/p/5">5</a></div>
            <div class="product-card"><a href="/p/6">6</a></div>
        </body></html>"#;
        let fetcher = MapFetcher::default().page("https://shop.example/", listing);

        let (crawler, _) = crawler(CONFIG, fetcher);
        let report = crawler.run().await;

        assert!(report.products.is_empty());
        assert_eq!(report.uncertain.len(), 1);
        assert_eq!(report.summary.uncertain_count, 1);
        assert!(report.uncertain[0].signals.contains("product_grid"));
    }

    #[tokio::test]
    async fn test_robots_disallow_counted_once() {
        let config = CONFIG.replace("respect-robots = false", "respect-robots = true");
        let fetcher = MapFetcher::default()
            .page(
                "https://shop.example/robots.txt",
                "User-agent: *\nDisallow: /private\n",
            )
            .page(
                "https://shop.example/",
                r#"<a href="/private/a">a</a><a href="/private/a">again</a><a href="/p/1">1</a>"#,
            )
            .page("https://shop.example/p/1", &product("one"));

        let (crawler, _) = crawler(&config, fetcher);
        let report = crawler.run().await;

        assert_eq!(report.summary.metrics.robots_denied, 1);
        assert_eq!(report.products.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_flushes_each_domain() {
        let config = format!(
            "{}\n[[seed]]\nurl = \"https://second.example/\"\n",
            CONFIG
        );
        let plan = CrawlPlan::new(parse_config(&config).unwrap()).unwrap();
        let fetcher = MapFetcher::default()
            .page("https://shop.example/", &product("seed"))
            .page("https://second.example/", "<html></html>");

        let sink = MemorySink::default();
        let reports = Arc::clone(&sink.reports);
        let summary = plan
            .execute(Arc::new(fetcher), Box::new(sink), "hash")
            .await
            .unwrap();

        assert_eq!(reports.lock().unwrap().len(), 2);
        assert_eq!(summary.domains.len(), 2);
        assert_eq!(summary.total_products(), 1);
        assert_eq!(summary.domains[0].domain, "second.example");
    }

    #[test]
    fn test_plan_rejects_missing_seeds() {
        let config = CONFIG.replace("[[seed]]\nurl = \"https://shop.example/\"\n", "");
        let result = CrawlPlan::new(parse_config(&config).unwrap());
        assert!(matches!(result, Err(ScoutError::NoSeeds)));
    }

    #[test]
    fn test_plan_rejects_unknown_strategy() {
        let config = format!("{}strategy = \"nope\"\n", CONFIG);
        let result = CrawlPlan::new(parse_config(&config).unwrap());
        assert!(matches!(result, Err(ScoutError::UnknownStrategy(_))));
    }

    #[test]
    fn test_plan_skips_duplicate_domains() {
        let config = format!("{}\n[[seed]]\nurl = \"https://shop.example/sale\"\n", CONFIG);
        let plan = CrawlPlan::new(parse_config(&config).unwrap()).unwrap();
        assert_eq!(plan.seeds().len(), 1);
    }

    #[tokio::test]
    async fn test_server_errors_retried_until_success() {
        let fetcher = MapFetcher::default()
            .page("https://shop.example/", r#"<a href="/p/1">1</a>"#)
            .replies(
                "https://shop.example/p/1",
                vec![Reply::Status(503), Reply::Html(product("one"))],
            );

        let (crawler, _) = crawler(CONFIG, fetcher);
        let report = crawler.run().await;

        let m = &report.summary.metrics;
        assert_eq!(report.products.len(), 1);
        assert_eq!(m.retries, 1);
        assert_eq!(m.retried_then_succeeded, 1);
        assert_eq!(m.errors_by_kind["http_503"], 1);
        assert_eq!(m.permanent_skips + m.transient_skips, 0);
    }

    #[tokio::test]
    async fn test_rate_limit_doubles_politeness_interval() {
        let config = CONFIG.replace("politeness-delay-ms = 0", "politeness-delay-ms = 100");
        let fetcher = MapFetcher::default()
            .page("https://shop.example/", r#"<a href="/p/1">1</a>"#)
            .replies(
                "https://shop.example/p/1",
                vec![Reply::Status(429), Reply::Html(product("one"))],
            );

        let (mut crawler, metrics) = crawler(&config, fetcher);
        let status = crawler.crawl(Instant::now() + Duration::from_secs(30)).await;

        assert_eq!(status, DomainStatus::Completed);
        assert_eq!(
            crawler.frontier.politeness_interval(),
            Duration::from_millis(200)
        );
        assert_eq!(crawler.products.len(), 1);
        let m = metrics.domain("shop.example");
        assert_eq!(m.retried_then_succeeded, 1);
        assert_eq!(m.errors_by_kind["http_429"], 1);
    }

    #[tokio::test]
    async fn test_panicking_fetch_is_dropped() {
        let fetcher = MapFetcher::default()
            .page(
                "https://shop.example/",
                r#"<a href="/boom">boom</a><a href="/p/1">1</a>"#,
            )
            .reply("https://shop.example/boom", Reply::Panic)
            .page("https://shop.example/p/1", &product("one"));

        let (mut crawler, metrics) = crawler(CONFIG, fetcher);
        let status = crawler.crawl(Instant::now() + Duration::from_secs(30)).await;

        assert_eq!(status, DomainStatus::Completed);
        assert_eq!(crawler.frontier.in_flight_count(), 0);
        assert_eq!(crawler.products.len(), 1);
        let m = metrics.domain("shop.example");
        assert_eq!(m.permanent_skips, 1);
        assert_eq!(m.errors_by_kind["protocol_error"], 1);
    }

    #[test]
    fn test_seed_uses_session_normalizer() {
        let config = format!(
            "{}\n[normalizer]\nquery-allow-list = [\"page\"]\n",
            CONFIG.replace(
                "url = \"https://shop.example/\"",
                "url = \"https://Shop.Example/?sort=asc&page=2\""
            )
        );
        let plan = CrawlPlan::new(parse_config(&config).unwrap()).unwrap();
        let seed = &plan.seeds()[0];

        assert_eq!(seed.seed.as_str(), "https://shop.example/?page=2");
        let link = seed
            .normalizer
            .normalize("/?page=2&sort=asc", Some(&seed.seed))
            .unwrap();
        assert_eq!(link, seed.seed);
    }

    #[tokio::test]
    async fn test_seed_link_back_is_not_refetched() {
        let config = format!(
            "{}\n[normalizer]\nquery-allow-list = [\"page\"]\n",
            CONFIG.replace(
                "url = \"https://shop.example/\"",
                "url = \"https://shop.example/?sort=asc&page=2\""
            )
        );
        let fetcher = MapFetcher::default().page(
            "https://shop.example/?page=2",
            r#"<a href="/?page=2&sort=desc">again</a>"#,
        );

        let (crawler, _) = crawler(&config, fetcher);
        let report = crawler.run().await;

        assert_eq!(report.summary.metrics.fetch_attempts, 1);
        assert_eq!(report.summary.metrics.pages_fetched, 1);
    }

    #[test]
    fn test_plan_rejects_static_asset_seed() {
        let config = CONFIG.replace(
            "url = \"https://shop.example/\"",
            "url = \"https://shop.example/logo.png\""
        );
        let result = CrawlPlan::new(parse_config(&config).unwrap());
        assert!(matches!(
            result,
            Err(ScoutError::Url(crate::UrlError::StaticAsset(_)))
        ));
    }
}
