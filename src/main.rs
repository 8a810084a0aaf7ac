//! Product-Scout main entry point
//!
//! This is the command-line interface for the Product-Scout crawler.

use anyhow::Context;
use clap::Parser;
use product_scout::config::{load_config_with_hash, validate, Config, SeedEntry};
use product_scout::crawler::{run_crawl, CrawlPlan};
use product_scout::output::print_summary;
use product_scout::StrategyRegistry;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Product-Scout: a polite product-page discovery crawler
///
/// Product-Scout crawls e-commerce sites outward from seed URLs, classifies
/// every fetched page as a product detail page or not, and saves the product
/// URLs of each domain as soon as that domain finishes.
#[derive(Parser, Debug)]
#[command(name = "product-scout")]
#[command(version)]
#[command(about = "A polite product-page discovery crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Seed URL to crawl instead of the configured seeds (repeatable)
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Override the per-domain page budget
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Override the global concurrent fetch ceiling
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_overrides(&mut config, &cli)?;

    if cli.dry_run {
        handle_dry_run(config)
    } else {
        handle_crawl(config, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("product_scout=info,warn"),
            1 => EnvFilter::new("product_scout=debug,info"),
            2 => EnvFilter::new("product_scout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line overrides on top of the file configuration
fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if !cli.seeds.is_empty() {
        config.seed = cli
            .seeds
            .iter()
            .map(|url| SeedEntry {
                url: url.clone(),
                strategy: None,
                allowed_domains: Vec::new(),
            })
            .collect();
    }

    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }

    if let Some(concurrency) = cli.concurrency {
        config.crawler.max_concurrent_fetches = concurrency;
    }

    validate(config).context("Invalid command-line override")?;
    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: Config) -> anyhow::Result<()> {
    let registry = StrategyRegistry::from_config(&config)?;
    let plan = CrawlPlan::with_registry(config, &registry)?;
    let config = plan.config();

    println!("=== Product-Scout Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!(
        "  Max concurrent domains: {}",
        config.crawler.max_concurrent_domains
    );
    println!(
        "  Per-domain concurrency: {}",
        config.crawler.per_domain_concurrency
    );
    println!(
        "  Politeness delay: {}ms",
        config.crawler.politeness_delay_ms
    );
    println!("  Max pages per domain: {}", config.crawler.max_pages);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!(
        "  Domain deadline: {}s",
        config.crawler.domain_deadline_secs
    );
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);
    println!("  Verify TLS: {}", config.fetcher.verify_tls);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Results: {}", config.output.results_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\nStrategies: {}", registry.strategy_ids().join(", "));

    println!("\nSeeds ({}):", plan.seeds().len());
    for seed in plan.seeds() {
        println!(
            "  - {} [{}] via {}",
            seed.domain,
            seed.classifier.strategy_id(),
            seed.seed
        );
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} domains", plan.seeds().len());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    tracing::info!(
        "Seeds: {}, site bindings: {}",
        config.seed.len(),
        config.site.len()
    );

    let summary = run_crawl(config, config_hash)
        .await
        .context("Crawl failed")?;

    print_summary(&summary);
    Ok(())
}
