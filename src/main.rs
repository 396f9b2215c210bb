//! CLI entry point for the harvester tool.

use anyhow::{Context, Result};
use clap::Parser;
use harvester_core::config::SiteConfig;
use harvester_core::crawl::CrawlController;
use harvester_core::fetch::{BrowserClient, Fetcher, LightClient, RateLimiter, RetryCoordinator};
use harvester_core::proxy::load_proxies;
use harvester_core::sink::DelimitedFileSink;
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let mut config = SiteConfig::load(&args.config)
        .with_context(|| format!("Failed to load site config '{}'", args.config.display()))?;
    if let Some(max_pages) = args.max_pages {
        config.fetch.max_pages = max_pages;
    }
    if let Some(max_retries) = args.max_retries {
        config.retry.max_attempts = max_retries;
    }
    let use_browser = args.browser || config.technologies.browser;
    info!(domain = %config.domain, browser = use_browser, "Harvester starting");

    let plan = config.crawl_plan()?;
    let controller = CrawlController::new(plan, RetryCoordinator::new(config.retry_policy()));
    let limiter = RateLimiter::new(config.rate_interval()?);

    let columns = config.field_table()?;
    let mut sink = DelimitedFileSink::open(
        &args.output,
        columns.iter().map(|(name, _)| name.as_str()),
    )
    .await
    .with_context(|| format!("Failed to open output file '{}'", args.output.display()))?;

    let fetcher: Box<dyn Fetcher> = if use_browser {
        Box::new(
            BrowserClient::launch(config.browser_settings(), limiter)
                .await
                .context("Failed to start the browser session")?,
        )
    } else {
        let proxies = if config.technologies.proxy {
            load_proxies(&args.proxies).with_context(|| {
                format!("Failed to read proxy list '{}'", args.proxies.display())
            })?
        } else {
            Vec::new()
        };
        Box::new(
            LightClient::new(config.light_options(proxies), limiter)
                .context("Failed to build the HTTP client")?,
        )
    };

    if let Some(url) = config.bootstrap_url() {
        fetcher.bootstrap(&url).await;
    }

    let report = controller.run(fetcher.as_ref(), &mut sink).await;
    fetcher.close().await;

    info!(
        pages = report.pages,
        written = report.written,
        skipped = report.skipped,
        reason = %report.stop_reason,
        output = %sink.path().display(),
        "Harvest complete"
    );

    Ok(())
}
