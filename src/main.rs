//! # vc_money_parser
//!
//! A post-scraping service that collects posts from the vc.ru/money feed,
//! fetches every post page concurrently and extracts its title and text.
//!
//! ## Features
//!
//! - Scrolls the feed in headless Chromium until enough posts are rendered
//! - Fetches post pages with a bounded number of requests in flight
//! - Returns failed fetches as error-tagged posts instead of dropping them
//! - Serves results over HTTP, synchronously or as background tasks
//!
//! ## Usage
//!
//! ```sh
//! vc_money_parser serve --host 0.0.0.0 --port 8000
//! vc_money_parser run --count 20 -j ./json
//! ```
//!
//! ## Architecture
//!
//! The pipeline runs in two phases:
//! 1. **Listing**: scroll the feed and collect `(title, link)` summaries
//! 2. **Details**: fetch and parse every link (100 at a time by default)

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod error;
mod models;
mod outputs;
mod pipeline;
mod routes;
mod scrapers;
mod tasks;
mod utils;

use cli::{Cli, Command, ScraperArgs};
use error::validate_count;
use models::ParseResult;
use outputs::json;
use pipeline::Orchestrator;
use routes::{build_router, AppState};
use scrapers::details::DetailGatherer;
use scrapers::listing::BrowserListing;
use utils::{ensure_writable_dir, truncate_for_log};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let orchestrator = build_orchestrator(&args.scraper)?;

    match args.command {
        Command::Serve {
            host,
            port,
            parser_enabled,
        } => serve(orchestrator, &host, port, parser_enabled).await,
        Command::Run {
            count,
            json_output_dir,
        } => run_once(orchestrator, count, json_output_dir.as_deref()).await,
    }
}

fn build_orchestrator(
    scraper: &ScraperArgs,
) -> Result<Orchestrator<BrowserListing>, Box<dyn Error>> {
    let listing = BrowserListing::new(scraper.listing_config());
    let gatherer = DetailGatherer::new(scraper.request_timeout(), scraper.max_concurrent)?;
    let max_concurrent = gatherer.limit();
    let orchestrator = Orchestrator::new(listing, gatherer);

    let config = orchestrator.listing().config();
    info!(
        listing_url = %config.listing_url,
        chrome = ?config.chrome,
        max_concurrent,
        timeout_secs = scraper.request_timeout_secs,
        "Scraper configured"
    );
    Ok(orchestrator)
}

#[instrument(level = "info", skip(orchestrator))]
async fn serve(
    orchestrator: Orchestrator<BrowserListing>,
    host: &str,
    port: u16,
    parser_enabled: bool,
) -> Result<(), Box<dyn Error>> {
    let app = build_router(AppState::new(orchestrator, parser_enabled));

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, parser_enabled, "vc_money_parser listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[instrument(level = "info", skip(orchestrator))]
async fn run_once(
    orchestrator: Orchestrator<BrowserListing>,
    count: u32,
    json_output_dir: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let count = validate_count(count.into())?;

    // Early check: fail before launching the browser if the output is unusable
    if let Some(dir) = json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "JSON output directory is not writable");
            return Err(e.into());
        }
    }

    let start_time = std::time::Instant::now();
    let batch = orchestrator.run(count as usize).await?;

    for post in batch.posts.iter().filter(|p| p.is_error()) {
        let reason = post.error.as_deref().unwrap_or_default();
        info!(link = %post.link, error = %truncate_for_log(reason, 200), "Post failed");
    }
    let failed = batch.failed_count();
    let result = ParseResult::from(batch);

    match json_output_dir {
        Some(dir) => {
            let path = json::write_parse_result(&result, dir, Local::now()).await?;
            info!(path = %path.display(), "Wrote JSON result");
        }
        None => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    let elapsed = start_time.elapsed();
    info!(
        parsed = result.meta.parsed,
        failed,
        fetch_secs = result.meta.duration_seconds,
        total_secs = elapsed.as_secs(),
        "Execution complete"
    );
    Ok(())
}
