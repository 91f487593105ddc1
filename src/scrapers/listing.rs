//! Listing page collection through a headless browser.
//!
//! The vc.ru listing renders more summary cards as the page is scrolled, so
//! the collector drives Chromium (via `chromiumoxide`): scroll to the bottom,
//! wait for new cards to settle, scrape what is rendered, and repeat until
//! enough unique posts are seen or the page stops growing.
//!
//! # Card markup
//!
//! ```text
//! div.content.content--short
//! ├── div.content-title        -> title
//! └── a.content__link[href]    -> link (relative to the site origin)
//! ```

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::extract::stripped_text;
use crate::error::ParserError;
use crate::models::PostSummary;

pub const DEFAULT_LISTING_URL: &str = "https://vc.ru/money";
pub const DEFAULT_BASE_ORIGIN: &str = "https://vc.ru";
pub const DEFAULT_SCROLL_PAUSE: Duration = Duration::from_secs(2);
pub const DEFAULT_CHROME_DOCKER_PATH: &str = "/usr/bin/chromium";

static CARD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.content.content--short").unwrap());
static CARD_TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.content-title").unwrap());
static CARD_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.content__link[href]").unwrap());

/// A source of post summaries for the orchestrator.
pub trait ListingSource {
    /// Collect up to `desired_count` unique post summaries.
    fn collect(
        &self,
        desired_count: usize,
    ) -> impl Future<Output = Result<Vec<PostSummary>, ParserError>> + Send;
}

/// The operations the scroll loop needs from a rendered page.
pub trait ScrollPage {
    fn scroll_to_bottom(&self) -> impl Future<Output = Result<(), ParserError>> + Send;
    fn scroll_height(&self) -> impl Future<Output = Result<i64, ParserError>> + Send;
    fn content(&self) -> impl Future<Output = Result<String, ParserError>> + Send;
}

/// Which Chromium binary to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChromeBinary {
    /// Let chromiumoxide find an installed Chrome/Chromium.
    AutoDetect,
    Path(PathBuf),
}

impl ChromeBinary {
    /// Pick the binary from deployment settings.
    ///
    /// `env == Some("DOCKER")` selects the container binary at `docker_path`;
    /// otherwise an explicit `chrome_path` wins over auto-detection.
    pub fn select(env: Option<&str>, docker_path: PathBuf, chrome_path: Option<PathBuf>) -> Self {
        match (env, chrome_path) {
            (Some(env), _) if env.eq_ignore_ascii_case("docker") => ChromeBinary::Path(docker_path),
            (_, Some(path)) => ChromeBinary::Path(path),
            _ => ChromeBinary::AutoDetect,
        }
    }
}

/// Settings for one listing session.
#[derive(Debug, Clone)]
pub struct ListingConfig {
    /// Page to open and scroll.
    pub listing_url: String,
    /// Origin relative card links are resolved against.
    pub base_origin: Url,
    /// How long to wait after each scroll for new cards to render.
    pub scroll_pause: Duration,
    pub chrome: ChromeBinary,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            base_origin: Url::parse(DEFAULT_BASE_ORIGIN).expect("valid default origin"),
            scroll_pause: DEFAULT_SCROLL_PAUSE,
            chrome: ChromeBinary::AutoDetect,
        }
    }
}

/// Scrape every complete summary card in `html`.
///
/// Cards without a title or without a resolvable link are skipped.
pub fn parse_cards(html: &str, base: &Url) -> Vec<PostSummary> {
    let document = Html::parse_document(html);
    document
        .select(&CARD_SELECTOR)
        .filter_map(|card| {
            let title = card.select(&CARD_TITLE_SELECTOR).next().map(stripped_text)?;
            let href = card
                .select(&CARD_LINK_SELECTOR)
                .next()
                .and_then(|a| a.value().attr("href"))?;
            let link = base.join(href).ok()?;
            Some(PostSummary {
                title,
                link: link.to_string(),
            })
        })
        .collect()
}

/// Run the scroll loop on an open page.
///
/// Each round scrolls to the bottom, waits `pause`, measures the page height
/// and scrapes the rendered cards. The loop ends once `desired_count` unique
/// links are collected or the height did not change since the previous
/// round.
///
/// # Arguments
///
/// * `page` - The rendered listing page
/// * `base` - Origin that relative card links are joined onto
/// * `desired_count` - Number of unique summaries wanted
/// * `pause` - Wait after each scroll for new cards to render
///
/// # Returns
///
/// At most `desired_count` summaries, deduplicated by link in first-seen
/// order. Fewer are returned when the page runs out of posts.
///
/// # Errors
///
/// Any [`ParserError::Browser`] raised by the page aborts the loop.
#[instrument(level = "info", skip_all, fields(desired_count = desired_count))]
pub async fn collect_posts<P: ScrollPage>(
    page: &P,
    base: &Url,
    desired_count: usize,
    pause: Duration,
) -> Result<Vec<PostSummary>, ParserError> {
    let mut seen = HashSet::new();
    let mut posts = Vec::new();
    let mut last_height = page.scroll_height().await?;
    let mut round = 0usize;

    while posts.len() < desired_count {
        round += 1;
        page.scroll_to_bottom().await?;
        tokio::time::sleep(pause).await;
        let new_height = page.scroll_height().await?;

        let html = page.content().await?;
        for card in parse_cards(&html, base) {
            if seen.insert(card.link.clone()) {
                posts.push(card);
            }
        }
        debug!(round, new_height, collected = posts.len(), "Scroll round finished");

        if posts.len() >= desired_count {
            break;
        }
        if new_height == last_height {
            info!(round, collected = posts.len(), "Page stopped growing");
            break;
        }
        last_height = new_height;
    }

    posts.truncate(desired_count);
    info!(count = posts.len(), rounds = round, "Collected post summaries");
    Ok(posts)
}

impl ScrollPage for Page {
    async fn scroll_to_bottom(&self) -> Result<(), ParserError> {
        self.evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .map_err(|e| ParserError::Browser(format!("scroll failed: {e}")))?;
        Ok(())
    }

    async fn scroll_height(&self) -> Result<i64, ParserError> {
        self.evaluate("document.body.scrollHeight")
            .await
            .map_err(|e| ParserError::Browser(format!("height query failed: {e}")))?
            .into_value::<i64>()
            .map_err(|e| ParserError::Browser(format!("unexpected height value: {e}")))
    }

    async fn content(&self) -> Result<String, ParserError> {
        Page::content(self)
            .await
            .map_err(|e| ParserError::Browser(format!("failed to read page source: {e}")))
    }
}

/// Listing collector backed by a headless Chromium instance.
///
/// Every call to [`collect`](ListingSource::collect) launches its own browser
/// and tears it down before returning, on success and on failure alike.
#[derive(Debug, Clone)]
pub struct BrowserListing {
    config: ListingConfig,
}

impl BrowserListing {
    pub fn new(config: ListingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ListingConfig {
        &self.config
    }

    fn browser_config(&self) -> Result<BrowserConfig, ParserError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if let ChromeBinary::Path(path) = &self.config.chrome {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|e| ParserError::Browser(format!("failed to build browser config: {e}")))
    }

    async fn launch(&self) -> Result<ChromeSession<'_>, ParserError> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ParserError::Browser(format!("failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler error");
                }
            }
        });
        Ok(ChromeSession {
            browser,
            handler_task,
            config: &self.config,
        })
    }
}

/// A launched browser that must be shut down once the listing is scraped.
pub trait BrowserSession {
    fn scroll_listing(
        &self,
        desired_count: usize,
    ) -> impl Future<Output = Result<Vec<PostSummary>, ParserError>> + Send;

    /// Close the browser. Failures are logged, never returned.
    fn shutdown(self) -> impl Future<Output = ()> + Send;
}

/// Scrape the listing through `session`, then shut it down whatever the
/// outcome.
///
/// # Arguments
///
/// * `session` - A freshly launched browser session
/// * `desired_count` - Number of unique summaries wanted
///
/// # Returns
///
/// The outcome of the scroll session. The session is always shut down
/// before this returns.
pub async fn collect_then_shutdown<S: BrowserSession>(
    session: S,
    desired_count: usize,
) -> Result<Vec<PostSummary>, ParserError> {
    let outcome = session.scroll_listing(desired_count).await;
    session.shutdown().await;
    if let Err(e) = &outcome {
        warn!(error = %e, "Listing collection failed");
    }
    outcome
}

/// A Chromium process plus the task that drives its CDP connection.
pub struct ChromeSession<'a> {
    browser: Browser,
    handler_task: JoinHandle<()>,
    config: &'a ListingConfig,
}

impl BrowserSession for ChromeSession<'_> {
    async fn scroll_listing(&self, desired_count: usize) -> Result<Vec<PostSummary>, ParserError> {
        let page = self
            .browser
            .new_page(self.config.listing_url.as_str())
            .await
            .map_err(|e| {
                ParserError::Browser(format!(
                    "failed to open {}: {e}",
                    self.config.listing_url
                ))
            })?;
        collect_posts(
            &page,
            &self.config.base_origin,
            desired_count,
            self.config.scroll_pause,
        )
        .await
    }

    async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close browser cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Failed to reap browser process");
        }
        self.handler_task.abort();
        debug!("Browser torn down");
    }
}

impl ListingSource for BrowserListing {
    #[instrument(level = "info", skip_all, fields(url = %self.config.listing_url, desired_count = desired_count))]
    async fn collect(&self, desired_count: usize) -> Result<Vec<PostSummary>, ParserError> {
        if desired_count == 0 {
            return Ok(Vec::new());
        }

        let session = self.launch().await?;
        info!("Browser launched");
        collect_then_shutdown(session, desired_count).await
    }
}
