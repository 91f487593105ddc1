//! Concurrent post detail fetching.
//!
//! [`fetch_post_details`] downloads one post page and runs it through the
//! [`extract`](super::extract::extract) step. [`DetailGatherer`] fans a list
//! of URLs out over a shared HTTP session, admitting at most `limit` fetches
//! at a time through a semaphore.
//!
//! Failures never leave this module as errors: a URL that cannot be fetched
//! comes back as an error-tagged [`DetailedPost`], so one bad link never
//! cancels or corrupts the rest of the batch.

use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::extract::extract;
use crate::error::ParserError;
use crate::models::DetailedPost;
use crate::utils::error_chain;

/// Default number of post fetches allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 100;

/// Default response ceiling shared by every request of a batch.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// User-Agent sent with every post request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/113.0.0.0 Safari/537.36";

/// Fetch a single post and extract its title and text.
///
/// Sends one GET request with [`BROWSER_USER_AGENT`]; there are no retries.
///
/// # Arguments
///
/// * `client` - Shared HTTP session; its timeout bounds the request
/// * `url` - Absolute post URL, copied into the result's `link`
///
/// # Returns
///
/// A [`DetailedPost`] with `text` set on success. Transport errors, non-2xx
/// statuses and body read failures yield [`DetailedPost::failed`] with
/// `Request failed: <cause>`; this function never returns an error.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch_post_details(client: &Client, url: &str) -> DetailedPost {
    let html = match download(client, url).await {
        Ok(html) => html,
        Err(e) => {
            let reason = error_chain(&e);
            warn!(error = %reason, "Post fetch failed");
            return DetailedPost::failed(url, format!("Request failed: {reason}"));
        }
    };

    let extracted = extract(&html);
    debug!(
        bytes = html.len(),
        has_title = extracted.title.is_some(),
        text_len = extracted.text.len(),
        "Parsed post"
    );
    DetailedPost::parsed(url, extracted.title, extracted.text)
}

async fn download(client: &Client, url: &str) -> Result<String, reqwest::Error> {
    client
        .get(url)
        .header(USER_AGENT, BROWSER_USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

/// Fetches post details over one shared HTTP session with bounded
/// concurrency.
#[derive(Debug, Clone)]
pub struct DetailGatherer {
    client: Client,
    limit: usize,
}

impl DetailGatherer {
    /// Build a gatherer whose session applies `timeout` to every request.
    pub fn new(timeout: Duration, limit: usize) -> Result<Self, ParserError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, limit))
    }

    /// Build a gatherer around an existing client.
    pub fn with_client(client: Client, limit: usize) -> Self {
        Self { client, limit }
    }

    /// The concurrency ceiling used by [`gather_all`](Self::gather_all).
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fetch every URL with the configured ceiling.
    pub async fn gather_all(&self, urls: Vec<String>) -> Vec<DetailedPost> {
        self.gather(urls, self.limit).await
    }

    /// Fetch every URL, keeping at most `limit` requests in flight.
    ///
    /// All fetches are submitted at once and queue on the semaphore.
    ///
    /// # Arguments
    ///
    /// * `urls` - Post URLs to fetch; duplicates are fetched twice
    /// * `limit` - Maximum requests in flight; 0 is treated as 1
    ///
    /// # Returns
    ///
    /// One [`DetailedPost`] per input URL in completion order. Use
    /// [`DetailedPost::link`] to match results to inputs.
    #[instrument(level = "info", skip_all, fields(total = urls.len(), limit = limit))]
    pub async fn gather(&self, urls: Vec<String>, limit: usize) -> Vec<DetailedPost> {
        let limit = if limit == 0 {
            warn!("Concurrency limit of 0 requested; using 1");
            1
        } else {
            limit
        };

        let total = urls.len();
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut in_flight = urls
            .into_iter()
            .enumerate()
            .map(|(idx, url)| {
                let semaphore = Arc::clone(&semaphore);
                let client = &self.client;
                async move {
                    // never closed
                    let _permit = semaphore.acquire().await.ok();
                    debug!(idx = idx + 1, total, %url, "Fetching");
                    fetch_post_details(client, &url).await
                }
            })
            .collect::<FuturesUnordered<_>>();

        let mut posts = Vec::with_capacity(total);
        while let Some(post) = in_flight.next().await {
            posts.push(post);
        }

        let failed = posts.iter().filter(|p| p.is_error()).count();
        info!(total, failed, "Gathered post details");
        posts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{Html, IntoResponse};
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
        served: AtomicUsize,
    }

    async fn post_page(
        State(gauge): State<Arc<Gauge>>,
        Path(id): Path<u32>,
        headers: HeaderMap,
    ) -> impl IntoResponse {
        let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        gauge.current.fetch_sub(1, Ordering::SeqCst);
        gauge.served.fetch_add(1, Ordering::SeqCst);

        if id % 7 == 0 {
            return (StatusCode::NOT_FOUND, Html(String::new())).into_response();
        }
        let agent = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Html(format!(
            r#"<h1 class="content-title">Post {id}</h1>
               <article class="content__blocks"><p>{agent}</p></article>"#
        ))
        .into_response()
    }

    async fn spawn_server() -> (String, Arc<Gauge>) {
        let gauge = Arc::new(Gauge::default());
        let app = Router::new()
            .route("/money/{id}", get(post_page))
            .with_state(Arc::clone(&gauge));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), gauge)
    }

    async fn unreachable_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/money/1")
    }

    fn gatherer(limit: usize) -> DetailGatherer {
        DetailGatherer::new(Duration::from_secs(10), limit).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_parses_post_and_sends_user_agent() {
        let (base, _) = spawn_server().await;
        let url = format!("{base}/money/1");
        let post = fetch_post_details(&gatherer(1).client, &url).await;

        assert_eq!(post.link, url);
        assert_eq!(post.title.as_deref(), Some("Post 1"));
        assert_eq!(post.text.as_deref(), Some(BROWSER_USER_AGENT));
        assert!(post.error.is_none());
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_error_tagged() {
        let (base, _) = spawn_server().await;
        let url = format!("{base}/money/7");
        let post = fetch_post_details(&gatherer(1).client, &url).await;

        assert_eq!(post.link, url);
        assert!(post.text.is_none());
        let error = post.error.unwrap();
        assert!(error.starts_with("Request failed:"));
        assert!(error.contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_error_tagged() {
        let url = unreachable_url().await;
        let post = fetch_post_details(&gatherer(1).client, &url).await;

        assert_eq!(post.link, url);
        assert!(post.error.is_some());
        assert!(post.title.is_none());
        assert!(post.text.is_none());
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_error_tagged() {
        let (base, _) = spawn_server().await;
        let short = DetailGatherer::new(Duration::from_millis(1), 1).unwrap();
        let url = format!("{base}/money/2");
        let post = fetch_post_details(&short.client, &url).await;
        assert!(post.error.is_some());
        assert!(post.text.is_none());
    }

    #[tokio::test]
    async fn test_gather_respects_limit_and_returns_every_url() {
        let (base, gauge) = spawn_server().await;
        let urls: Vec<String> = (1..=250).map(|i| format!("{base}/money/{i}")).collect();

        let posts = gatherer(100).gather(urls.clone(), 100).await;

        assert_eq!(posts.len(), 250);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 100);
        assert_eq!(gauge.served.load(Ordering::SeqCst), 250);

        let links: HashSet<&str> = posts.iter().map(|p| p.link.as_str()).collect();
        let expected: HashSet<&str> = urls.iter().map(String::as_str).collect();
        assert_eq!(links, expected);

        for post in &posts {
            assert_ne!(post.text.is_some(), post.error.is_some());
        }
        let failed = posts.iter().filter(|p| p.is_error()).count();
        assert_eq!(failed, 250 / 7);
    }

    #[tokio::test]
    async fn test_gather_small_limit_is_never_exceeded() {
        let (base, gauge) = spawn_server().await;
        let urls: Vec<String> = (1..=30).map(|i| format!("{base}/money/{i}")).collect();

        let posts = gatherer(3).gather_all(urls).await;

        assert_eq!(posts.len(), 30);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 3, "peak was {peak}");
    }

    #[tokio::test]
    async fn test_gather_one_bad_link_does_not_affect_others() {
        let (base, _) = spawn_server().await;
        let bad = unreachable_url().await;
        let urls = vec![format!("{base}/money/1"), bad.clone(), format!("{base}/money/2")];

        let posts = gatherer(2).gather_all(urls).await;

        assert_eq!(posts.len(), 3);
        let bad_post = posts.iter().find(|p| p.link == bad).unwrap();
        assert!(bad_post.is_error());
        assert_eq!(posts.iter().filter(|p| !p.is_error()).count(), 2);
    }

    #[tokio::test]
    async fn test_gather_zero_limit_is_clamped() {
        let (base, _) = spawn_server().await;
        let posts = gatherer(1)
            .gather(vec![format!("{base}/money/1")], 0)
            .await;
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn test_gather_empty_input() {
        let posts = gatherer(DEFAULT_MAX_CONCURRENT).gather_all(Vec::new()).await;
        assert!(posts.is_empty());
    }
}
