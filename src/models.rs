//! Data models for scraped posts and batch results.
//!
//! - [`PostSummary`]: a title/link pair scraped from the listing page
//! - [`DetailedPost`]: the outcome of fetching and parsing one post
//! - [`BatchResult`]: one orchestration run, timed
//! - [`ParseResult`], [`TaskStatusResponse`], [`ParseRequest`]: HTTP wire shapes

use serde::{Deserialize, Serialize};

/// A post as it appears on the listing page.
///
/// Produced by the listing collector. Two summaries with the same `link` are
/// the same post.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PostSummary {
    /// Title text of the summary card.
    pub title: String,
    /// Absolute URL of the post.
    pub link: String,
}

/// A fetched post.
///
/// After a fetch attempt exactly one of `text` and `error` is set. `link`
/// always equals the URL that was requested and is the key used to correlate
/// results with their inputs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DetailedPost {
    pub title: Option<String>,
    pub link: String,
    pub text: Option<String>,
    pub error: Option<String>,
}

impl DetailedPost {
    /// A successfully fetched post. `text` may be empty when the page had no
    /// paragraphs.
    pub fn parsed(link: impl Into<String>, title: Option<String>, text: String) -> Self {
        Self {
            title,
            link: link.into(),
            text: Some(text),
            error: None,
        }
    }

    /// A post whose fetch failed.
    pub fn failed(link: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            title: None,
            link: link.into(),
            text: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The result of one orchestration run.
///
/// Built once by the orchestrator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    /// Always equal to `posts.len()`.
    pub parsed_count: usize,
    /// Wall-clock time of the fetch phase, rounded to two decimals.
    pub duration_seconds: f64,
    pub posts: Vec<DetailedPost>,
}

impl BatchResult {
    pub fn new(posts: Vec<DetailedPost>, duration_seconds: f64) -> Self {
        Self {
            parsed_count: posts.len(),
            duration_seconds,
            posts,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0.0)
    }

    /// Number of posts that carry an error instead of text.
    pub fn failed_count(&self) -> usize {
        self.posts.iter().filter(|p| p.is_error()).count()
    }
}

/// Batch metadata as returned over HTTP.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Meta {
    pub parsed: usize,
    pub duration_seconds: f64,
}

/// JSON body of a finished parse: `{meta: {...}, posts: [...]}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParseResult {
    pub meta: Meta,
    pub posts: Vec<DetailedPost>,
}

impl From<BatchResult> for ParseResult {
    fn from(batch: BatchResult) -> Self {
        Self {
            meta: Meta {
                parsed: batch.parsed_count,
                duration_seconds: batch.duration_seconds,
            },
            posts: batch.posts,
        }
    }
}

/// Body of `POST /parser/parse`.
///
/// `count` is signed so that a negative value reaches range validation
/// instead of failing deserialization.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParseRequest {
    pub count: i64,
}

/// Body returned when a background parse is accepted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskAccepted {
    pub task_id: String,
    pub message: String,
}

/// Lifecycle of a background parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Started,
    Success,
    Failure,
}

/// Body of `GET /parser/task/{task_id}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub result: Option<ParseResult>,
}
