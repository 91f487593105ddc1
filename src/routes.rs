//! HTTP surface.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /parse?count=N` | Run a parse synchronously and return the result |
//! | `POST /parser/parse` | Start a background parse, returns a task id |
//! | `GET /parser/task/{task_id}` | Poll a background parse |
//! | `GET /health` | Liveness probe |

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{validate_count, ParserError};
use crate::models::{ParseRequest, ParseResult, TaskAccepted, TaskStatusResponse};
use crate::pipeline::Orchestrator;
use crate::scrapers::listing::ListingSource;
use crate::tasks::TaskRunner;

/// `count` used when `GET /parse` is called without one.
pub const DEFAULT_COUNT: u32 = 10;

/// Shared handler state.
pub struct AppState<L> {
    pub orchestrator: Arc<Orchestrator<L>>,
    pub tasks: TaskRunner<L>,
    /// When false the `/parser/*` routes answer 400.
    pub parser_enabled: bool,
}

impl<L> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            tasks: self.tasks.clone(),
            parser_enabled: self.parser_enabled,
        }
    }
}

impl<L> AppState<L>
where
    L: ListingSource + Send + Sync + 'static,
{
    pub fn new(orchestrator: Orchestrator<L>, parser_enabled: bool) -> Self {
        let orchestrator = Arc::new(orchestrator);
        Self {
            tasks: TaskRunner::new(Arc::clone(&orchestrator)),
            orchestrator,
            parser_enabled,
        }
    }

    fn ensure_enabled(&self) -> Result<(), ParserError> {
        if self.parser_enabled {
            Ok(())
        } else {
            Err(ParserError::Disabled)
        }
    }
}

pub fn build_router<L>(state: AppState<L>) -> Router
where
    L: ListingSource + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/parse", get(parse_posts::<L>))
        .route("/parser/parse", post(start_parsing::<L>))
        .route("/parser/task/{task_id}", get(task_status::<L>))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct ParseQuery {
    #[serde(default = "default_count")]
    count: i64,
}

fn default_count() -> i64 {
    DEFAULT_COUNT.into()
}

async fn health() -> &'static str {
    "ok"
}

async fn parse_posts<L>(
    State(state): State<AppState<L>>,
    query: Result<Query<ParseQuery>, QueryRejection>,
) -> Result<Json<ParseResult>, ParserError>
where
    L: ListingSource + Send + Sync + 'static,
{
    let Query(query) = query?;
    let count = validate_count(query.count)?;
    info!(count, "Parse requested");
    let batch = state.orchestrator.run(count as usize).await?;
    Ok(Json(batch.into()))
}

async fn start_parsing<L>(
    State(state): State<AppState<L>>,
    req: Result<Json<ParseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskAccepted>), ParserError>
where
    L: ListingSource + Send + Sync + 'static,
{
    state.ensure_enabled()?;
    let Json(req) = req?;
    let count = validate_count(req.count)?;
    let task_id = state.tasks.submit(count).await;
    Ok((
        StatusCode::OK,
        Json(TaskAccepted {
            task_id: task_id.to_string(),
            message: "Parsing started".to_string(),
        }),
    ))
}

async fn task_status<L>(
    State(state): State<AppState<L>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ParserError>
where
    L: ListingSource + Send + Sync + 'static,
{
    state.ensure_enabled()?;
    Ok(Json(state.tasks.status(&task_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::pipeline::tests::{dead_links, gatherer, FakeListing};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(listing: FakeListing, enabled: bool) -> (Router, AppState<FakeListing>) {
        let state = AppState::new(Orchestrator::new(listing, gatherer()), enabled);
        (build_router(state.clone()), state)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app(FakeListing::default(), true);
        let response = router.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_parse_returns_meta_and_posts() {
        let links = dead_links(2).await;
        let (router, _) = app(FakeListing::with_links(links), true);

        let response = router.oneshot(get_request("/parse?count=2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["meta"]["parsed"], 2);
        assert!(json["meta"]["duration_seconds"].is_f64());
        let posts = json["posts"].as_array().unwrap();
        assert_eq!(posts.len(), 2);
        for post in posts {
            assert!(post["error"].is_string());
            assert!(post["text"].is_null());
            assert!(post["title"].is_null());
        }
    }

    #[tokio::test]
    async fn test_parse_rejects_out_of_range_count_before_work() {
        for uri in ["/parse?count=0", "/parse?count=501"] {
            let (router, state) = app(FakeListing::default(), true);
            let response = router.oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
            let json = body_json(response).await;
            assert!(json["detail"].as_str().unwrap().contains("between 1 and 500"));
            assert_eq!(state.orchestrator.listing().calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_parse_malformed_count_is_json_422() {
        for uri in ["/parse?count=-1", "/parse?count=abc", "/parse?count=99999999999999999999"] {
            let (router, state) = app(FakeListing::default(), true);
            let response = router.oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "application/json",
                "{uri}"
            );
            let json = body_json(response).await;
            assert!(json["detail"].is_string(), "{uri}");
            assert_eq!(state.orchestrator.listing().calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_parse_defaults_count() {
        let (router, state) = app(FakeListing::default(), true);
        let response = router.oneshot(get_request("/parse")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.orchestrator.listing().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parse_listing_failure_is_bad_gateway() {
        let (router, _) = app(FakeListing::failing(), true);
        let response = router.oneshot(get_request("/parse?count=3")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert!(json["detail"].as_str().unwrap().contains("browser"));
    }

    #[tokio::test]
    async fn test_disabled_parser_rejects_task_routes() {
        let (router, _) = app(FakeListing::default(), false);

        let response = router
            .clone()
            .oneshot(post_json("/parser/parse", serde_json::json!({ "count": 3 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["detail"], "Parser functionality is disabled");

        let response = router
            .oneshot(get_request("/parser/task/00000000-0000-0000-0000-000000000000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_task_lifecycle_over_http() {
        let links = dead_links(2).await;
        let (router, _) = app(FakeListing::with_links(links), true);

        let response = router
            .clone()
            .oneshot(post_json("/parser/parse", serde_json::json!({ "count": 2 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let accepted = body_json(response).await;
        assert_eq!(accepted["message"], "Parsing started");
        let task_id = accepted["task_id"].as_str().unwrap().to_string();

        let mut last = serde_json::Value::Null;
        for _ in 0..200 {
            let response = router
                .clone()
                .oneshot(get_request(&format!("/parser/task/{task_id}")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            last = body_json(response).await;
            if last["status"] == serde_json::json!(TaskStatus::Success) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(last["status"], "SUCCESS");
        assert_eq!(last["result"]["meta"]["parsed"], 2);
    }

    #[tokio::test]
    async fn test_task_submit_rejects_bad_count() {
        let bodies = [
            serde_json::json!({ "count": 0 }),
            serde_json::json!({ "count": -1 }),
            serde_json::json!({ "count": "abc" }),
            serde_json::json!({}),
        ];
        for body in bodies {
            let (router, _) = app(FakeListing::default(), true);
            let response = router
                .oneshot(post_json("/parser/parse", body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{body}");
            let json = body_json(response).await;
            assert!(json["detail"].is_string(), "{body}");
        }
    }

    #[tokio::test]
    async fn test_parse_negative_count_reports_range() {
        let (router, _) = app(FakeListing::default(), true);
        let response = router.oneshot(get_request("/parse?count=-1")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["detail"], "count must be between 1 and 500, got -1");
    }

    #[tokio::test]
    async fn test_unknown_task_is_not_found() {
        let (router, _) = app(FakeListing::default(), true);
        let response = router
            .oneshot(get_request("/parser/task/not-a-task"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
