//! HTTP surface: `GET /rss` serves the merged feed, `GET /health` reports liveness.

use crate::feed::PairFetchError;
use crate::merge::{merge_feeds, MergeError, MergeSettings};
use axum::extract::State;
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Number of matched items left out of the feed because they failed validation.
pub const REJECTED_ITEMS_HEADER: HeaderName = HeaderName::from_static("x-rejected-items");

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<MergeSettings>,
    pub client: reqwest::Client,
}

impl AppState {
    /// Builds the shared HTTP client used for all upstream fetches.
    pub fn new(settings: MergeSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rss-merger/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            settings: Arc::new(settings),
            client,
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/rss", get(serve_rss))
        .route("/health", get(health_check))
        .with_state(state)
}

/// GET /rss
///
/// Runs one merge against the configured feeds. The body is the feed document
/// on success and a one-line diagnostic otherwise.
async fn serve_rss(State(state): State<AppState>) -> Result<Response, AppError> {
    let merged = merge_feeds(&state.client, &state.settings).await?;

    Ok((
        [(REJECTED_ITEMS_HEADER, merged.rejected.len().to_string())],
        merged.document,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "rss-merger".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Maps merge failures onto HTTP status codes, keeping the diagnostic text as body.
#[derive(Debug)]
pub struct AppError(MergeError);

impl From<MergeError> for AppError {
    fn from(e: MergeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MergeError::Fetch(PairFetchError::Deadline(_)) => StatusCode::GATEWAY_TIMEOUT,
            MergeError::Fetch(PairFetchError::Feed { .. }) => StatusCode::BAD_GATEWAY,
            MergeError::Compose(_) => StatusCode::BAD_GATEWAY,
            MergeError::Write(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(status = %status, error = %self.0, "Failed to serve merged feed");
        (status, self.0.to_string()).into_response()
    }
}
