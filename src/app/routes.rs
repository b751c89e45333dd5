use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::AppState;
use super::rate_limit::RateDecision;

pub const URL_REQUIRED_MESSAGE: &str = "URL is required";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

const UNKNOWN_CALLER: &str = "unknown";

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub url: Option<serde_json::Value>,
}

impl AnalyzeRequest {
    /// The candidate URL as text. Non-string JSON values are passed on in
    /// their JSON form so they fail validation as malformed, not missing.
    pub fn raw_url(&self) -> String {
        match &self.url {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(url)) => url.clone(),
            Some(other) => other.to_string(),
        }
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let url = match payload {
        Ok(Json(request)) => request.raw_url(),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected analyze body");
            return error_response(StatusCode::BAD_REQUEST, URL_REQUIRED_MESSAGE);
        }
    };

    let result = state.analyzer.analyze(&url).await;
    (result.status(), Json(result)).into_response()
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Sliding-window limit keyed by the peer IP. Requests without connection
/// info (e.g. in-process tests) share one bucket.
pub async fn rate_limit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let key = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CALLER.to_owned());

    match state.rate_limiter.check(&key, Instant::now()).await {
        RateDecision::Allowed { remaining } => {
            tracing::debug!(caller = %key, remaining, "rate limit check");
            next.run(request).await
        }
        RateDecision::Limited { retry_after } => {
            tracing::warn!(caller = %key, retry_after_secs = retry_after.as_secs(), "rate limited");
            let mut response = error_response(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_MESSAGE);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, retry_after_secs(retry_after).into());
            response
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}
