//! HTTP adapter: `POST /api/analyze`, `GET /health` and the static front end.

pub mod rate_limit;
pub mod routes;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::response::Html;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::analyze::Analyzer;
use rate_limit::RateLimitStore;

const PLACEHOLDER_PAGE: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>roastmysite-app</title></head>
  <body>
    <h1>roastmysite-app</h1>
    <p>web assets not found. Put the front end (with an <code>index.html</code>) into <code>public</code> or pass <code>--web-dir</code>.</p>
  </body>
</html>
"#;

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub rate_limiter: Arc<dyn RateLimitStore>,
}

impl AppState {
    pub fn new(analyzer: Analyzer, rate_limiter: Arc<dyn RateLimitStore>) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            rate_limiter,
        }
    }
}

/// Builds the full application router. Rate limiting covers every route,
/// static assets included.
pub fn router(state: AppState, web_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/api/analyze", post(routes::analyze))
        .route("/health", get(routes::health));

    let web_index = web_dir.map(|dir| (dir, dir.join("index.html")));
    match web_index {
        Some((dir, index)) if index.exists() => {
            tracing::debug!(web_dir = %dir.display(), "serving static assets");
            let static_files = ServeDir::new(dir).not_found_service(ServeFile::new(index));
            app = app.fallback_service(static_files);
        }
        _ => {
            app = app.fallback(|| async { Html(PLACEHOLDER_PAGE) });
        }
    }

    app.layer(middleware::from_fn_with_state(
        state.clone(),
        routes::rate_limit,
    ))
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
