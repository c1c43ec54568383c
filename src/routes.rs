//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `POST /`       - Shorten a URL sent as plain text
//! - `GET  /{key}`  - Short link redirect
//! - `GET  /ping`   - Storage liveness check
//! - `/api/*`       - JSON API
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **User identity** - `X-UserID` cookie on every route except `/ping`
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::{ping_handler, redirect_handler, shorten_text_handler};
use crate::api::middleware::{tracing, user_id};
use crate::state::AppState;
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// All routes with state and middleware applied, without path normalization.
pub fn router(state: AppState) -> Router {
    let identified = Router::new()
        .route("/", post(shorten_text_handler))
        .route("/{key}", get(redirect_handler))
        .nest("/api", api::routes::api_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state.clone(), user_id::layer));

    Router::new()
        .route("/ping", get(ping_handler))
        .merge(identified)
        .with_state(state)
        .layer(tracing::layer())
}
