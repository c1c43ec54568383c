//! Handlers for the shortening endpoints.

use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::api::dto::shorten::{
    BatchShortenRequestItem, BatchShortenResponseItem, ShortenRequest, ShortenResponse,
};
use crate::api::middleware::user_id::UserId;
use crate::application::services::ShortenOutcome;
use crate::domain::audit_event::AuditEvent;
use crate::domain::entities::BatchRequestItem;
use crate::error::AppError;
use crate::state::AppState;

fn outcome_status(outcome: &ShortenOutcome) -> StatusCode {
    if outcome.duplicate {
        StatusCode::CONFLICT
    } else {
        StatusCode::CREATED
    }
}

/// Shortens a URL sent as a plain-text body.
///
/// # Endpoint
///
/// `POST /`
///
/// Answers 201 with the short link as text, or 409 with the existing link
/// when the URL was shortened before.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let url = body.trim();
    if url.is_empty() {
        return Err(AppError::bad_request(
            "Request body must contain a URL",
            json!({}),
        ));
    }

    let outcome = state.shortener.shorten(url, user_id).await?;
    if !outcome.duplicate {
        state.record_audit(AuditEvent::shorten(user_id, url)).await;
    }

    Ok((
        outcome_status(&outcome),
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        outcome.short_url,
    ))
}

/// Shortens a URL sent as JSON.
///
/// # Endpoint
///
/// `POST /api/shorten`
///
/// # Request Body
///
/// ```json
/// { "url": "https://example.com" }
/// ```
///
/// # Response
///
/// ```json
/// { "result": "http://localhost:8080/abcDEFgh" }
/// ```
///
/// 201 for a new link, 409 with the existing link for a duplicate.
pub async fn shorten_handler(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(payload): Json<ShortenRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let outcome = state.shortener.shorten(&payload.url, user_id).await?;
    if !outcome.duplicate {
        state
            .record_audit(AuditEvent::shorten(user_id, payload.url))
            .await;
    }

    Ok((
        outcome_status(&outcome),
        Json(ShortenResponse {
            result: outcome.short_url,
        }),
    ))
}

/// Shortens a batch of URLs atomically.
///
/// # Endpoint
///
/// `POST /api/shorten/batch`
///
/// # Request Body
///
/// ```json
/// [{ "correlation_id": "1", "original_url": "https://example.com" }]
/// ```
///
/// # Response
///
/// ```json
/// [{ "correlation_id": "1", "short_url": "http://localhost:8080/abcDEFgh" }]
/// ```
///
/// # Errors
///
/// - 400 Bad Request if any item is invalid
/// - 409 Conflict if any URL is already stored; nothing is saved
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(payload): Json<Vec<BatchShortenRequestItem>>,
) -> Result<impl IntoResponse, AppError> {
    for item in &payload {
        item.validate()?;
    }

    let items: Vec<BatchRequestItem> = payload.into_iter().map(Into::into).collect();
    let results = state.shortener.shorten_batch(items, user_id).await?;

    let body: Vec<BatchShortenResponseItem> = results.into_iter().map(Into::into).collect();
    Ok((StatusCode::CREATED, Json(body)))
}
