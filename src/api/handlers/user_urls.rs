//! Handlers for the per-user link endpoints.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::dto::user_urls::UserUrlResponseItem;
use crate::api::middleware::user_id::UserId;
use crate::error::AppError;
use crate::state::AppState;

/// Lists the caller's links.
///
/// # Endpoint
///
/// `GET /api/user/urls`
///
/// Answers 200 with the list, or 204 when the caller has no links.
pub async fn user_urls_handler(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Response, AppError> {
    let urls = state.shortener.user_urls(user_id).await?;

    if urls.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<UserUrlResponseItem> = urls.into_iter().map(Into::into).collect();
    Ok(Json(body).into_response())
}

/// Queues the caller's links for deletion.
///
/// # Endpoint
///
/// `DELETE /api/user/urls` with a JSON array of keys.
///
/// Answers 202 once the request is queued; keys the caller does not own are
/// skipped when the deletion runs.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(keys): Json<Vec<String>>,
) -> Result<StatusCode, AppError> {
    state.shortener.delete_urls(keys, user_id).await?;
    Ok(StatusCode::ACCEPTED)
}
