//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    response::Redirect,
};

use crate::domain::audit_event::AuditEvent;
use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short key to its original URL.
///
/// # Endpoint
///
/// `GET /{key}`
///
/// A `Follow` audit event attributed to the link owner is recorded for every
/// successful redirect.
///
/// # Errors
///
/// - 400 Bad Request if the key is unknown
/// - 410 Gone if the link was deleted
pub async fn redirect_handler(
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let item = state.shortener.resolve(&key).await?;

    state
        .record_audit(AuditEvent::follow(item.owner_id, item.original_url.clone()))
        .await;

    Ok(Redirect::temporary(&item.original_url))
}
