//! API route configuration.

use crate::api::handlers::{
    delete_user_urls_handler, shorten_batch_handler, shorten_handler, user_urls_handler,
};
use crate::api::middleware::user_id;
use crate::state::AppState;
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

/// JSON API routes, mounted under `/api`.
///
/// # Endpoints
///
/// - `POST   /shorten`       - Shorten one URL
/// - `POST   /shorten/batch` - Shorten a batch of URLs atomically
/// - `GET    /user/urls`     - List the caller's links (valid identity required)
/// - `DELETE /user/urls`     - Queue the caller's links for deletion
pub fn api_routes(state: AppState) -> Router<AppState> {
    let owner_listing = Router::new()
        .route("/user/urls", get(user_urls_handler))
        .route_layer(middleware::from_fn_with_state(state, user_id::require_valid));

    Router::new()
        .route("/shorten", post(shorten_handler))
        .route("/shorten/batch", post(shorten_batch_handler))
        .route("/user/urls", delete(delete_user_urls_handler))
        .merge(owner_listing)
}
