//! DTOs for the shortening endpoints.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::application::services::BatchShortenResult;
use crate::domain::entities::BatchRequestItem;

/// `POST /api/shorten` request body.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenRequest {
    #[validate(url(message = "Invalid URL format"))]
    pub url: String,
}

/// `POST /api/shorten` response body (201 and 409 alike).
#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub result: String,
}

/// One element of the `POST /api/shorten/batch` request array.
#[derive(Debug, Deserialize, Validate)]
pub struct BatchShortenRequestItem {
    #[validate(length(min = 1, message = "correlation_id must not be empty"))]
    pub correlation_id: String,

    #[validate(url(message = "Invalid URL format"))]
    pub original_url: String,
}

impl From<BatchShortenRequestItem> for BatchRequestItem {
    fn from(item: BatchShortenRequestItem) -> Self {
        Self {
            correlation_id: item.correlation_id,
            original_url: item.original_url,
        }
    }
}

/// One element of the `POST /api/shorten/batch` response array.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchShortenResponseItem {
    pub correlation_id: String,
    pub short_url: String,
}

impl From<BatchShortenResult> for BatchShortenResponseItem {
    fn from(result: BatchShortenResult) -> Self {
        Self {
            correlation_id: result.correlation_id,
            short_url: result.short_url,
        }
    }
}
