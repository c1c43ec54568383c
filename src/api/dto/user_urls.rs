//! DTOs for the per-user link endpoints.

use serde::{Deserialize, Serialize};

use crate::application::services::UserUrl;

/// One element of the `GET /api/user/urls` response array.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserUrlResponseItem {
    pub short_url: String,
    pub original_url: String,
}

impl From<UserUrl> for UserUrlResponseItem {
    fn from(url: UserUrl) -> Self {
        Self {
            short_url: url.short_url,
            original_url: url.original_url,
        }
    }
}
