//! Stored URL mapping and its projections.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored mapping between a short key and the original URL.
///
/// Items are never physically removed. A soft delete flips `is_deleted`
/// so lookups can tell "gone" apart from "never existed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlItem {
    pub key: String,
    pub original_url: String,
    pub owner_id: Uuid,
    pub is_deleted: bool,
}

impl UrlItem {
    /// Creates a live (not deleted) item.
    pub fn new(key: impl Into<String>, original_url: impl Into<String>, owner_id: Uuid) -> Self {
        Self {
            key: key.into(),
            original_url: original_url.into(),
            owner_id,
            is_deleted: false,
        }
    }

    /// Projection used by per-user listings.
    pub fn to_key_original_url(&self) -> KeyOriginalUrlItem {
        KeyOriginalUrlItem {
            key: self.key.clone(),
            original_url: self.original_url.clone(),
        }
    }
}

/// Key and original URL pair returned by per-user lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOriginalUrlItem {
    pub key: String,
    pub original_url: String,
}

/// One URL of a batch save, correlated by a caller-chosen id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequestItem {
    pub correlation_id: String,
    pub original_url: String,
}

/// Result of one [`BatchRequestItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResponseItem {
    pub correlation_id: String,
    pub key: String,
}
