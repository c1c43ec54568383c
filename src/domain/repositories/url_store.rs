//! Storage engine contract for short URL mappings.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entities::{BatchRequestItem, BatchResponseItem, KeyOriginalUrlItem, UrlItem};
use crate::error::StoreResult;

/// Capability interface implemented by every storage backend.
///
/// The backend is selected once at startup and shared behind an `Arc`.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::VolatileStore`] - in-process map with an append-only cold log
/// - [`crate::infrastructure::persistence::PgUrlStore`] - PostgreSQL
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlStore: Send + Sync {
    /// Looks up a key.
    ///
    /// Returns `Ok(None)` when the key never existed. Soft-deleted items are
    /// returned with `is_deleted = true`.
    async fn load(&self, key: &str) -> StoreResult<Option<UrlItem>>;

    /// Lists every mapping created by `owner_id`, in no particular order.
    async fn load_all_by_user_id(&self, owner_id: Uuid) -> StoreResult<Vec<KeyOriginalUrlItem>>;

    /// Stores `value` under a freshly allocated key.
    ///
    /// # Errors
    ///
    /// - [`crate::error::StoreError::DuplicateUrl`] carrying the existing key when `value`
    ///   is already stored
    /// - [`crate::error::StoreError::KeySpaceExhausted`] when no key could be allocated
    async fn save(&self, value: &str, owner_id: Uuid) -> StoreResult<String>;

    /// Stores every item or none of them.
    ///
    /// Items are checked for duplicates against committed data only, not
    /// against each other.
    async fn save_batch(
        &self,
        items: &[BatchRequestItem],
        owner_id: Uuid,
    ) -> StoreResult<Vec<BatchResponseItem>>;

    /// Soft-deletes the keys owned by `owner_id`.
    ///
    /// Keys that are absent or owned by someone else are skipped silently.
    async fn delete_batch(&self, keys: &[String], owner_id: Uuid) -> StoreResult<()>;

    /// Liveness check.
    async fn check_availability(&self) -> StoreResult<()>;

    /// Releases backend resources. Called once during shutdown.
    async fn shutdown(&self) {}
}
