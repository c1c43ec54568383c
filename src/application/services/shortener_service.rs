//! Shortening, lookup, listing and deletion of short links.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::domain::deletion_worker::DeletionQueue;
use crate::domain::entities::{BatchRequestItem, DeleteRequest, UrlItem};
use crate::domain::repositories::UrlStore;
use crate::error::{AppError, StoreError};

/// Result of a single shortening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenOutcome {
    pub short_url: String,
    /// The URL was already stored; `short_url` points at the existing key.
    pub duplicate: bool,
}

/// One batch item result, correlated by the caller's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchShortenResult {
    pub correlation_id: String,
    pub short_url: String,
}

/// A link owned by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUrl {
    pub short_url: String,
    pub original_url: String,
}

/// Request-facing facade over the storage engine and the deletion queue.
///
/// The store is chosen at startup, so it is held as a trait object.
pub struct ShortenerService {
    store: Arc<dyn UrlStore>,
    deletions: DeletionQueue,
    base_url: String,
}

impl ShortenerService {
    pub fn new(store: Arc<dyn UrlStore>, deletions: DeletionQueue, base_url: &str) -> Self {
        Self {
            store,
            deletions,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Builds the public link for `key`.
    pub fn short_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Shortens `original_url` for `owner_id`.
    ///
    /// A URL that is already stored is not an error: the outcome carries the
    /// existing link with `duplicate` set.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if the URL is not an absolute http(s) URL
    /// - storage failures mapped through `From<StoreError>`
    pub async fn shorten(
        &self,
        original_url: &str,
        owner_id: Uuid,
    ) -> Result<ShortenOutcome, AppError> {
        validate_url(original_url)?;

        match self.store.save(original_url, owner_id).await {
            Ok(key) => Ok(ShortenOutcome {
                short_url: self.short_url(&key),
                duplicate: false,
            }),
            Err(StoreError::DuplicateUrl { key, .. }) => {
                debug!("Duplicate URL {} resolved to key {}", original_url, key);
                Ok(ShortenOutcome {
                    short_url: self.short_url(&key),
                    duplicate: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Shortens every item atomically.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] naming the first invalid item
    /// - [`AppError::Conflict`] if any URL is already stored (nothing is saved)
    pub async fn shorten_batch(
        &self,
        items: Vec<BatchRequestItem>,
        owner_id: Uuid,
    ) -> Result<Vec<BatchShortenResult>, AppError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        for item in &items {
            validate_url(&item.original_url).map_err(|_| {
                AppError::bad_request(
                    "Invalid URL in batch",
                    json!({
                        "correlation_id": item.correlation_id,
                        "url": item.original_url,
                    }),
                )
            })?;
        }

        let saved = self.store.save_batch(&items, owner_id).await?;

        Ok(saved
            .into_iter()
            .map(|item| BatchShortenResult {
                short_url: self.short_url(&item.key),
                correlation_id: item.correlation_id,
            })
            .collect())
    }

    /// Looks up a key for redirection.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] when the key is unknown
    /// - [`AppError::Gone`] when the key was deleted
    pub async fn resolve(&self, key: &str) -> Result<UrlItem, AppError> {
        let item = self.store.load(key).await?.ok_or_else(|| {
            AppError::bad_request("Unknown short key", json!({ "key": key }))
        })?;

        if item.is_deleted {
            return Err(AppError::gone(
                "Short link was deleted",
                json!({ "key": key }),
            ));
        }

        Ok(item)
    }

    /// Lists every link created by `owner_id`.
    pub async fn user_urls(&self, owner_id: Uuid) -> Result<Vec<UserUrl>, AppError> {
        let items = self.store.load_all_by_user_id(owner_id).await?;

        Ok(items
            .into_iter()
            .map(|item| UserUrl {
                short_url: self.short_url(&item.key),
                original_url: item.original_url,
            })
            .collect())
    }

    /// Queues the keys for soft deletion. Keys the user does not own are
    /// skipped later without notice.
    ///
    /// # Errors
    ///
    /// [`AppError::Unavailable`] if the deletion worker has stopped.
    pub async fn delete_urls(&self, keys: Vec<String>, owner_id: Uuid) -> Result<(), AppError> {
        if keys.is_empty() {
            return Ok(());
        }

        self.deletions
            .delete(DeleteRequest::new(keys, owner_id))
            .await?;
        Ok(())
    }

    /// Liveness of the storage backend.
    pub async fn check_store(&self) -> Result<(), AppError> {
        self.store.check_availability().await?;
        Ok(())
    }
}

/// Accepts absolute `http`/`https` URLs only.
fn validate_url(value: &str) -> Result<(), AppError> {
    let parsed = Url::parse(value).map_err(|e| {
        AppError::bad_request(
            "Invalid URL format",
            json!({ "url": value, "reason": e.to_string() }),
        )
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AppError::bad_request(
            "Unsupported URL scheme",
            json!({ "url": value, "scheme": scheme }),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{BatchResponseItem, KeyOriginalUrlItem};
    use crate::domain::repositories::MockUrlStore;
    use axum::http::StatusCode;

    const BASE: &str = "http://localhost:8080/";

    fn service(store: MockUrlStore) -> ShortenerService {
        let (queue, _rx) = DeletionQueue::detached(4);
        ShortenerService::new(Arc::new(store), queue, BASE)
    }

    #[test]
    fn test_short_url_joins_without_double_slash() {
        let service = service(MockUrlStore::new());
        assert_eq!(service.short_url("abc"), "http://localhost:8080/abc");
    }

    #[tokio::test]
    async fn test_shorten_new_url() {
        let mut store = MockUrlStore::new();
        store
            .expect_save()
            .withf(|value, _| value == "https://example.com")
            .times(1)
            .returning(|_, _| Ok("abcDEFgh".to_string()));

        let outcome = service(store)
            .shorten("https://example.com", Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ShortenOutcome {
                short_url: "http://localhost:8080/abcDEFgh".to_string(),
                duplicate: false,
            }
        );
    }

    #[tokio::test]
    async fn test_shorten_duplicate_returns_existing_link() {
        let mut store = MockUrlStore::new();
        store.expect_save().returning(|value, _| {
            Err(StoreError::DuplicateUrl {
                key: "existing".to_string(),
                url: value.to_string(),
            })
        });

        let outcome = service(store)
            .shorten("https://example.com", Uuid::new_v4())
            .await
            .unwrap();

        assert!(outcome.duplicate);
        assert_eq!(outcome.short_url, "http://localhost:8080/existing");
    }

    #[tokio::test]
    async fn test_shorten_rejects_invalid_url() {
        let mut store = MockUrlStore::new();
        store.expect_save().never();

        let service = service(store);

        for bad in ["not a url", "ftp://example.com/file", ""] {
            let err = service.shorten(bad, Uuid::new_v4()).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{bad}");
        }
    }

    #[tokio::test]
    async fn test_shorten_storage_failure() {
        let mut store = MockUrlStore::new();
        store.expect_save().returning(|_, _| {
            Err(StoreError::KeySpaceExhausted {
                initial_length: 1,
                max_length: 2,
            })
        });

        let err = service(store)
            .shorten("https://example.com", Uuid::new_v4())
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_store() {
        let mut store = MockUrlStore::new();
        store.expect_save_batch().never();

        let result = service(store)
            .shorten_batch(Vec::new(), Uuid::new_v4())
            .await
            .unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_batch_maps_keys_to_short_urls() {
        let mut store = MockUrlStore::new();
        store
            .expect_save_batch()
            .withf(|items, _| items.len() == 2)
            .times(1)
            .returning(|items, _| {
                Ok(items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| BatchResponseItem {
                        correlation_id: item.correlation_id.clone(),
                        key: format!("key{i}"),
                    })
                    .collect())
            });

        let result = service(store)
            .shorten_batch(
                vec![
                    BatchRequestItem {
                        correlation_id: "a".to_string(),
                        original_url: "https://a.example".to_string(),
                    },
                    BatchRequestItem {
                        correlation_id: "b".to_string(),
                        original_url: "https://b.example".to_string(),
                    },
                ],
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        assert_eq!(
            result,
            vec![
                BatchShortenResult {
                    correlation_id: "a".to_string(),
                    short_url: "http://localhost:8080/key0".to_string(),
                },
                BatchShortenResult {
                    correlation_id: "b".to_string(),
                    short_url: "http://localhost:8080/key1".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_batch_with_invalid_item_fails_before_store() {
        let mut store = MockUrlStore::new();
        store.expect_save_batch().never();

        let err = service(store)
            .shorten_batch(
                vec![BatchRequestItem {
                    correlation_id: "x".to_string(),
                    original_url: "nope".to_string(),
                }],
                Uuid::new_v4(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_error_info().details["correlation_id"], "x");
    }

    #[tokio::test]
    async fn test_resolve_unknown_deleted_and_live() {
        let owner = Uuid::new_v4();
        let mut store = MockUrlStore::new();
        store.expect_load().returning(move |key| {
            Ok(match key {
                "live" => Some(UrlItem::new("live", "https://example.com", owner)),
                "gone" => Some(UrlItem {
                    is_deleted: true,
                    ..UrlItem::new("gone", "https://example.org", owner)
                }),
                _ => None,
            })
        });

        let service = service(store);

        let item = service.resolve("live").await.unwrap();
        assert_eq!(item.original_url, "https://example.com");

        let err = service.resolve("gone").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::GONE);

        let err = service.resolve("missing").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_user_urls() {
        let owner = Uuid::new_v4();
        let mut store = MockUrlStore::new();
        store
            .expect_load_all_by_user_id()
            .withf(move |id| *id == owner)
            .returning(|_| {
                Ok(vec![KeyOriginalUrlItem {
                    key: "k1".to_string(),
                    original_url: "https://example.com".to_string(),
                }])
            });

        let urls = service(store).user_urls(owner).await.unwrap();

        assert_eq!(
            urls,
            vec![UserUrl {
                short_url: "http://localhost:8080/k1".to_string(),
                original_url: "https://example.com".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_delete_urls_enqueues_request() {
        let (queue, mut rx) = DeletionQueue::detached(4);
        let service = ShortenerService::new(Arc::new(MockUrlStore::new()), queue, BASE);
        let owner = Uuid::new_v4();

        service
            .delete_urls(vec!["a".to_string(), "b".to_string()], owner)
            .await
            .unwrap();
        service.delete_urls(Vec::new(), owner).await.unwrap();

        let request = rx.try_recv().unwrap();
        assert_eq!(request, DeleteRequest::new(vec!["a".to_string(), "b".to_string()], owner));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delete_urls_after_worker_stop() {
        let (queue, rx) = DeletionQueue::detached(1);
        drop(rx);
        let service = ShortenerService::new(Arc::new(MockUrlStore::new()), queue, BASE);

        let err = service
            .delete_urls(vec!["a".to_string()], Uuid::new_v4())
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_check_store_unavailable() {
        let mut store = MockUrlStore::new();
        store
            .expect_check_availability()
            .returning(|| Err(StoreError::Unavailable("refused".to_string())));

        let err = service(store).check_store().await.unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
