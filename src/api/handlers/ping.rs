//! Handler for the storage liveness check.

use axum::{extract::State, http::StatusCode};
use tracing::error;

use crate::state::AppState;

/// Reports whether the storage backend is reachable.
///
/// `GET /ping` answers 200 when the store is available and 500 otherwise.
pub async fn ping_handler(State(state): State<AppState>) -> StatusCode {
    match state.shortener.check_store().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!("Storage liveness check failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::application::services::{IdentityService, ShortenerService};
    use crate::domain::audit_worker::{AuditWorker, AuditWorkerConfig};
    use crate::domain::deletion_worker::DeletionQueue;
    use crate::domain::repositories::MockUrlStore;
    use crate::error::StoreError;

    async fn ping_with(store: MockUrlStore) -> StatusCode {
        let (deletions, _requests) = DeletionQueue::detached(4);
        let audit = AuditWorker::start(Vec::new(), AuditWorkerConfig::default());
        let state = AppState::new(
            Arc::new(ShortenerService::new(
                Arc::new(store),
                deletions,
                "http://localhost:8080/",
            )),
            Arc::new(IdentityService::new("secret", 3600)),
            audit.queue(),
        );

        let status = ping_handler(State(state)).await;
        audit.shutdown().await;
        status
    }

    #[tokio::test]
    async fn test_ping_ok_when_store_available() {
        let mut store = MockUrlStore::new();
        store
            .expect_check_availability()
            .times(1)
            .returning(|| Ok(()));

        assert_eq!(ping_with(store).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ping_fails_when_store_unavailable() {
        let mut store = MockUrlStore::new();
        store
            .expect_check_availability()
            .times(1)
            .returning(|| Err(StoreError::Unavailable("connection refused".to_string())));

        assert_eq!(ping_with(store).await, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
