#![allow(dead_code)]

use axum_test::TestServer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use link_shortener::application::services::{IdentityService, ShortenerService};
use link_shortener::domain::audit_worker::{AuditWorker, AuditWorkerConfig};
use link_shortener::domain::deletion_worker::{DeletionWorker, DeletionWorkerConfig};
use link_shortener::domain::key_allocator::KeyStoreConfig;
use link_shortener::domain::repositories::AuditSink;
use link_shortener::infrastructure::audit::FileAuditSink;
use link_shortener::infrastructure::persistence::VolatileStore;
use link_shortener::routes::router;
use link_shortener::state::AppState;
use tempfile::TempDir;
use uuid::Uuid;

pub const BASE_URL: &str = "http://sho.rt";
pub const TOKEN_SECRET: &str = "test-signing-secret";

/// Full router over an in-memory store living in a temporary directory.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub store: Arc<VolatileStore>,
    pub audit_path: PathBuf,
    pub log_path: PathBuf,
    pub audit: AuditWorker,
    pub deletion: DeletionWorker,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("urls.jsonl");
        let audit_path = dir.path().join("audit.jsonl");

        let store = Arc::new(VolatileStore::open(&log_path, KeyStoreConfig::default()).unwrap());

        let sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(FileAuditSink::open(&audit_path).unwrap())];
        let audit = AuditWorker::start(
            sinks,
            AuditWorkerConfig {
                worker_count: 2,
                queue_capacity: 64,
            },
        );
        let deletion = DeletionWorker::start(
            store.clone(),
            DeletionWorkerConfig {
                flush_interval: Duration::from_millis(20),
                concurrency: 2,
                queue_capacity: 16,
            },
        );

        let shortener = Arc::new(ShortenerService::new(
            store.clone(),
            deletion.queue(),
            BASE_URL,
        ));
        let identity = Arc::new(IdentityService::new(TOKEN_SECRET, 3600));
        let state = AppState::new(shortener, identity, audit.queue());

        let server = TestServer::new(router(state.clone())).unwrap();

        Self {
            server,
            state,
            store,
            audit_path,
            log_path,
            audit,
            deletion,
            dir,
        }
    }

    /// `Cookie` header value carrying a valid identity for `user_id`.
    pub fn cookie_for(&self, user_id: Uuid) -> String {
        let token = self.state.identity.issue(user_id).unwrap();
        format!("X-UserID={token}")
    }

    /// Key part of a short URL returned by the service.
    pub fn key_of(short_url: &str) -> String {
        short_url
            .strip_prefix(&format!("{BASE_URL}/"))
            .unwrap()
            .to_string()
    }

    /// Polls the audit file until it holds at least `count` events.
    pub async fn audit_events(&self, count: usize) -> Vec<serde_json::Value> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let content = std::fs::read_to_string(&self.audit_path).unwrap_or_default();
            let events: Vec<serde_json::Value> = content
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect();
            if events.len() >= count || tokio::time::Instant::now() >= deadline {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn shutdown(self) {
        self.audit.shutdown().await;
        self.deletion.shutdown().await;
    }
}
