//! Remote audit endpoint reached over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;
use ureq::Agent;

use crate::domain::audit_event::AuditEvent;
use crate::domain::repositories::AuditSink;
use crate::error::AuditError;

const HTTP_TIMEOUT_SECS: u64 = 5;

/// POSTs every event as a JSON body to a fixed URL.
///
/// `ureq` is blocking, so each call runs on the blocking thread pool.
pub struct EndpointAuditSink {
    url: String,
    agent: Agent,
}

impl EndpointAuditSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(HTTP_TIMEOUT_SECS))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            url: url.into(),
            agent,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn post_sync(agent: Agent, url: String, body: serde_json::Value) -> Result<(), AuditError> {
        let response = agent
            .post(&url)
            .send_json(&body)
            .map_err(|e| AuditError::Http(format!("POST {}: {}", url, e)))?;

        trace!("Audit endpoint {} answered {}", url, response.status());
        Ok(())
    }
}

#[async_trait]
impl AuditSink for EndpointAuditSink {
    fn name(&self) -> &'static str {
        "endpoint"
    }

    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let body = serde_json::to_value(event)?;
        let agent = self.agent.clone();
        let url = self.url.clone();

        tokio::task::spawn_blocking(move || Self::post_sync(agent, url, body))
            .await
            .map_err(|e| AuditError::Http(format!("audit request task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use serde_json::Value;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    /// Serves `POST /audit`, forwarding every body and answering `status`.
    async fn audit_endpoint(status: StatusCode) -> (String, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let app = Router::new()
            .route(
                "/audit",
                post(
                    move |State(tx): State<mpsc::UnboundedSender<Value>>, Json(body): Json<Value>| async move {
                        let _ = tx.send(body);
                        status
                    },
                ),
            )
            .with_state(tx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        (format!("http://{addr}/audit"), rx)
    }

    #[tokio::test]
    async fn test_event_is_posted_as_json() {
        let (url, mut rx) = audit_endpoint(StatusCode::OK).await;
        let sink = EndpointAuditSink::new(url);
        let owner = Uuid::new_v4();

        sink.record(&AuditEvent::follow(owner, "https://example.com"))
            .await
            .unwrap();

        let body = rx.recv().await.unwrap();
        assert_eq!(body["action"], "follow");
        assert_eq!(body["user_id"], owner.to_string());
        assert_eq!(body["url"], "https://example.com");
        assert!(body["ts"].is_string());
    }

    #[tokio::test]
    async fn test_error_status_is_a_failure() {
        let (url, mut rx) = audit_endpoint(StatusCode::INTERNAL_SERVER_ERROR).await;
        let sink = EndpointAuditSink::new(url);

        let err = sink
            .record(&AuditEvent::shorten(Uuid::new_v4(), "https://example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuditError::Http(_)));
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink = EndpointAuditSink::with_timeout(
            format!("http://{addr}/audit"),
            Duration::from_secs(1),
        );

        let result = sink
            .record(&AuditEvent::shorten(Uuid::new_v4(), "https://example.com"))
            .await;
        assert!(matches!(result, Err(AuditError::Http(_))));
    }
}
