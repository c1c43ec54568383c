//! Shared application state injected into handlers and middleware.

use std::sync::Arc;

use tracing::warn;

use crate::application::services::{IdentityService, ShortenerService};
use crate::domain::audit_event::AuditEvent;
use crate::domain::audit_worker::AuditQueue;

#[derive(Clone)]
pub struct AppState {
    pub shortener: Arc<ShortenerService>,
    pub identity: Arc<IdentityService>,
    pub audit: AuditQueue,
}

impl AppState {
    pub fn new(
        shortener: Arc<ShortenerService>,
        identity: Arc<IdentityService>,
        audit: AuditQueue,
    ) -> Self {
        Self {
            shortener,
            identity,
            audit,
        }
    }

    /// Hands an event to the audit workers. Failures never reach the caller.
    pub async fn record_audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(event).await {
            warn!("Audit event dropped: {}", e);
        }
    }
}
