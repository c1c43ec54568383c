//! Destination contract for audit events.

use async_trait::async_trait;

use crate::domain::audit_event::AuditEvent;
use crate::error::AuditError;

/// A receiver of audit events.
///
/// Each sink is called once per event by an audit worker. A failure is
/// logged by the worker and never retried.
///
/// # Implementations
///
/// - [`crate::infrastructure::audit::FileAuditSink`] - JSON lines file
/// - [`crate::infrastructure::audit::EndpointAuditSink`] - HTTP POST
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}
