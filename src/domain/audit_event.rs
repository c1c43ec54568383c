//! Audit event model for asynchronous audit logging.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Kind of user action being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Shorten,
    Follow,
}

/// A domain event fanned out to every registered audit sink.
///
/// Created on the request path and handed to
/// [`crate::domain::audit_worker::AuditWorker`]; serialized as
///
/// ```json
/// {"ts":"1735840800","action":"shorten","user_id":"…","url":"https://example.com"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    #[serde(rename = "ts", serialize_with = "serialize_unix_seconds")]
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    #[serde(rename = "user_id")]
    pub owner_id: Uuid,
    pub url: String,
}

impl AuditEvent {
    /// Creates an event stamped with the current time.
    pub fn new(action: AuditAction, owner_id: Uuid, url: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            owner_id,
            url: url.into(),
        }
    }

    pub fn shorten(owner_id: Uuid, url: impl Into<String>) -> Self {
        Self::new(AuditAction::Shorten, owner_id, url)
    }

    pub fn follow(owner_id: Uuid, url: impl Into<String>) -> Self {
        Self::new(AuditAction::Follow, owner_id, url)
    }
}

fn serialize_unix_seconds<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.timestamp().to_string())
}
