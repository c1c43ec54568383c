//! Capability traits implemented by the infrastructure layer.
//!
//! - [`UrlStore`] - short URL storage engine
//! - [`AuditSink`] - audit event destination
//!
//! Mock implementations are generated via `mockall` for unit tests.

pub mod audit_sink;
pub mod url_store;

pub use audit_sink::AuditSink;
pub use url_store::UrlStore;

#[cfg(test)]
pub use audit_sink::MockAuditSink;
#[cfg(test)]
pub use url_store::MockUrlStore;
