//! Audit sinks implementing [`crate::domain::repositories::AuditSink`].
//!
//! - [`FileAuditSink`] - appends one JSON event per line to a local file
//! - [`EndpointAuditSink`] - POSTs each JSON event to a remote endpoint

pub mod endpoint_sink;
pub mod file_sink;

pub use endpoint_sink::EndpointAuditSink;
pub use file_sink::FileAuditSink;
