//! Domain layer: entities, storage contracts and background pipelines.
//!
//! - [`entities`] - core data structures
//! - [`repositories`] - storage and audit sink traits implemented by infrastructure
//! - [`key_allocator`] - collision-avoiding short key generation
//! - [`audit_event`] - audit event model
//! - [`deletion_worker`] - deferred batch soft-deletion
//! - [`audit_worker`] - fan-out of audit events to every sink
//!
//! # Request side effects
//!
//! 1. A delete request is queued on [`deletion_worker::DeletionQueue`] and
//!    applied on the next flush
//! 2. Shorten and redirect handlers push an [`audit_event::AuditEvent`] onto
//!    [`audit_worker::AuditQueue`]; workers hand it to every
//!    [`repositories::AuditSink`]

pub mod audit_event;
pub mod audit_worker;
pub mod deletion_worker;
pub mod entities;
pub mod key_allocator;
pub mod repositories;
