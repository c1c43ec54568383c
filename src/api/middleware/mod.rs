//! HTTP middleware for request processing.
//!
//! Provides user identity resolution and request tracing.

pub mod tracing;
pub mod user_id;
