//! Application layer services.
//!
//! Services sit between the HTTP handlers and the domain. They validate
//! input, call the storage engine and translate storage outcomes into
//! [`crate::error::AppError`].
//!
//! - [`services::ShortenerService`] - shortening, lookup, per-user listing and deletion
//! - [`services::IdentityService`] - signed user identity tokens

pub mod services;
