//! Storage backends implementing [`crate::domain::repositories::UrlStore`].
//!
//! - [`VolatileStore`] - in-process maps recovered from a [`ColdLog`]
//! - [`PgUrlStore`] - PostgreSQL via SQLx
//!
//! The backend is picked once at startup (see [`crate::server`]).

pub mod cold_log;
pub mod pg_url_store;
pub mod volatile_store;

pub use cold_log::{ColdLog, ColdLogEntry};
pub use pg_url_store::PgUrlStore;
pub use volatile_store::VolatileStore;
