//! Infrastructure layer: concrete implementations of the domain traits.
//!
//! - [`persistence`] - storage backends (in-memory with cold log, PostgreSQL)
//! - [`audit`] - audit sinks (local file, HTTP endpoint)

pub mod audit;
pub mod persistence;
