//! Core domain entities.
//!
//! - [`UrlItem`] - a stored short key to URL mapping
//! - [`KeyOriginalUrlItem`] - per-user listing projection
//! - [`BatchRequestItem`] / [`BatchResponseItem`] - correlation pair of one batch save
//! - [`DeleteRequest`] - soft-delete work item for the deletion worker

pub mod delete_request;
pub mod url_item;

pub use delete_request::DeleteRequest;
pub use url_item::{BatchRequestItem, BatchResponseItem, KeyOriginalUrlItem, UrlItem};
