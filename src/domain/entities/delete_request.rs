//! Pending soft-delete request.

use uuid::Uuid;

/// A request to soft-delete `keys` on behalf of `owner_id`.
///
/// Consumed once by the deletion worker; re-queued while the store keeps
/// failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub keys: Vec<String>,
    pub owner_id: Uuid,
}

impl DeleteRequest {
    pub fn new(keys: Vec<String>, owner_id: Uuid) -> Self {
        Self { keys, owner_id }
    }
}
