//! In-process storage backend with an append-only cold log.
//!
//! All state lives behind one `RwLock`: reads share it, every mutation holds
//! it exclusively for the whole operation (a batch is one critical section).
//! Records reach the cold log before the maps are updated, so a crash can
//! leave an orphan log line but never a mapping without one.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::cold_log::{ColdLog, ColdLogEntry};
use crate::domain::entities::{BatchRequestItem, BatchResponseItem, KeyOriginalUrlItem, UrlItem};
use crate::domain::key_allocator::{KeyAllocator, KeyStoreConfig, Occupancy, OccupancyCheck};
use crate::domain::repositories::UrlStore;
use crate::error::{StoreError, StoreResult};

struct Inner {
    by_key: HashMap<String, UrlItem>,
    by_url: HashMap<String, String>,
    log: ColdLog,
}

impl Inner {
    fn apply(&mut self, item: UrlItem) {
        self.by_url.insert(item.original_url.clone(), item.key.clone());
        self.by_key.insert(item.key.clone(), item);
    }

    fn duplicate_of(&self, value: &str) -> Option<StoreError> {
        self.by_url.get(value).map(|key| StoreError::DuplicateUrl {
            key: key.clone(),
            url: value.to_string(),
        })
    }
}

/// Occupancy over committed keys plus keys already picked in the current
/// critical section. Never mutates; the store commits after allocation.
struct MapOccupancy<'a> {
    committed: &'a HashMap<String, UrlItem>,
    staged: &'a HashSet<String>,
}

#[async_trait]
impl<'a> OccupancyCheck for MapOccupancy<'a> {
    async fn check(&mut self, key: &str, _value: &str) -> StoreResult<Occupancy> {
        if self.committed.contains_key(key) || self.staged.contains(key) {
            Ok(Occupancy::Occupied)
        } else {
            Ok(Occupancy::Free)
        }
    }
}

/// `UrlStore` kept in memory and recovered from its cold log on open.
pub struct VolatileStore {
    allocator: KeyAllocator,
    inner: RwLock<Inner>,
}

impl VolatileStore {
    /// Opens the store, replaying the cold log at `path`.
    ///
    /// # Errors
    ///
    /// [`StoreError::ColdLog`] when the log cannot be read or contains a
    /// malformed record.
    pub fn open(path: impl AsRef<Path>, key_config: KeyStoreConfig) -> StoreResult<Self> {
        let (log, entries) = ColdLog::open(path)?;

        let mut inner = Inner {
            by_key: HashMap::with_capacity(entries.len()),
            by_url: HashMap::with_capacity(entries.len()),
            log,
        };
        for entry in entries {
            inner.apply(entry.into_item());
        }

        info!("Volatile store ready with {} key(s)", inner.by_key.len());

        Ok(Self {
            allocator: KeyAllocator::new(key_config),
            inner: RwLock::new(inner),
        })
    }

    /// Number of stored keys, deleted ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_key.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UrlStore for VolatileStore {
    async fn load(&self, key: &str) -> StoreResult<Option<UrlItem>> {
        Ok(self.inner.read().await.by_key.get(key).cloned())
    }

    async fn load_all_by_user_id(&self, owner_id: Uuid) -> StoreResult<Vec<KeyOriginalUrlItem>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_key
            .values()
            .filter(|item| item.owner_id == owner_id)
            .map(UrlItem::to_key_original_url)
            .collect())
    }

    async fn save(&self, value: &str, owner_id: Uuid) -> StoreResult<String> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        if let Some(err) = inner.duplicate_of(value) {
            return Err(err);
        }

        let staged = HashSet::new();
        let mut check = MapOccupancy {
            committed: &inner.by_key,
            staged: &staged,
        };
        let key = self.allocator.allocate_unique_key(value, &mut check).await?;

        let item = UrlItem::new(key.clone(), value, owner_id);
        inner.log.append(&[ColdLogEntry::from_item(&item)]).await?;
        inner.apply(item);

        debug!("Stored {} under key {}", value, key);
        Ok(key)
    }

    async fn save_batch(
        &self,
        items: &[BatchRequestItem],
        owner_id: Uuid,
    ) -> StoreResult<Vec<BatchResponseItem>> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let mut staged = HashSet::with_capacity(items.len());
        let mut new_items = Vec::with_capacity(items.len());
        let mut responses = Vec::with_capacity(items.len());

        for request in items {
            if let Some(err) = inner.duplicate_of(&request.original_url) {
                return Err(err);
            }

            let mut check = MapOccupancy {
                committed: &inner.by_key,
                staged: &staged,
            };
            let key = self
                .allocator
                .allocate_unique_key(&request.original_url, &mut check)
                .await?;

            staged.insert(key.clone());
            new_items.push(UrlItem::new(key.clone(), request.original_url.clone(), owner_id));
            responses.push(BatchResponseItem {
                correlation_id: request.correlation_id.clone(),
                key,
            });
        }

        let entries: Vec<ColdLogEntry> = new_items.iter().map(ColdLogEntry::from_item).collect();
        inner.log.append(&entries).await?;
        for item in new_items {
            inner.apply(item);
        }

        debug!("Stored batch of {} item(s)", responses.len());
        Ok(responses)
    }

    async fn delete_batch(&self, keys: &[String], owner_id: Uuid) -> StoreResult<()> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let tombstones: Vec<ColdLogEntry> = keys
            .iter()
            .filter_map(|key| inner.by_key.get(key))
            .filter(|item| item.owner_id == owner_id && !item.is_deleted)
            .map(|item| ColdLogEntry {
                is_deleted: true,
                ..ColdLogEntry::from_item(item)
            })
            .collect();

        if tombstones.is_empty() {
            return Ok(());
        }

        inner.log.append(&tombstones).await?;
        for tombstone in &tombstones {
            if let Some(item) = inner.by_key.get_mut(&tombstone.key) {
                item.is_deleted = true;
            }
        }

        debug!(
            "Soft-deleted {} of {} requested key(s) for {}",
            tombstones.len(),
            keys.len(),
            owner_id
        );
        Ok(())
    }

    async fn check_availability(&self) -> StoreResult<()> {
        Ok(())
    }
}
