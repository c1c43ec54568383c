//! PostgreSQL storage backend.
//!
//! Key allocation inserts the row directly: `ON CONFLICT (url_key) DO NOTHING`
//! turns a key collision into zero affected rows, which the allocator treats
//! as an occupied key. A violation of `urls_original_url_unique` means the URL
//! is already stored; the existing key is read back after the failed write.
//!
//! `save_batch` runs every insert on one transaction and rolls back on the
//! first error.
//!
//! Queries are checked at runtime so the crate builds without a database.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::{Connection, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::entities::{BatchRequestItem, BatchResponseItem, KeyOriginalUrlItem, UrlItem};
use crate::domain::key_allocator::{KeyAllocator, KeyStoreConfig, Occupancy, OccupancyCheck};
use crate::domain::repositories::UrlStore;
use crate::error::{StoreError, StoreResult};

/// Name of the unique constraint on `urls.original_url`.
pub const ORIGINAL_URL_CONSTRAINT: &str = "urls_original_url_unique";

const INSERT_URL: &str = r#"
    INSERT INTO urls (url_key, original_url, user_id)
    VALUES ($1, $2, $3)
    ON CONFLICT (url_key) DO NOTHING
"#;

fn is_original_url_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db| {
        db.is_unique_violation() && db.constraint() == Some(ORIGINAL_URL_CONSTRAINT)
    })
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StoreError::InvalidData(message),
        _ => StoreError::Query(message),
    }
}

/// Claims a key by inserting the row on the given connection.
struct InsertOccupancy<'c> {
    conn: &'c mut PgConnection,
    owner_id: Uuid,
}

#[async_trait]
impl<'c> OccupancyCheck for InsertOccupancy<'c> {
    async fn check(&mut self, key: &str, value: &str) -> StoreResult<Occupancy> {
        let result = sqlx::query(INSERT_URL)
            .bind(key)
            .bind(value)
            .bind(self.owner_id)
            .execute(&mut *self.conn)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(Occupancy::Occupied),
            Ok(_) => Ok(Occupancy::Free),
            Err(err) if is_original_url_violation(&err) => Err(StoreError::DuplicateUrl {
                key: String::new(),
                url: value.to_string(),
            }),
            Err(err) => Err(map_sqlx_error(err)),
        }
    }
}

/// `UrlStore` over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgUrlStore {
    pool: PgPool,
    allocator: KeyAllocator,
}

impl PgUrlStore {
    pub fn new(pool: PgPool, key_config: KeyStoreConfig) -> Self {
        Self {
            pool,
            allocator: KeyAllocator::new(key_config),
        }
    }

    /// Opens a pool against `dsn`.
    pub async fn connect(
        dsn: &str,
        max_connections: u32,
        acquire_timeout: Duration,
        key_config: KeyStoreConfig,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(dsn)
            .await
            .map_err(map_sqlx_error)?;

        info!("Connected to PostgreSQL");
        Ok(Self::new(pool, key_config))
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn existing_key(&self, value: &str) -> StoreResult<Option<String>> {
        let row = sqlx::query("SELECT url_key FROM urls WHERE original_url = $1")
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| row.try_get::<String, _>("url_key").map_err(map_sqlx_error))
            .transpose()
    }

    /// Fills the existing key into a duplicate error coming from an insert.
    async fn resolve_duplicate(&self, err: StoreError) -> StoreError {
        let StoreError::DuplicateUrl { url, .. } = err else {
            return err;
        };

        match self.existing_key(&url).await {
            Ok(Some(key)) => StoreError::DuplicateUrl { key, url },
            Ok(None) => StoreError::Query(format!("URL {url} conflicts with an uncommitted row")),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl UrlStore for PgUrlStore {
    async fn load(&self, key: &str) -> StoreResult<Option<UrlItem>> {
        let row = sqlx::query(
            r#"
            SELECT url_key, original_url, user_id, is_deleted
            FROM urls
            WHERE url_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(UrlItem {
            key: row.try_get("url_key").map_err(map_sqlx_error)?,
            original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
            owner_id: row.try_get("user_id").map_err(map_sqlx_error)?,
            is_deleted: row.try_get("is_deleted").map_err(map_sqlx_error)?,
        }))
    }

    async fn load_all_by_user_id(&self, owner_id: Uuid) -> StoreResult<Vec<KeyOriginalUrlItem>> {
        let rows = sqlx::query("SELECT url_key, original_url FROM urls WHERE user_id = $1")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(KeyOriginalUrlItem {
                    key: row.try_get("url_key").map_err(map_sqlx_error)?,
                    original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
                })
            })
            .collect()
    }

    async fn save(&self, value: &str, owner_id: Uuid) -> StoreResult<String> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;

        let result = {
            let mut check = InsertOccupancy {
                conn: &mut *conn,
                owner_id,
            };
            self.allocator.allocate_unique_key(value, &mut check).await
        };
        drop(conn);

        match result {
            Ok(key) => {
                debug!("Stored {} under key {}", value, key);
                Ok(key)
            }
            Err(err) => Err(self.resolve_duplicate(err).await),
        }
    }

    async fn save_batch(
        &self,
        items: &[BatchRequestItem],
        owner_id: Uuid,
    ) -> StoreResult<Vec<BatchResponseItem>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut responses = Vec::with_capacity(items.len());
        let mut failure = None;

        for request in items {
            let mut check = InsertOccupancy {
                conn: &mut *tx,
                owner_id,
            };
            match self
                .allocator
                .allocate_unique_key(&request.original_url, &mut check)
                .await
            {
                Ok(key) => responses.push(BatchResponseItem {
                    correlation_id: request.correlation_id.clone(),
                    key,
                }),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = failure {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Err(self.resolve_duplicate(err).await);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!("Stored batch of {} item(s)", responses.len());
        Ok(responses)
    }

    async fn delete_batch(&self, keys: &[String], owner_id: Uuid) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let done = sqlx::query(
            r#"
            UPDATE urls
            SET is_deleted = TRUE
            WHERE url_key = ANY($1) AND user_id = $2 AND NOT is_deleted
            "#,
        )
        .bind(keys)
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(
            "Soft-deleted {} of {} requested key(s) for {}",
            done.rows_affected(),
            keys.len(),
            owner_id
        );
        Ok(())
    }

    async fn check_availability(&self) -> StoreResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        conn.ping()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn shutdown(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }
}
