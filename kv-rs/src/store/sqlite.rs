//! SQLite-backed store
//!
//! # Write path
//! Every mutation runs in one [`AtomicUnit`]: lock the user's quota row,
//! validate, write objects, adjust `utilised`. Any failure rolls the whole
//! unit back.
//!
//! # Usage
//! ```no_run
//! use kv_rs::config::Config;
//! use kv_rs::store::{KvStore, Object, SqliteStore};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let store = SqliteStore::connect(&config.storage, config.limits).await?;
//!
//! store
//!     .create_object(1, Object::new("greeting", json!({"text": "hi"}), 0))
//!     .await?;
//! let object = store.get_object(1, "greeting").await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::codec::{JsonCodec, ValueCodec};
use crate::config::StorageConfig;
use crate::error::{ErrorKind, Result, StoreError};
use crate::store::batch::{self, PreparedBatch};
use crate::store::types::{
    BatchAccounting, NewUser, Object, Quota, StoreLimits, StoredObject, User,
};
use crate::store::{expiry, objects, quota, KvStore, TxCoordinator};
use crate::validation;

const USER_EXISTS: &str = "user already exists";
const USER_NOT_FOUND: &str = "user not found";
const OBJECT_NOT_FOUND: &str = "object not found";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    tx: TxCoordinator,
    codec: Arc<dyn ValueCodec>,
    limits: StoreLimits,
}

impl SqliteStore {
    /// Open (creating if needed) the database and its tables
    pub async fn connect(config: &StorageConfig, limits: StoreLimits) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let store = Self::new(pool, limits);
        store.init_db().await?;

        info!("Connected to {}", config.database_url);
        Ok(store)
    }

    /// Wrap an existing pool. Tables are not created; call [`init_db`](Self::init_db).
    pub fn new(pool: SqlitePool, limits: StoreLimits) -> Self {
        Self {
            tx: TxCoordinator::new(pool.clone()),
            pool,
            codec: Arc::new(JsonCodec),
            limits,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn limits(&self) -> &StoreLimits {
        &self.limits
    }

    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quotas (
                user_id INTEGER PRIMARY KEY REFERENCES users(id),
                provisioned INTEGER NOT NULL,
                utilised INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS objects (
                user_id INTEGER NOT NULL REFERENCES users(id),
                data_key TEXT NOT NULL,
                data_value BLOB NOT NULL,
                ttl INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, data_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Stored state of an object with no expiry check, stale entries included
    pub async fn get_raw_object(&self, user_id: i64, key: &str) -> Result<Object> {
        let stored = self.fetch_stored(user_id, key).await?;
        self.decode(stored)
    }

    /// Remove `key` if it is still expired as of `now`, crediting its size
    /// back to the quota. Returns whether a row was removed.
    pub async fn purge_expired(&self, user_id: i64, key: &str, now: i64) -> Result<bool> {
        let mut unit = self.tx.begin("expired object deletion").await?;
        let outcome = Self::remove_in_unit(unit.conn(), user_id, key, Some(now)).await;
        let removed = unit.finish(outcome).await?;
        Ok(removed.is_some())
    }

    async fn fetch_stored(&self, user_id: i64, key: &str) -> Result<StoredObject> {
        objects::fetch(&self.pool, user_id, key)
            .await?
            .ok_or_else(|| StoreError::NotFound(OBJECT_NOT_FOUND.to_string()))
    }

    fn decode(&self, stored: StoredObject) -> Result<Object> {
        let value = self.codec.decode(&stored.bytes)?;
        Ok(Object {
            key: stored.key,
            value,
            ttl: stored.ttl,
        })
    }

    async fn insert_user(conn: &mut SqliteConnection, user: &NewUser) -> Result<i64> {
        let result = sqlx::query("INSERT INTO users (name, password, created_at) VALUES (?, ?, ?)")
            .bind(user.name.as_str())
            .bind(user.password_hash.as_str())
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *conn)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    StoreError::Conflict(USER_EXISTS.to_string())
                }
                other => StoreError::from(other),
            })?;

        let id = result.last_insert_rowid();
        quota::create(conn, id, user.provisioned_capacity).await?;

        Ok(id)
    }

    async fn write_object(
        conn: &mut SqliteConnection,
        user_id: i64,
        object: &StoredObject,
        limits: &StoreLimits,
    ) -> Result<()> {
        let current = quota::lock_for_update(conn, user_id).await?;

        let previous = objects::stored_size(conn, user_id, &object.key)
            .await?
            .unwrap_or(0);
        let size = object.size();
        let delta = size - previous;

        // Full new size must fit; only the ledger adjustment is net
        quota::validate_against_quota(&current, size)?;
        quota::validate_value_size(size, limits.max_value_size)?;

        objects::upsert(conn, user_id, object).await?;
        quota::adjust_utilised(conn, user_id, delta).await
    }

    async fn write_batch(
        conn: &mut SqliteConnection,
        user_id: i64,
        prepared: &PreparedBatch,
        limits: &StoreLimits,
    ) -> Result<i64> {
        let current = quota::lock_for_update(conn, user_id).await?;

        let existing = match limits.batch_accounting {
            BatchAccounting::Net => {
                let keys: Vec<&str> = prepared.final_sizes().into_keys().collect();
                objects::stored_sizes(conn, user_id, &keys).await?
            }
            BatchAccounting::Cumulative => HashMap::new(),
        };
        let charge = prepared.charge(&existing, limits.batch_accounting);

        batch::validate(
            charge,
            prepared.size,
            current.remaining(),
            limits.max_batch_size,
        )?;

        objects::upsert_many(conn, user_id, &prepared.rows).await?;
        quota::adjust_utilised(conn, user_id, charge).await?;

        Ok(charge)
    }

    /// Delete a row and credit its size back. With `expired_before`, only a
    /// row that is expired as of that instant is removed.
    async fn remove_in_unit(
        conn: &mut SqliteConnection,
        user_id: i64,
        key: &str,
        expired_before: Option<i64>,
    ) -> Result<Option<i64>> {
        let removed = match expired_before {
            Some(now) => objects::remove_expired(conn, user_id, key, now).await?,
            None => objects::remove(conn, user_id, key).await?,
        };

        if let Some(size) = removed {
            quota::adjust_utilised(conn, user_id, -size).await?;
        }

        Ok(removed)
    }

    fn log_rejection(operation: &str, user_id: i64, err: &StoreError) {
        if err.kind() == ErrorKind::Internal {
            return;
        }
        warn!("Rejected {} for user {}: {}", operation, user_id, err);
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut unit = self.tx.begin("user creation").await?;
        let outcome = Self::insert_user(unit.conn(), &user).await;
        let id = unit.finish(outcome).await?;

        info!("User created: {} (id {})", user.name, id);

        Ok(User {
            id,
            name: user.name,
            password: user.password_hash,
            provisioned_capacity: user.provisioned_capacity,
        })
    }

    async fn get_user(&self, name: &str) -> Result<User> {
        let row: Option<(i64, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT u.id, u.name, u.password, q.provisioned
            FROM users u
            JOIN quotas q ON q.user_id = u.id
            WHERE u.name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, name, password, provisioned_capacity)| User {
            id,
            name,
            password,
            provisioned_capacity,
        })
        .ok_or_else(|| StoreError::NotFound(USER_NOT_FOUND.to_string()))
    }

    async fn get_quota(&self, user_id: i64) -> Result<Quota> {
        quota::get(&self.pool, user_id).await
    }

    async fn create_object(&self, user_id: i64, object: Object) -> Result<()> {
        validation::validate_object(&object, &self.limits, validation::now_unix())?;

        let stored = StoredObject {
            bytes: self.codec.encode(&object.value)?,
            key: object.key,
            ttl: object.ttl,
        };

        let mut unit = self.tx.begin("object creation").await?;
        let outcome = Self::write_object(unit.conn(), user_id, &stored, &self.limits).await;
        if let Err(ref e) = outcome {
            Self::log_rejection(unit.operation(), user_id, e);
        }
        unit.finish(outcome).await?;

        debug!(
            "Stored object {} ({} bytes) for user {}",
            stored.key,
            stored.size(),
            user_id
        );
        Ok(())
    }

    async fn get_object(&self, user_id: i64, key: &str) -> Result<Object> {
        let stored = self.fetch_stored(user_id, key).await?;

        let now = validation::now_unix();
        if expiry::is_expired(stored.ttl, now) {
            debug!("Object {} for user {} expired at {}", key, user_id, stored.ttl);
            expiry::dispatch_purge(self.clone(), user_id, key.to_string(), now);
            return Err(StoreError::NotFound(OBJECT_NOT_FOUND.to_string()));
        }

        self.decode(stored)
    }

    async fn delete_object(&self, user_id: i64, key: &str) -> Result<()> {
        let mut unit = self.tx.begin("object deletion").await?;
        let outcome = Self::remove_in_unit(unit.conn(), user_id, key, None).await;
        let removed = unit.finish(outcome).await?;

        if let Some(size) = removed {
            debug!("Deleted object {} ({} bytes) for user {}", key, size, user_id);
        }
        Ok(())
    }

    async fn batch_create_objects(&self, user_id: i64, objects: Vec<Object>) -> Result<()> {
        let prepared = PreparedBatch::prepare(
            self.codec.as_ref(),
            objects,
            &self.limits,
            validation::now_unix(),
        )?;

        if prepared.is_empty() {
            return Ok(());
        }

        let mut unit = self.tx.begin("batch object creation").await?;
        let outcome = Self::write_batch(unit.conn(), user_id, &prepared, &self.limits).await;
        if let Err(ref e) = outcome {
            Self::log_rejection(unit.operation(), user_id, e);
        }
        let charge = unit.finish(outcome).await?;

        debug!(
            "Stored batch of {} objects ({} bytes, charged {}) for user {}",
            prepared.rows.len(),
            prepared.size,
            charge,
            user_id
        );
        Ok(())
    }
}
