//! Quota-enforced object store
//!
//! This module provides the transactional core of the service:
//! - Per-user byte quotas kept consistent with stored values
//! - Single-object and batch writes with REPLACE semantics
//! - Lazy TTL expiry on read

pub mod batch;
pub mod expiry;
pub mod objects;
pub mod quota;
pub mod sqlite;
pub mod tx;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use sqlite::SqliteStore;
pub use tx::{AtomicUnit, TxCoordinator};
pub use types::{BatchAccounting, NewUser, Object, Quota, StoreLimits, StoredObject, User};

/// Operations offered to the HTTP and auth layers. `user_id` is trusted:
/// it comes from an authenticated session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Create a user and its quota row. Duplicate names fail with `Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn get_user(&self, name: &str) -> Result<User>;

    async fn get_quota(&self, user_id: i64) -> Result<Quota>;

    /// Create or overwrite a single object, charging the net size change.
    async fn create_object(&self, user_id: i64, object: Object) -> Result<()>;

    /// Read an object. Expired objects are reported as `NotFound` and removed
    /// in the background.
    async fn get_object(&self, user_id: i64, key: &str) -> Result<Object>;

    /// Delete an object. Succeeds whether or not the key exists.
    async fn delete_object(&self, user_id: i64, key: &str) -> Result<()>;

    /// Write every object or none of them.
    async fn batch_create_objects(&self, user_id: i64, objects: Vec<Object>) -> Result<()>;
}
