use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Largest encoded value accepted on the single-object path (16 KiB)
pub const MAX_VALUE_SIZE: i64 = 16 * 1024;
/// Largest summed encoded size of one batch (4 MiB)
pub const MAX_BATCH_SIZE: i64 = 4 * 1024 * 1024;
/// Longest key, in characters
pub const MAX_KEY_LENGTH: usize = 32;
/// Capacity given to users registered without one (1 GiB)
pub const DEFAULT_PROVISIONED_CAPACITY: i64 = 1024 * 1024 * 1024;
/// Latest accepted TTL: 2100-01-01T00:00:00Z
pub const TTL_HORIZON: i64 = 4_102_444_800;

/// Registered user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Credential hash, never the plain password
    #[serde(skip_serializing)]
    pub password: String,
    pub provisioned_capacity: i64,
}

/// User to be created together with its quota row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub password_hash: String,
    pub provisioned_capacity: i64,
}

/// Per-user byte quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub provisioned: i64,
    pub utilised: i64,
}

impl Quota {
    pub fn new(provisioned: i64) -> Self {
        Quota {
            provisioned,
            utilised: 0,
        }
    }

    /// Bytes that can still be written
    pub fn remaining(&self) -> i64 {
        (self.provisioned - self.utilised).max(0)
    }

    /// Whether adding `candidate` bytes would breach the ceiling
    pub fn would_exceed(&self, candidate: i64) -> bool {
        self.utilised.saturating_add(candidate) > self.provisioned
    }

    pub fn usage_percent(&self) -> f64 {
        if self.provisioned == 0 {
            return 0.0;
        }
        (self.utilised as f64 / self.provisioned as f64) * 100.0
    }
}

/// Stored object as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub key: String,
    #[serde(default)]
    pub value: Value,
    /// Absolute Unix timestamp, `0` = never expires
    #[serde(default)]
    pub ttl: i64,
}

impl Object {
    pub fn new(key: impl Into<String>, value: Value, ttl: i64) -> Self {
        Object {
            key: key.into(),
            value,
            ttl,
        }
    }
}

/// Object in its stored (encoded) form
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub ttl: i64,
}

impl StoredObject {
    pub fn size(&self) -> i64 {
        self.bytes.len() as i64
    }
}

/// How a batch write is charged against the quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchAccounting {
    /// Charge the full encoded size of the batch, even for keys that
    /// overwrite existing entries.
    #[default]
    Cumulative,
    /// Charge only the net growth: overwritten entries are credited back and
    /// duplicate keys within one batch are counted once.
    Net,
}

/// Size ceilings and defaults enforced by the store
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreLimits {
    pub max_value_size: i64,
    pub max_batch_size: i64,
    pub max_key_length: usize,
    pub default_provisioned_capacity: i64,
    pub batch_accounting: BatchAccounting,
}

impl Default for StoreLimits {
    fn default() -> Self {
        StoreLimits {
            max_value_size: MAX_VALUE_SIZE,
            max_batch_size: MAX_BATCH_SIZE,
            max_key_length: MAX_KEY_LENGTH,
            default_provisioned_capacity: DEFAULT_PROVISIONED_CAPACITY,
            batch_accounting: BatchAccounting::Cumulative,
        }
    }
}
