//! Batch validator
//!
//! Encodes and sizes a whole batch up front so that quota and ceiling
//! violations are detected before any row is written.

use std::collections::HashMap;

use crate::codec::ValueCodec;
use crate::error::{Result, StoreError};
use crate::store::types::{BatchAccounting, Object, StoreLimits, StoredObject};
use crate::validation;

/// A validated, encoded batch ready to be written
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub rows: Vec<StoredObject>,
    /// Sum of the encoded sizes of every row
    pub size: i64,
}

impl PreparedBatch {
    /// Validate every object and encode it. Fails on the first invalid
    /// object; nothing is written.
    pub fn prepare(
        codec: &dyn ValueCodec,
        objects: Vec<Object>,
        limits: &StoreLimits,
        now: i64,
    ) -> Result<Self> {
        let mut rows = Vec::with_capacity(objects.len());
        let mut size: i64 = 0;

        for object in objects {
            validation::validate_object(&object, limits, now)?;

            let bytes = codec.encode(&object.value)?;
            size += bytes.len() as i64;
            rows.push(StoredObject {
                key: object.key,
                bytes,
                ttl: object.ttl,
            });
        }

        Ok(Self { rows, size })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Final encoded size per key once the batch is applied. With duplicate
    /// keys the last occurrence wins, matching REPLACE semantics.
    pub fn final_sizes(&self) -> HashMap<&str, i64> {
        let mut sizes = HashMap::with_capacity(self.rows.len());
        for row in &self.rows {
            sizes.insert(row.key.as_str(), row.size());
        }
        sizes
    }

    /// Bytes this batch adds to `utilised`.
    ///
    /// `existing` maps keys already stored for the user to their stored size;
    /// it is only consulted in [`BatchAccounting::Net`] mode.
    pub fn charge(&self, existing: &HashMap<String, i64>, mode: BatchAccounting) -> i64 {
        match mode {
            BatchAccounting::Cumulative => self.size,
            BatchAccounting::Net => self
                .final_sizes()
                .into_iter()
                .map(|(key, size)| size - existing.get(key).copied().unwrap_or(0))
                .sum(),
        }
    }
}

/// Quota headroom is checked before the fixed ceiling.
pub fn validate(charge: i64, gross_size: i64, headroom: i64, max_batch_size: i64) -> Result<()> {
    if charge > headroom {
        return Err(StoreError::QuotaExceeded);
    }
    if gross_size > max_batch_size {
        return Err(StoreError::BatchTooLarge {
            size: gross_size,
            max: max_batch_size,
        });
    }
    Ok(())
}
