//! Quota ledger
//!
//! One row per user holding `provisioned` and `utilised` bytes. Mutating
//! helpers take a `&mut SqliteConnection` borrowed from an open
//! [`AtomicUnit`](super::tx::AtomicUnit) so ledger updates always commit
//! together with the object write they account for.

use crate::error::{Result, StoreError};
use crate::store::types::Quota;
use sqlx::{SqliteConnection, SqliteExecutor};

const QUOTA_NOT_FOUND: &str = "quota not found";

pub async fn create(conn: &mut SqliteConnection, user_id: i64, provisioned: i64) -> Result<()> {
    sqlx::query("INSERT INTO quotas (user_id, provisioned, utilised) VALUES (?, ?, 0)")
        .bind(user_id)
        .bind(provisioned)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Read a user's quota without locking it
pub async fn get<'e, E>(executor: E, user_id: i64) -> Result<Quota>
where
    E: SqliteExecutor<'e>,
{
    let row: Option<(i64, i64)> =
        sqlx::query_as("SELECT provisioned, utilised FROM quotas WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(executor)
            .await?;

    row.map(|(provisioned, utilised)| Quota {
        provisioned,
        utilised,
    })
    .ok_or_else(|| StoreError::NotFound(QUOTA_NOT_FOUND.to_string()))
}

/// Read a user's quota and take the write lock on it.
///
/// Must be the first statement of a write unit: the no-op update acquires
/// the database write lock before anything is read, so concurrent writers
/// for the same user queue behind each other (bounded by the busy timeout)
/// instead of validating against a stale `utilised`.
pub async fn lock_for_update(conn: &mut SqliteConnection, user_id: i64) -> Result<Quota> {
    let row: Option<(i64, i64)> = sqlx::query_as(
        r#"
        UPDATE quotas SET utilised = utilised
        WHERE user_id = ?
        RETURNING provisioned, utilised
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|(provisioned, utilised)| Quota {
        provisioned,
        utilised,
    })
    .ok_or_else(|| StoreError::NotFound(QUOTA_NOT_FOUND.to_string()))
}

/// Add `delta` (possibly negative) to the user's utilised bytes
pub async fn adjust_utilised(conn: &mut SqliteConnection, user_id: i64, delta: i64) -> Result<()> {
    if delta == 0 {
        return Ok(());
    }

    let result = sqlx::query("UPDATE quotas SET utilised = utilised + ? WHERE user_id = ?")
        .bind(delta)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(QUOTA_NOT_FOUND.to_string()));
    }

    Ok(())
}

pub fn validate_against_quota(quota: &Quota, candidate_bytes: i64) -> Result<()> {
    if quota.would_exceed(candidate_bytes) {
        return Err(StoreError::QuotaExceeded);
    }
    Ok(())
}

pub fn validate_value_size(size: i64, max: i64) -> Result<()> {
    if size > max {
        return Err(StoreError::ValueTooLarge { size, max });
    }
    Ok(())
}
