//! Object repository primitives
//!
//! Raw row access for the `objects` table. Nothing here checks quotas or
//! expiry; callers compose these inside an atomic unit.

use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor};

use crate::error::Result;
use crate::store::types::StoredObject;

/// Rows per multi-row statement. Four binds per row keeps every statement
/// far below SQLite's bind-parameter limit.
const ROWS_PER_STATEMENT: usize = 500;
const KEYS_PER_LOOKUP: usize = 500;

const UPSERT_TAIL: &str = r#"
    ON CONFLICT(user_id, data_key) DO UPDATE SET
        data_value = excluded.data_value,
        ttl = excluded.ttl
"#;

pub async fn fetch<'e, E>(executor: E, user_id: i64, key: &str) -> Result<Option<StoredObject>>
where
    E: SqliteExecutor<'e>,
{
    let row: Option<(Vec<u8>, i64)> =
        sqlx::query_as("SELECT data_value, ttl FROM objects WHERE user_id = ? AND data_key = ?")
            .bind(user_id)
            .bind(key)
            .fetch_optional(executor)
            .await?;

    Ok(row.map(|(bytes, ttl)| StoredObject {
        key: key.to_string(),
        bytes,
        ttl,
    }))
}

/// Stored byte length of an entry, if present
pub async fn stored_size(
    conn: &mut SqliteConnection,
    user_id: i64,
    key: &str,
) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT length(data_value) FROM objects WHERE user_id = ? AND data_key = ?",
    )
    .bind(user_id)
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|(size,)| size))
}

/// Stored byte lengths of whichever of `keys` exist for the user
pub async fn stored_sizes(
    conn: &mut SqliteConnection,
    user_id: i64,
    keys: &[&str],
) -> Result<HashMap<String, i64>> {
    let mut sizes = HashMap::new();

    for chunk in keys.chunks(KEYS_PER_LOOKUP) {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT data_key, length(data_value) FROM objects WHERE user_id = ",
        );
        query.push_bind(user_id);
        query.push(" AND data_key IN (");
        let mut list = query.separated(", ");
        for key in chunk {
            list.push_bind(*key);
        }
        list.push_unseparated(")");

        let rows: Vec<(String, i64)> = query.build_query_as().fetch_all(&mut *conn).await?;
        sizes.extend(rows);
    }

    Ok(sizes)
}

pub async fn upsert(conn: &mut SqliteConnection, user_id: i64, object: &StoredObject) -> Result<()> {
    let sql = format!(
        "INSERT INTO objects (user_id, data_key, data_value, ttl) VALUES (?, ?, ?, ?) {}",
        UPSERT_TAIL
    );

    sqlx::query(&sql)
        .bind(user_id)
        .bind(object.key.as_str())
        .bind(object.bytes.as_slice())
        .bind(object.ttl)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Multi-row upsert. Later rows for the same key overwrite earlier ones.
pub async fn upsert_many(
    conn: &mut SqliteConnection,
    user_id: i64,
    rows: &[StoredObject],
) -> Result<()> {
    for chunk in rows.chunks(ROWS_PER_STATEMENT) {
        let mut query =
            QueryBuilder::<Sqlite>::new("INSERT INTO objects (user_id, data_key, data_value, ttl) ");
        query.push_values(chunk, |mut row, object| {
            row.push_bind(user_id)
                .push_bind(object.key.as_str())
                .push_bind(object.bytes.as_slice())
                .push_bind(object.ttl);
        });
        query.push(UPSERT_TAIL);

        query.build().execute(&mut *conn).await?;
    }

    Ok(())
}

/// Delete an entry, returning its stored byte length if it existed
pub async fn remove(conn: &mut SqliteConnection, user_id: i64, key: &str) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(
        "DELETE FROM objects WHERE user_id = ? AND data_key = ? RETURNING length(data_value)",
    )
    .bind(user_id)
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|(size,)| size))
}

/// Delete an entry only if it is expired as of `now`
pub async fn remove_expired(
    conn: &mut SqliteConnection,
    user_id: i64,
    key: &str,
    now: i64,
) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        DELETE FROM objects
        WHERE user_id = ? AND data_key = ? AND ttl != 0 AND ttl < ?
        RETURNING length(data_value)
        "#,
    )
    .bind(user_id)
    .bind(key)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|(size,)| size))
}
