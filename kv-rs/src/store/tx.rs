//! Transaction coordinator
//!
//! Every quota/object mutation runs inside an [`AtomicUnit`]. The unit is
//! closed with [`AtomicUnit::finish`], which commits on success and rolls
//! back on error. A unit dropped without `finish` (caller timeout, panic,
//! cancelled future) is rolled back by the driver, so partial state is never
//! committed.

use crate::error::{Result, StoreError};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::error;

/// The only component allowed to open persistent transactions
#[derive(Clone)]
pub struct TxCoordinator {
    pool: SqlitePool,
}

impl TxCoordinator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a new atomic unit. `operation` names it in logs.
    pub async fn begin(&self, operation: &'static str) -> Result<AtomicUnit> {
        let tx = self.pool.begin().await.map_err(|e| {
            error!("error beginning transaction for {}: {}", operation, e);
            StoreError::Internal(format!("error beginning transaction for {}", operation))
        })?;

        Ok(AtomicUnit { tx, operation })
    }
}

/// An open transaction
pub struct AtomicUnit {
    tx: Transaction<'static, Sqlite>,
    operation: &'static str,
}

impl AtomicUnit {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Commit if `outcome` is `Ok`, roll back otherwise. The original error
    /// is surfaced after a successful rollback.
    pub async fn finish<T>(self, outcome: Result<T>) -> Result<T> {
        let operation = self.operation;

        match outcome {
            Ok(value) => {
                self.tx.commit().await.map_err(|e| {
                    error!("error committing transaction for {}: {}", operation, e);
                    StoreError::Internal(format!("error committing {}", operation))
                })?;
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = self.tx.rollback().await {
                    error!("error rolling back transaction for {}: {}", operation, e);
                    return Err(StoreError::Internal(format!(
                        "error rolling back {}",
                        operation
                    )));
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> (SqlitePool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("tx.db").display());
        let pool = SqlitePool::connect(&url).await.unwrap();

        sqlx::query("CREATE TABLE items (id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();

        (pool, dir)
    }

    async fn count(pool: &SqlitePool) -> i64 {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }

    #[tokio::test]
    async fn test_finish_ok_commits() {
        let (pool, _dir) = test_pool().await;
        let coordinator = TxCoordinator::new(pool.clone());

        let mut unit = coordinator.begin("insert").await.unwrap();
        let outcome = sqlx::query("INSERT INTO items (id) VALUES (1)")
            .execute(&mut *unit.conn())
            .await
            .map(|_| ())
            .map_err(StoreError::from);
        unit.finish(outcome).await.unwrap();

        assert_eq!(count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_finish_err_rolls_back() {
        let (pool, _dir) = test_pool().await;
        let coordinator = TxCoordinator::new(pool.clone());

        let mut unit = coordinator.begin("insert").await.unwrap();
        sqlx::query("INSERT INTO items (id) VALUES (1)")
            .execute(&mut *unit.conn())
            .await
            .unwrap();

        let result: Result<()> = unit.finish(Err(StoreError::QuotaExceeded)).await;
        assert!(matches!(result, Err(StoreError::QuotaExceeded)));
        assert_eq!(count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_dropped_unit_is_rolled_back() {
        let (pool, _dir) = test_pool().await;
        let coordinator = TxCoordinator::new(pool.clone());

        {
            let mut unit = coordinator.begin("insert").await.unwrap();
            sqlx::query("INSERT INTO items (id) VALUES (1)")
                .execute(&mut *unit.conn())
                .await
                .unwrap();
            assert_eq!(unit.operation(), "insert");
        }

        assert_eq!(count(&pool).await, 0);
    }
}
