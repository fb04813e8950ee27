use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, PgPool};
use std::collections::BTreeSet;
use tracing::debug;

use super::manager::DatabaseError;
use crate::migration::Category;

/// History table DDL. Column names and indexes are relied on by existing
/// deployments and must not change.
pub const LEDGER_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS migration_history (
    id          SERIAL PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    type        TEXT NOT NULL,
    executed_at TIMESTAMP NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_migration_history_name ON migration_history (name);
CREATE INDEX IF NOT EXISTS idx_migration_history_type ON migration_history (type);
"#;

/// One applied unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i32,
    pub name: String,
    pub category: Category,
    pub executed_at: NaiveDateTime,
}

/// Database handle the runner works through: opaque script execution plus
/// the history ledger. The runner is the only writer of the ledger.
#[async_trait]
pub trait MigrationDatabase: Send + Sync {
    /// Execute arbitrary script text. Multiple statements are allowed.
    async fn execute_script(&self, sql: &str) -> Result<(), DatabaseError>;

    /// Create the ledger table and its indexes if absent
    async fn ensure_ledger(&self) -> Result<(), DatabaseError>;

    /// Names recorded for `category`. A missing ledger table reads as empty.
    async fn list_applied(&self, category: Category) -> Result<BTreeSet<String>, DatabaseError>;

    async fn is_applied(&self, name: &str, category: Category) -> Result<bool, DatabaseError>;

    /// Insert a ledger row. A row already present is a logic error and
    /// fails with `DatabaseError::DuplicateEntry`.
    async fn record_applied(&self, name: &str, category: Category) -> Result<(), DatabaseError>;

    /// Delete the ledger row, returning rows affected. Zero rows (or no
    /// ledger table at all) is not an error.
    async fn record_reverted(&self, name: &str, category: Category) -> Result<u64, DatabaseError>;

    /// Full rows for `category`, ordered by name
    async fn list_entries(&self, category: Category) -> Result<Vec<LedgerEntry>, DatabaseError>;
}

/// PostgreSQL implementation over a `PgPool`
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map "ledger table does not exist" to a fallback value
fn tolerate_missing_ledger<T>(
    result: Result<T, sqlx::Error>,
    fallback: T,
) -> Result<T, DatabaseError> {
    match result.map_err(DatabaseError::from) {
        Err(e) if e.is_undefined_table() => {
            debug!("migration_history does not exist; treating ledger as empty");
            Ok(fallback)
        }
        other => other,
    }
}

#[async_trait]
impl MigrationDatabase for PgDatabase {
    async fn execute_script(&self, sql: &str) -> Result<(), DatabaseError> {
        // A bare &str carries no bind arguments, so it goes over the simple
        // query protocol and may hold several statements.
        (&self.pool).execute(sql).await?;
        Ok(())
    }

    async fn ensure_ledger(&self) -> Result<(), DatabaseError> {
        (&self.pool).execute(LEDGER_DDL).await?;
        Ok(())
    }

    async fn list_applied(&self, category: Category) -> Result<BTreeSet<String>, DatabaseError> {
        let rows: Result<Vec<(String,)>, sqlx::Error> =
            sqlx::query_as("SELECT name FROM migration_history WHERE type = $1")
                .bind(category.as_str())
                .fetch_all(&self.pool)
                .await;

        let rows = tolerate_missing_ledger(rows, Vec::new())?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn is_applied(&self, name: &str, category: Category) -> Result<bool, DatabaseError> {
        let row: Result<Option<(i32,)>, sqlx::Error> =
            sqlx::query_as("SELECT id FROM migration_history WHERE name = $1 AND type = $2")
                .bind(name)
                .bind(category.as_str())
                .fetch_optional(&self.pool)
                .await;

        Ok(tolerate_missing_ledger(row, None)?.is_some())
    }

    async fn record_applied(&self, name: &str, category: Category) -> Result<(), DatabaseError> {
        let result = sqlx::query("INSERT INTO migration_history (name, type) VALUES ($1, $2)")
            .bind(name)
            .bind(category.as_str())
            .execute(&self.pool)
            .await;

        match result.map_err(DatabaseError::from) {
            Ok(_) => Ok(()),
            Err(e) if e.is_unique_violation() => {
                Err(DatabaseError::DuplicateEntry(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn record_reverted(&self, name: &str, category: Category) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM migration_history WHERE name = $1 AND type = $2")
            .bind(name)
            .bind(category.as_str())
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected());

        tolerate_missing_ledger(result, 0)
    }

    async fn list_entries(&self, category: Category) -> Result<Vec<LedgerEntry>, DatabaseError> {
        let rows: Result<Vec<(i32, String, NaiveDateTime)>, sqlx::Error> = sqlx::query_as(
            "SELECT id, name, executed_at FROM migration_history WHERE type = $1 ORDER BY name",
        )
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await;

        let rows = tolerate_missing_ledger(rows, Vec::new())?;
        Ok(rows
            .into_iter()
            .map(|(id, name, executed_at)| LedgerEntry {
                id,
                name,
                category,
                executed_at,
            })
            .collect())
    }
}
