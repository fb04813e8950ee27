#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sql_ledger_migrate::{FsSource, StoreLayout};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tempfile::TempDir;

/// Script directories in a throwaway temp dir
pub struct TestStore {
    dir: TempDir,
}

impl TestStore {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create temp dir")?;
        Ok(Self { dir })
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(self.dir.path().join("migrations"), self.dir.path().join("seeds"))
    }

    pub fn source(&self) -> FsSource {
        FsSource::new(self.layout())
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.layout().migrations_dir
    }

    /// Write `<name>.up.sql` and `<name>.down.sql` into `dir`
    pub fn write_unit(&self, dir: &Path, name: &str, up: &str, down: &str) -> Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(format!("{name}.up.sql")), up)?;
        fs::write(dir.join(format!("{name}.down.sql")), down)?;
        Ok(())
    }
}

/// A uniquely named schema on the server behind DATABASE_URL. Every pooled
/// connection has its search_path pinned to it, so tests never see each
/// other's tables or ledgers.
pub struct TestDatabase {
    pub pool: PgPool,
    pub schema: String,
    admin: PgPool,
}

/// `None` (and a note on stderr) when DATABASE_URL is not set
pub async fn test_database() -> Result<Option<TestDatabase>> {
    let _ = dotenvy::dotenv();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return Ok(None);
    };

    let schema = format!("test_{}", uuid::Uuid::new_v4().simple());
    let admin = PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .context("failed to connect to DATABASE_URL")?;
    admin.execute(format!("CREATE SCHEMA {schema}").as_str()).await?;

    let search_path = format!("SET search_path TO {schema}");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .after_connect(move |conn, _meta| {
            let sql = search_path.clone();
            Box::pin(async move {
                conn.execute(sql.as_str()).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await?;

    Ok(Some(TestDatabase { pool, schema, admin }))
}

impl TestDatabase {
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = $1 AND table_name = $2)",
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_one(&self.admin)
        .await?;
        Ok(exists)
    }

    /// Ledger rows of `category`, in insertion order
    pub async fn ledger_names(&self, category: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM migration_history WHERE type = $1 ORDER BY id")
                .bind(category)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    pub async fn cleanup(self) -> Result<()> {
        self.pool.close().await;
        self.admin
            .execute(format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema).as_str())
            .await?;
        self.admin.close().await;
        Ok(())
    }
}
