use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseSettings;

/// Errors from DatabaseManager and the ledger
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Ledger already records '{0}'")]
    DuplicateEntry(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// SQLSTATE for `relation does not exist`
pub(crate) const UNDEFINED_TABLE: &str = "42P01";

/// SQLSTATE for `duplicate key value violates unique constraint`
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

impl DatabaseError {
    /// SQLSTATE code of the underlying database error, if there is one
    pub fn sqlstate(&self) -> Option<String> {
        match self {
            DatabaseError::Sqlx(sqlx::Error::Database(db_err)) => {
                db_err.code().map(|code| code.into_owned())
            }
            _ => None,
        }
    }

    pub fn is_undefined_table(&self) -> bool {
        self.sqlstate().as_deref() == Some(UNDEFINED_TABLE)
    }

    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate().as_deref() == Some(UNIQUE_VIOLATION)
    }
}

/// Builds the single pool the runner works through
pub struct DatabaseManager;

impl DatabaseManager {
    /// Validate the connection string and open a pool against it
    pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, DatabaseError> {
        let connection_string = settings
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let url = Self::parse_url(connection_string)?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(settings.connection_timeout))
            .connect(connection_string)
            .await?;

        info!("Connected to {}", Self::redact(&url));
        Ok(pool)
    }

    fn parse_url(connection_string: &str) -> Result<url::Url, DatabaseError> {
        let url = url::Url::parse(connection_string)
            .map_err(|e| DatabaseError::InvalidDatabaseUrl(e.to_string()))?;

        match url.scheme() {
            "postgres" | "postgresql" => Ok(url),
            other => Err(DatabaseError::InvalidDatabaseUrl(format!(
                "unsupported scheme '{}'",
                other
            ))),
        }
    }

    /// Connection string with the password masked, for logs
    pub fn redact(url: &url::Url) -> String {
        let mut redacted = url.clone();
        if redacted.password().is_some() {
            let _ = redacted.set_password(Some("****"));
        }
        redacted.to_string()
    }
}
