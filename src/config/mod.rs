use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::MigrationError;
use crate::migration::store::StoreLayout;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateConfig {
    pub environment: Environment,
    pub database: DatabaseSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Connection string for the target database. Required by every
    /// command that touches the ledger.
    pub url: Option<String>,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub migrations_dir: PathBuf,
    pub seeds_dir: PathBuf,
}

impl MigrateConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout =
                v.parse().unwrap_or(self.database.connection_timeout);
        }

        if let Ok(v) = env::var("MIGRATIONS_DIR") {
            self.store.migrations_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("SEEDS_DIR") {
            self.store.seeds_dir = PathBuf::from(v);
        }

        self
    }

    /// Apply explicit command-line values on top of the environment
    pub fn with_overrides(
        mut self,
        database_url: Option<String>,
        migrations_dir: Option<PathBuf>,
        seeds_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(url) = database_url {
            self.database.url = Some(url);
        }
        if let Some(dir) = migrations_dir {
            self.store.migrations_dir = dir;
        }
        if let Some(dir) = seeds_dir {
            self.store.seeds_dir = dir;
        }
        self
    }

    /// Connection string, or a configuration error when none was supplied
    pub fn require_database_url(&self) -> Result<&str, MigrationError> {
        self.database
            .url
            .as_deref()
            .ok_or_else(|| MigrationError::Config("DATABASE_URL is not set".to_string()))
    }

    pub fn store_layout(&self) -> StoreLayout {
        StoreLayout::new(&self.store.migrations_dir, &self.store.seeds_dir)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseSettings {
                url: None,
                max_connections: 1,
                connection_timeout: 30,
            },
            store: StoreSettings::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseSettings {
                url: None,
                max_connections: 1,
                connection_timeout: 10,
            },
            store: StoreSettings::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseSettings {
                url: None,
                max_connections: 1,
                connection_timeout: 5,
            },
            store: StoreSettings::default(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("database/migrations"),
            seeds_dir: PathBuf::from("database/seeds"),
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<MigrateConfig> = Lazy::new(MigrateConfig::from_env);

pub fn config() -> &'static MigrateConfig {
    &CONFIG
}
