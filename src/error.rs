// Migration runner error types
use std::path::PathBuf;
use thiserror::Error;

use crate::database::DatabaseError;

/// Everything the runner, store and generator can fail with.
///
/// `UnitFailed` and `LedgerWriteFailed` carry the names of the units that
/// were completed earlier in the same run, so the caller can report how far
/// the batch got before it halted.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid category '{0}' (expected 'migrate' or 'seed')")]
    InvalidCategory(String),

    #[error("Invalid description {0:?}: needs text, no path separators or control characters")]
    InvalidDescription(String),

    #[error("Invalid schema label {0:?}: needs text and no control characters")]
    InvalidSchemaLabel(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} ({location}) failed after {}: {source}", progress(.completed))]
    UnitFailed {
        name: String,
        location: String,
        completed: Vec<String>,
        #[source]
        source: DatabaseError,
    },

    #[error(
        "{name} executed but the ledger could not be updated after {}: {source}",
        progress(.completed)
    )]
    LedgerWriteFailed {
        name: String,
        completed: Vec<String>,
        #[source]
        source: DatabaseError,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] DatabaseError),
}

impl MigrationError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrationError::Io {
            path: path.into(),
            source,
        }
    }

    /// Units completed in the failing run before the error surfaced
    pub fn completed(&self) -> &[String] {
        match self {
            MigrationError::UnitFailed { completed, .. }
            | MigrationError::LedgerWriteFailed { completed, .. } => completed,
            _ => &[],
        }
    }

    /// Name of the unit the run halted on, if any
    pub fn failed_unit(&self) -> Option<&str> {
        match self {
            MigrationError::UnitFailed { name, .. }
            | MigrationError::LedgerWriteFailed { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Stable code for machine-readable output
    pub fn error_code(&self) -> &'static str {
        match self {
            MigrationError::Config(_) => "CONFIG_ERROR",
            MigrationError::InvalidCategory(_) => "INVALID_CATEGORY",
            MigrationError::InvalidDescription(_) => "INVALID_DESCRIPTION",
            MigrationError::InvalidSchemaLabel(_) => "INVALID_SCHEMA_LABEL",
            MigrationError::Io { .. } => "IO_ERROR",
            MigrationError::UnitFailed { .. } => "UNIT_FAILED",
            MigrationError::LedgerWriteFailed { .. } => "LEDGER_WRITE_FAILED",
            MigrationError::Ledger(_) => "LEDGER_ERROR",
        }
    }
}

pub(crate) fn count_units(count: usize) -> String {
    match count {
        1 => "1 unit".to_string(),
        n => format!("{} units", n),
    }
}

fn progress(completed: &[String]) -> String {
    if completed.is_empty() {
        return "0 units completed".to_string();
    }
    format!("{} completed ({})", count_units(completed.len()), completed.join(", "))
}
