pub mod generator;
pub mod report;
pub mod runner;
pub mod store;

pub use generator::{GeneratedPair, MigrationGenerator};
pub use report::{RunReport, UnitState, UnitStatus};
pub use runner::MigrationRunner;
pub use store::{FsSource, MigrationSource, StoreLayout};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MigrationError;

/// Partition of units. Each category keeps its own history inside the one
/// shared ledger table, discriminated by the `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Schema-altering scripts (DDL)
    Migrate,
    /// Data-seeding scripts (DML)
    Seed,
}

impl Category {
    /// Value stored in the ledger `type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Migrate => "migrate",
            Category::Seed => "seed",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "migrate" => Ok(Category::Migrate),
            "seed" => Ok(Category::Seed),
            other => Err(MigrationError::InvalidCategory(other.to_string())),
        }
    }
}

/// Which half of a unit the runner executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Apply,
    Revert,
}

impl Direction {
    /// File suffix selecting scripts for this direction
    pub fn suffix(&self) -> &'static str {
        match self {
            Direction::Apply => ".up.sql",
            Direction::Revert => ".down.sql",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            Direction::Apply => "applied",
            Direction::Revert => "reverted",
        }
    }
}

/// One side (forward or reverse script) of a migration unit.
///
/// `(name, category)` is the unit key shared by both sides; `sql` is opaque
/// script text executed as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub name: String,
    pub category: Category,
    pub direction: Direction,
    pub sql: String,
    /// Where the script came from, e.g. its file path
    pub location: String,
}

impl MigrationUnit {
    pub fn new(
        name: impl Into<String>,
        category: Category,
        direction: Direction,
        sql: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            direction,
            sql: sql.into(),
            location: location.into(),
        }
    }
}
