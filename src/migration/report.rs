use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Category, Direction};
use crate::error::count_units;

/// Outcome of one successful `run(category, direction)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub category: Category,
    pub direction: Direction,
    /// Script files found for this direction
    pub discovered: usize,
    /// Units executed, in execution order
    pub processed: Vec<String>,
    /// Units passed over (already applied, or never applied on revert)
    pub skipped: Vec<String>,
}

impl RunReport {
    pub fn new(category: Category, direction: Direction, discovered: usize) -> Self {
        Self {
            category,
            direction,
            discovered,
            processed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.processed.is_empty()
    }

    /// One-line human summary, e.g. `2 units applied: A, B`
    pub fn summary(&self) -> String {
        if self.discovered == 0 {
            return format!("no {} files found", self.category);
        }

        let verb = self.direction.past_tense();
        if self.processed.is_empty() {
            return format!("0 units {} (nothing to do)", verb);
        }

        format!(
            "{} {}: {}",
            count_units(self.processed.len()),
            verb,
            self.processed.join(", ")
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Applied,
    Pending,
    /// Ledger row with no forward script on disk
    Orphaned,
}

/// Status line for one unit, as listed by `MigrationRunner::status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    pub name: String,
    pub category: Category,
    pub state: UnitState,
    pub executed_at: Option<NaiveDateTime>,
    pub has_forward: bool,
    pub has_reverse: bool,
}
