use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, info, warn};

use super::report::{RunReport, UnitState, UnitStatus};
use super::store::MigrationSource;
use super::{Category, Direction, MigrationUnit};
use crate::database::MigrationDatabase;
use crate::error::MigrationError;

/// Applies and reverts units against a database, keeping the ledger in step.
///
/// Runs are strictly sequential and halt at the first failing unit, so the
/// ledger always describes a prefix of the sorted units having been applied
/// (or a suffix having been reverted) and re-running resumes from the
/// failure point.
///
/// Script execution and the ledger write are separate round-trips. A
/// process killed between the two leaves the script's effects in place with
/// no ledger row; that state has to be repaired by hand before re-running.
pub struct MigrationRunner<D, S> {
    db: D,
    source: S,
}

impl<D, S> MigrationRunner<D, S>
where
    D: MigrationDatabase,
    S: MigrationSource,
{
    pub fn new(db: D, source: S) -> Self {
        Self { db, source }
    }

    /// Process every outstanding unit of `category` in `direction`
    pub async fn run(
        &self,
        category: Category,
        direction: Direction,
    ) -> Result<RunReport, MigrationError> {
        self.run_steps(category, direction, None).await
    }

    /// Like `run`, but stop after `steps` units have been processed
    pub async fn run_steps(
        &self,
        category: Category,
        direction: Direction,
        steps: Option<usize>,
    ) -> Result<RunReport, MigrationError> {
        let report = match direction {
            Direction::Apply => self.apply(category, steps).await?,
            Direction::Revert => self.revert(category, steps).await?,
        };

        info!("{}: {}", category, report.summary());
        Ok(report)
    }

    async fn apply(
        &self,
        category: Category,
        steps: Option<usize>,
    ) -> Result<RunReport, MigrationError> {
        self.db.ensure_ledger().await?;

        let units = self.source.list_forward(category)?;
        let mut report = RunReport::new(category, Direction::Apply, units.len());
        if units.is_empty() {
            return Ok(report);
        }

        self.warn_missing_reverse(category, &units)?;
        let applied = self.db.list_applied(category).await?;

        for unit in units {
            if applied.contains(&unit.name) {
                info!("Skipping {} (already applied)", unit.name);
                report.skipped.push(unit.name);
                continue;
            }
            if limit_reached(&report, steps) {
                break;
            }

            info!("Applying {}", unit.name);
            warn_if_empty(&unit);
            self.db.execute_script(&unit.sql).await.map_err(|source| {
                error!("{} failed: {}", unit.location, source);
                MigrationError::UnitFailed {
                    name: unit.name.clone(),
                    location: unit.location.clone(),
                    completed: report.processed.clone(),
                    source,
                }
            })?;

            self.db.record_applied(&unit.name, category).await.map_err(|source| {
                error!("{} executed but was not recorded in the ledger: {}", unit.name, source);
                MigrationError::LedgerWriteFailed {
                    name: unit.name.clone(),
                    completed: report.processed.clone(),
                    source,
                }
            })?;

            report.processed.push(unit.name);
        }

        Ok(report)
    }

    async fn revert(
        &self,
        category: Category,
        steps: Option<usize>,
    ) -> Result<RunReport, MigrationError> {
        let units = self.source.list_reverse(category)?;
        let mut report = RunReport::new(category, Direction::Revert, units.len());

        for unit in units.into_iter().rev() {
            if limit_reached(&report, steps) {
                break;
            }
            if !self.db.is_applied(&unit.name, category).await? {
                info!("Skipping {} (not applied)", unit.name);
                report.skipped.push(unit.name);
                continue;
            }

            info!("Reverting {}", unit.name);
            warn_if_empty(&unit);
            self.db.execute_script(&unit.sql).await.map_err(|source| {
                error!("{} failed: {}", unit.location, source);
                MigrationError::UnitFailed {
                    name: unit.name.clone(),
                    location: unit.location.clone(),
                    completed: report.processed.clone(),
                    source,
                }
            })?;

            let removed = self.db.record_reverted(&unit.name, category).await.map_err(|source| {
                error!("{} reverted but its ledger row was not removed: {}", unit.name, source);
                MigrationError::LedgerWriteFailed {
                    name: unit.name.clone(),
                    completed: report.processed.clone(),
                    source,
                }
            })?;
            if removed == 0 {
                warn!("{} had no ledger row left to remove", unit.name);
            }

            report.processed.push(unit.name);
        }

        Ok(report)
    }

    /// Every unit known to either the store or the ledger, by name.
    /// Read-only: the ledger table is not created.
    pub async fn status(&self, category: Category) -> Result<Vec<UnitStatus>, MigrationError> {
        let forward = names(&self.source.list_forward(category)?);
        let reverse = names(&self.source.list_reverse(category)?);
        let entries = self.db.list_entries(category).await?;

        let mut statuses: BTreeMap<String, UnitStatus> = forward
            .iter()
            .chain(reverse.iter())
            .map(|name| {
                let status = UnitStatus {
                    name: name.clone(),
                    category,
                    state: UnitState::Pending,
                    executed_at: None,
                    has_forward: forward.contains(name),
                    has_reverse: reverse.contains(name),
                };
                (name.clone(), status)
            })
            .collect();

        for entry in entries {
            let status = statuses.entry(entry.name.clone()).or_insert_with(|| UnitStatus {
                name: entry.name.clone(),
                category,
                state: UnitState::Orphaned,
                executed_at: None,
                has_forward: false,
                has_reverse: false,
            });
            status.state = if status.has_forward {
                UnitState::Applied
            } else {
                UnitState::Orphaned
            };
            status.executed_at = Some(entry.executed_at);
        }

        Ok(statuses.into_values().collect())
    }

    /// Forward scripts without a reverse counterpart are tolerated, but
    /// such a unit cannot be reverted later.
    fn warn_missing_reverse(
        &self,
        category: Category,
        forward: &[MigrationUnit],
    ) -> Result<(), MigrationError> {
        let reverse = names(&self.source.list_reverse(category)?);
        for unit in forward.iter().filter(|u| !reverse.contains(&u.name)) {
            warn!("{} has no matching reverse script", unit.name);
        }
        Ok(())
    }
}

fn names(units: &[MigrationUnit]) -> BTreeSet<String> {
    units.iter().map(|u| u.name.clone()).collect()
}

fn warn_if_empty(unit: &MigrationUnit) {
    if unit.sql.trim().is_empty() {
        warn!("{} is empty", unit.location);
    }
}

fn limit_reached(report: &RunReport, steps: Option<usize>) -> bool {
    steps.is_some_and(|limit| report.processed.len() >= limit)
}
