use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::database::{DatabaseError, LedgerEntry, MigrationDatabase};
use crate::error::MigrationError;
use crate::migration::{Category, Direction, MigrationSource, MigrationUnit};

/// In-memory stand-in for the target database.
///
/// Scripts are line based, one statement per line:
///
/// ```text
/// -- comments and blank lines are ignored
/// create t1
/// create t2 references t1
/// drop t2
/// drop ledger
/// fail <message>
/// ```
///
/// A script applies all of its statements or none of them. Dropping a table
/// that another table references fails, which lets tests catch reverts run
/// in the wrong order.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    /// `None` until the ledger table is created
    ledger: Option<Vec<LedgerEntry>>,
    next_id: i32,
    /// table -> table it references
    tables: BTreeMap<String, Option<String>>,
    executed: Vec<String>,
    fail_ledger_writes: bool,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ledger names for `category`, in insertion order
    pub fn ledger_names(&self, category: Category) -> Vec<String> {
        self.lock()
            .ledger
            .iter()
            .flatten()
            .filter(|e| e.category == category)
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn has_ledger(&self) -> bool {
        self.lock().ledger.is_some()
    }

    pub fn tables(&self) -> Vec<String> {
        self.lock().tables.keys().cloned().collect()
    }

    /// Every script executed successfully, in order
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Make every later ledger insert or delete fail
    pub fn fail_ledger_writes(&self) {
        self.lock().fail_ledger_writes = true;
    }

    /// Insert a ledger row directly, creating the table if needed
    pub fn seed_ledger(&self, name: &str, category: Category) {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.ledger.get_or_insert_with(Vec::new).push(LedgerEntry {
            id,
            name: name.to_string(),
            category,
            executed_at: Utc::now().naive_utc(),
        });
    }
}

fn query_error(message: impl Into<String>) -> DatabaseError {
    DatabaseError::QueryError(message.into())
}

fn missing_ledger() -> DatabaseError {
    query_error("relation \"migration_history\" does not exist")
}

#[async_trait]
impl MigrationDatabase for MemoryDatabase {
    async fn execute_script(&self, sql: &str) -> Result<(), DatabaseError> {
        let mut state = self.lock();
        let mut tables = state.tables.clone();
        let mut drop_ledger = false;

        for line in sql.lines().map(str::trim) {
            if line.is_empty() || line.starts_with("--") {
                continue;
            }

            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                ["create", table] | ["create", table, "references", _] => {
                    if tables.contains_key(*table) {
                        return Err(query_error(format!("relation \"{}\" already exists", table)));
                    }
                    let parent = words.get(3).map(|p| p.to_string());
                    if let Some(parent) = &parent {
                        if !tables.contains_key(parent) {
                            let message = format!("relation \"{}\" does not exist", parent);
                            return Err(query_error(message));
                        }
                    }
                    tables.insert(table.to_string(), parent);
                }
                ["drop", "ledger"] => drop_ledger = true,
                ["drop", table] => {
                    if !tables.contains_key(*table) {
                        return Err(query_error(format!("table \"{}\" does not exist", table)));
                    }
                    if let Some(child) = tables
                        .iter()
                        .find(|(_, parent)| parent.as_deref() == Some(*table))
                        .map(|(child, _)| child.clone())
                    {
                        return Err(query_error(format!(
                            "cannot drop table {} because other objects depend on it ({})",
                            table, child
                        )));
                    }
                    tables.remove(*table);
                }
                ["fail", rest @ ..] => return Err(query_error(rest.join(" "))),
                _ => return Err(query_error(format!("syntax error at or near \"{}\"", line))),
            }
        }

        state.tables = tables;
        if drop_ledger {
            state.ledger = None;
        }
        state.executed.push(sql.to_string());
        Ok(())
    }

    async fn ensure_ledger(&self) -> Result<(), DatabaseError> {
        self.lock().ledger.get_or_insert_with(Vec::new);
        Ok(())
    }

    async fn list_applied(&self, category: Category) -> Result<BTreeSet<String>, DatabaseError> {
        Ok(self.ledger_names(category).into_iter().collect())
    }

    async fn is_applied(&self, name: &str, category: Category) -> Result<bool, DatabaseError> {
        Ok(self.ledger_names(category).iter().any(|n| n == name))
    }

    async fn record_applied(&self, name: &str, category: Category) -> Result<(), DatabaseError> {
        let mut state = self.lock();
        if state.fail_ledger_writes {
            return Err(query_error("ledger write refused"));
        }
        state.next_id += 1;
        let id = state.next_id;

        let ledger = state.ledger.as_mut().ok_or_else(missing_ledger)?;
        if ledger.iter().any(|e| e.name == name) {
            return Err(DatabaseError::DuplicateEntry(name.to_string()));
        }
        ledger.push(LedgerEntry {
            id,
            name: name.to_string(),
            category,
            executed_at: Utc::now().naive_utc(),
        });
        Ok(())
    }

    async fn record_reverted(&self, name: &str, category: Category) -> Result<u64, DatabaseError> {
        let mut state = self.lock();
        if state.fail_ledger_writes {
            return Err(query_error("ledger write refused"));
        }
        let Some(ledger) = state.ledger.as_mut() else {
            return Ok(0);
        };

        let before = ledger.len();
        ledger.retain(|e| !(e.name == name && e.category == category));
        Ok((before - ledger.len()) as u64)
    }

    async fn list_entries(&self, category: Category) -> Result<Vec<LedgerEntry>, DatabaseError> {
        let mut entries: Vec<LedgerEntry> = self
            .lock()
            .ledger
            .iter()
            .flatten()
            .filter(|e| e.category == category)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

/// In-memory script store
#[derive(Clone, Default)]
pub struct MemorySource {
    scripts: Vec<(Category, String, Option<String>, Option<String>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit with both scripts
    pub fn unit(self, category: Category, name: &str, up: &str, down: &str) -> Self {
        self.with(category, name, Some(up), Some(down))
    }

    pub fn forward_only(self, category: Category, name: &str, up: &str) -> Self {
        self.with(category, name, Some(up), None)
    }

    pub fn reverse_only(self, category: Category, name: &str, down: &str) -> Self {
        self.with(category, name, None, Some(down))
    }

    fn with(
        mut self,
        category: Category,
        name: &str,
        up: Option<&str>,
        down: Option<&str>,
    ) -> Self {
        self.scripts.push((
            category,
            name.to_string(),
            up.map(str::to_string),
            down.map(str::to_string),
        ));
        self
    }

    fn list(&self, category: Category, direction: Direction) -> Vec<MigrationUnit> {
        let mut units: Vec<MigrationUnit> = self
            .scripts
            .iter()
            .filter(|(c, ..)| *c == category)
            .filter_map(|(c, name, up, down)| {
                let sql = match direction {
                    Direction::Apply => up.as_ref(),
                    Direction::Revert => down.as_ref(),
                }?;
                let location = format!("memory:{}{}", name, direction.suffix());
                Some(MigrationUnit::new(name.clone(), *c, direction, sql.clone(), location))
            })
            .collect();
        units.sort_by(|a, b| a.name.cmp(&b.name));
        units
    }
}

impl MigrationSource for MemorySource {
    fn list_forward(&self, category: Category) -> Result<Vec<MigrationUnit>, MigrationError> {
        Ok(self.list(category, Direction::Apply))
    }

    fn list_reverse(&self, category: Category) -> Result<Vec<MigrationUnit>, MigrationError> {
        Ok(self.list(category, Direction::Revert))
    }
}
