pub mod ledger;
pub mod manager;

pub use ledger::{LedgerEntry, MigrationDatabase, PgDatabase, LEDGER_DDL};
pub use manager::{DatabaseError, DatabaseManager};
