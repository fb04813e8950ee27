pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod migration;

pub use database::{DatabaseError, MigrationDatabase, PgDatabase};
pub use error::MigrationError;
pub use migration::{
    Category, Direction, FsSource, MigrationGenerator, MigrationRunner, MigrationSource,
    MigrationUnit, RunReport, StoreLayout,
};

#[cfg(test)]
pub mod testing;
