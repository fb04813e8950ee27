use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use super::store::StoreLayout;
use super::{Category, Direction};
use crate::error::MigrationError;

/// Timestamp prefix of generated names, `YYYYMMDD_HHMMSS`
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// The two files written by one `generate` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPair {
    pub name: String,
    pub category: Category,
    pub up: PathBuf,
    pub down: PathBuf,
}

/// Scaffolds empty, correctly named up/down script pairs
pub struct MigrationGenerator {
    layout: StoreLayout,
}

impl MigrationGenerator {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Write `<timestamp>_<description>.up.sql` and `.down.sql` for
    /// `category`, stamped with the current UTC time.
    pub fn generate(
        &self,
        category: Category,
        description: &str,
        subschema: Option<&str>,
    ) -> Result<GeneratedPair, MigrationError> {
        self.generate_at(category, description, subschema, Utc::now())
    }

    pub fn generate_at(
        &self,
        category: Category,
        description: &str,
        subschema: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<GeneratedPair, MigrationError> {
        validate_description(description)?;
        if let Some(label) = subschema {
            validate_schema_label(label)?;
        }

        let name = format!("{}_{}", now.format(TIMESTAMP_FORMAT), description);
        let dir = self.layout.dir_for(category);
        fs::create_dir_all(dir).map_err(|e| MigrationError::io(dir, e))?;

        let up = dir.join(format!("{}{}", name, Direction::Apply.suffix()));
        let down = dir.join(format!("{}{}", name, Direction::Revert.suffix()));

        let created = now.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let up_sql = render(category, Direction::Apply, &name, &created, subschema);
        let down_sql = render(category, Direction::Revert, &name, &created, subschema);
        write_new(&up, &up_sql)?;
        if let Err(e) = write_new(&down, &down_sql) {
            // Never leave half a pair behind
            let _ = fs::remove_file(&up);
            return Err(e);
        }

        info!("Created {} and {}", up.display(), down.display());
        Ok(GeneratedPair {
            name,
            category,
            up,
            down,
        })
    }
}

fn validate_description(description: &str) -> Result<(), MigrationError> {
    let invalid = description.trim().is_empty()
        || description.contains('/')
        || description.contains('\\')
        || description == "."
        || description == ".."
        || description.chars().any(char::is_control);
    if invalid {
        return Err(MigrationError::InvalidDescription(description.to_string()));
    }
    Ok(())
}

/// The label is written into `--` comment lines, so a line break would end
/// the comment and turn the rest into executable SQL.
fn validate_schema_label(label: &str) -> Result<(), MigrationError> {
    if label.trim().is_empty() || label.chars().any(char::is_control) {
        return Err(MigrationError::InvalidSchemaLabel(label.to_string()));
    }
    Ok(())
}

fn write_new(path: &Path, content: &str) -> Result<(), MigrationError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| MigrationError::io(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| MigrationError::io(path, e))
}

/// Comment-only template. The subschema label, when given, appears in
/// comments and never in executable text.
fn render(
    category: Category,
    direction: Direction,
    name: &str,
    created: &str,
    subschema: Option<&str>,
) -> String {
    let target = subschema.map(|s| format!("{}.", s)).unwrap_or_default();

    let mut out = String::new();
    out.push_str(&format!("-- {}: {}\n", heading(category, direction), name));
    out.push_str(&format!("-- Created: {}\n", created));
    if let Some(schema) = subschema {
        out.push_str(&format!("-- Schema: {}\n", schema));
    }
    out.push_str("--\n");

    let hint = match (category, direction) {
        (Category::Migrate, Direction::Apply) => format!(
            "-- Write the DDL for this change, e.g.\n\
             -- CREATE TABLE {t}example (\n\
             --     id SERIAL PRIMARY KEY,\n\
             --     name TEXT NOT NULL,\n\
             --     created_at TIMESTAMP NOT NULL DEFAULT now()\n\
             -- );\n",
            t = target
        ),
        (Category::Migrate, Direction::Revert) => format!(
            "-- Undo the DDL from the matching .up.sql, dependents first, e.g.\n\
             -- DROP TABLE IF EXISTS {t}example;\n",
            t = target
        ),
        (Category::Seed, Direction::Apply) => format!(
            "-- Write the DML that loads this data, e.g.\n\
             -- INSERT INTO {t}example (name) VALUES ('first'), ('second');\n",
            t = target
        ),
        (Category::Seed, Direction::Revert) => format!(
            "-- Remove the rows inserted by the matching .up.sql, e.g.\n\
             -- DELETE FROM {t}example WHERE name IN ('first', 'second');\n",
            t = target
        ),
    };
    out.push_str(&hint);
    out
}

fn heading(category: Category, direction: Direction) -> &'static str {
    match (category, direction) {
        (Category::Migrate, Direction::Apply) => "Migration",
        (Category::Migrate, Direction::Revert) => "Migration rollback",
        (Category::Seed, Direction::Apply) => "Seed",
        (Category::Seed, Direction::Revert) => "Seed rollback",
    }
}
