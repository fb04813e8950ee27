use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{Category, Direction, MigrationUnit};
use crate::error::MigrationError;

/// Where scripts come from. Both listings are ascending by name; the runner
/// walks the reverse listing back to front.
pub trait MigrationSource: Send + Sync {
    fn list_forward(&self, category: Category) -> Result<Vec<MigrationUnit>, MigrationError>;

    fn list_reverse(&self, category: Category) -> Result<Vec<MigrationUnit>, MigrationError>;
}

/// One directory per category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub migrations_dir: PathBuf,
    pub seeds_dir: PathBuf,
}

impl StoreLayout {
    pub fn new(migrations_dir: impl Into<PathBuf>, seeds_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            seeds_dir: seeds_dir.into(),
        }
    }

    pub fn dir_for(&self, category: Category) -> &Path {
        match category {
            Category::Migrate => &self.migrations_dir,
            Category::Seed => &self.seeds_dir,
        }
    }
}

/// Filesystem-backed store: `<name>.up.sql` / `<name>.down.sql`
#[derive(Debug, Clone)]
pub struct FsSource {
    layout: StoreLayout,
}

impl FsSource {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Unit names having a script for `direction`, sorted lexicographically
    pub fn names(
        &self,
        category: Category,
        direction: Direction,
    ) -> Result<Vec<String>, MigrationError> {
        let dir = self.layout.dir_for(category);
        if !dir.exists() {
            warn!("{} directory {} does not exist", category, dir.display());
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(dir).map_err(|e| MigrationError::io(dir, e))?;
        let mut names = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| MigrationError::io(dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
                debug!("Skipping non UTF-8 file name {}", path.display());
                continue;
            };

            if let Some(name) = file_name.strip_suffix(direction.suffix()) {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    fn load(
        &self,
        category: Category,
        direction: Direction,
    ) -> Result<Vec<MigrationUnit>, MigrationError> {
        let dir = self.layout.dir_for(category);
        let names = self.names(category, direction)?;
        debug!("Found {} {} scripts in {}", names.len(), direction.suffix(), dir.display());

        names
            .into_iter()
            .map(|name| {
                let path = dir.join(format!("{}{}", name, direction.suffix()));
                let sql = fs::read_to_string(&path).map_err(|e| MigrationError::io(&path, e))?;
                Ok(MigrationUnit::new(name, category, direction, sql, path.display().to_string()))
            })
            .collect()
    }
}

impl MigrationSource for FsSource {
    fn list_forward(&self, category: Category) -> Result<Vec<MigrationUnit>, MigrationError> {
        self.load(category, Direction::Apply)
    }

    fn list_reverse(&self, category: Category) -> Result<Vec<MigrationUnit>, MigrationError> {
        self.load(category, Direction::Revert)
    }
}
