pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::config;
use crate::migration::{Category, Direction};

#[derive(Parser)]
#[command(name = "migrate")]
#[command(about = "Apply, revert and scaffold timestamped SQL migrations and seeds")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Database URL override (defaults to DATABASE_URL)")]
    pub database_url: Option<String>,

    #[arg(long, global = true, help = "Directory holding migration scripts")]
    pub migrations_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory holding seed scripts")]
    pub seeds_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending units in timestamp order")]
    Apply {
        #[arg(long, value_enum, default_value = "migrate", help = "Which units to apply")]
        category: CategorySelector,
        #[arg(long, help = "Apply at most this many units")]
        steps: Option<usize>,
    },

    #[command(about = "Revert applied units, newest first")]
    Revert {
        #[arg(long, value_enum, default_value = "migrate", help = "Which units to revert")]
        category: CategorySelector,
        #[arg(long, help = "Revert at most this many units")]
        steps: Option<usize>,
    },

    #[command(about = "Show applied and pending units")]
    Status {
        #[arg(long, value_enum, default_value = "all", help = "Which units to list")]
        category: CategorySelector,
    },

    #[command(about = "Create an empty up/down script pair")]
    Generate {
        #[arg(help = "Category: 'migrate' or 'seed'")]
        category: String,
        #[arg(help = "snake_case description, e.g. create_users_table")]
        description: String,
        #[arg(long, help = "Target schema label written into the template comments")]
        schema: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategorySelector {
    Migrate,
    Seed,
    All,
}

impl CategorySelector {
    /// Categories to run, in the order `direction` requires: seeds depend on
    /// the schema, so they apply after it and revert before it.
    pub fn categories(&self, direction: Direction) -> Vec<Category> {
        match (self, direction) {
            (CategorySelector::Migrate, _) => vec![Category::Migrate],
            (CategorySelector::Seed, _) => vec![Category::Seed],
            (CategorySelector::All, Direction::Apply) => vec![Category::Migrate, Category::Seed],
            (CategorySelector::All, Direction::Revert) => vec![Category::Seed, Category::Migrate],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = config()
        .clone()
        .with_overrides(cli.database_url, cli.migrations_dir, cli.seeds_dir);

    match cli.command {
        Commands::Apply { category, steps } => {
            let direction = Direction::Apply;
            commands::migrate::handle_run(&config, category, direction, steps, output_format).await
        }
        Commands::Revert { category, steps } => {
            let direction = Direction::Revert;
            commands::migrate::handle_run(&config, category, direction, steps, output_format).await
        }
        Commands::Status { category } => {
            commands::migrate::handle_status(&config, category, output_format).await
        }
        Commands::Generate { category, description, schema } => commands::generate::handle(
            &config,
            &category,
            &description,
            schema.as_deref(),
            output_format,
        ),
    }
}
