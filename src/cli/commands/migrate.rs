use crate::cli::utils::{output_reports, output_run_failure, output_status};
use crate::cli::{CategorySelector, OutputFormat};
use crate::config::MigrateConfig;
use crate::database::{DatabaseManager, PgDatabase};
use crate::error::MigrationError;
use crate::migration::{Direction, FsSource, MigrationRunner};

/// Resolve configuration and connect. The connection string is checked
/// before any file or ledger work happens.
async fn connect_runner(
    config: &MigrateConfig,
) -> anyhow::Result<MigrationRunner<PgDatabase, FsSource>> {
    config.require_database_url()?;

    let pool = DatabaseManager::connect(&config.database)
        .await
        .map_err(MigrationError::from)?;

    Ok(MigrationRunner::new(
        PgDatabase::new(pool),
        FsSource::new(config.store_layout()),
    ))
}

pub async fn handle_run(
    config: &MigrateConfig,
    selector: CategorySelector,
    direction: Direction,
    steps: Option<usize>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let categories = selector.categories(direction);
    if steps.is_some() && categories.len() > 1 {
        return Err(MigrationError::Config("--steps needs a single category".to_string()).into());
    }

    let runner = connect_runner(config).await?;
    let mut reports = Vec::new();

    for category in categories {
        match runner.run_steps(category, direction, steps).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                output_run_failure(&output_format, &reports, &e)?;
                return Err(e.into());
            }
        }
    }

    output_reports(&output_format, &reports)
}

pub async fn handle_status(
    config: &MigrateConfig,
    selector: CategorySelector,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let runner = connect_runner(config).await?;

    let mut statuses = Vec::new();
    for category in selector.categories(Direction::Apply) {
        statuses.extend(runner.status(category).await?);
    }

    output_status(&output_format, &statuses)
}
