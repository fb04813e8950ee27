use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::MigrateConfig;
use crate::migration::{Category, MigrationGenerator};

pub fn handle(
    config: &MigrateConfig,
    category: &str,
    description: &str,
    schema: Option<&str>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let category: Category = category.parse()?;

    let generator = MigrationGenerator::new(config.store_layout());
    let pair = generator.generate(category, description, schema)?;

    output_success(
        &output_format,
        &format!(
            "Created {} {}\n  {}\n  {}",
            pair.category,
            pair.name,
            pair.up.display(),
            pair.down.display()
        ),
        Some(json!({ "generated": pair })),
    )
}
