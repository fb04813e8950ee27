use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::error::MigrationError;
use crate::migration::{RunReport, UnitState, UnitStatus};

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(Value::Object(fields)) = data {
                if let Some(object) = response.as_object_mut() {
                    object.extend(fields);
                }
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// JSON body for a failed command. Text-mode failures are printed by the
/// binary as `Error: ...` on stderr.
pub fn error_response(message: &str, error_code: &str, data: Option<Value>) -> Value {
    let mut response = json!({
        "success": false,
        "error": message,
        "error_code": error_code
    });

    if let Some(Value::Object(fields)) = data {
        if let Some(object) = response.as_object_mut() {
            object.extend(fields);
        }
    }
    response
}

/// Print the reports of a finished batch
pub fn output_reports(output_format: &OutputFormat, reports: &[RunReport]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let message = reports
                .iter()
                .map(|r| format!("{}: {}", r.category, r.summary()))
                .collect::<Vec<_>>()
                .join("; ");
            output_success(output_format, &message, Some(json!({ "reports": reports })))
        }
        OutputFormat::Text => {
            for report in reports {
                let message = format!("{}: {}", report.category, report.summary());
                output_success(output_format, &message, None)?;
            }
            Ok(())
        }
    }
}

/// Report a halted batch: what finished before the failure, and the failure
pub fn output_run_failure(
    output_format: &OutputFormat,
    reports: &[RunReport],
    err: &MigrationError,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let response = error_response(
                &err.to_string(),
                err.error_code(),
                Some(json!({
                    "reports": reports,
                    "failed_unit": err.failed_unit(),
                    "completed": err.completed(),
                })),
            );
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        OutputFormat::Text => {
            for report in reports {
                println!("✓ {}: {}", report.category, report.summary());
            }
            if !err.completed().is_empty() {
                println!("Completed before failure: {}", err.completed().join(", "));
            }
            Ok(())
        }
    }
}

/// Print one line per unit
pub fn output_status(output_format: &OutputFormat, statuses: &[UnitStatus]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "units": statuses }))?);
        }
        OutputFormat::Text => {
            if statuses.is_empty() {
                println!("No units found");
                return Ok(());
            }
            for status in statuses {
                let state = match status.state {
                    UnitState::Applied => "applied ",
                    UnitState::Pending => "pending ",
                    UnitState::Orphaned => "orphaned",
                };
                let when = status
                    .executed_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                let note = if status.has_forward && !status.has_reverse {
                    "  (no .down.sql)"
                } else {
                    ""
                };
                println!(
                    "{:<7} {} {:<19} {}{}",
                    status.category, state, when, status.name, note
                );
            }
        }
    }
    Ok(())
}
