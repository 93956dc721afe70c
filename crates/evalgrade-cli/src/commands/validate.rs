//! The `evalgrade validate` command.

use std::path::PathBuf;

use anyhow::Result;

use evalgrade_core::config::{load_config_from, validate_config, Severity};

pub fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let scheme = config.registry.evaluation_scheme(config.course_type);
    let components: Vec<String> = scheme.components().map(|c| c.to_string()).collect();

    println!(
        "Course: {} ({}, {}) components: {}",
        config.course_id,
        config.course_type,
        config.academic_year,
        components.join(", ")
    );

    let issues = validate_config(&config);
    let mut errors = 0;
    for issue in &issues {
        let prefix = issue
            .component
            .map(|c| format!("  [{c}]"))
            .unwrap_or_else(|| "  ".to_string());
        let label = match issue.severity {
            Severity::Error => {
                errors += 1;
                "ERROR"
            }
            Severity::Warning => "WARNING",
        };
        println!("{prefix} {label}: {}", issue.message);
    }

    if issues.is_empty() {
        println!("Configuration valid.");
    } else {
        println!("\n{} issue(s) found.", issues.len());
    }

    if errors > 0 {
        anyhow::bail!("{errors} configuration error(s)");
    }

    Ok(())
}
