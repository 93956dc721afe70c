//! The `evalgrade compare` command.

use std::path::PathBuf;

use anyhow::Result;

use evalgrade_core::report::EvaluationReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    let baseline = EvaluationReport::load_json(&baseline_path)?;
    let current = EvaluationReport::load_json(&current_path)?;

    if baseline.course.id != current.course.id {
        tracing::warn!(
            baseline = %baseline.course.id,
            current = %current.course.id,
            "comparing reports of different courses"
        );
    }

    let comparison = current.compare(&baseline);

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&comparison)?);
        }
        _ => {
            println!(
                "Comparison: {} newly failing, {} newly passing, {} unchanged",
                comparison.newly_failed.len(),
                comparison.newly_passed.len(),
                comparison.unchanged
            );

            if !comparison.newly_failed.is_empty() {
                println!("\nNewly failing:");
                for c in &comparison.newly_failed {
                    println!(
                        "  {} {} -> {} ({:+})",
                        c.student_id,
                        c.baseline_total,
                        c.current_total,
                        c.current_total - c.baseline_total
                    );
                }
            }

            if !comparison.newly_passed.is_empty() {
                println!("\nNewly passing:");
                for c in &comparison.newly_passed {
                    println!(
                        "  {} {} -> {} ({:+})",
                        c.student_id,
                        c.baseline_total,
                        c.current_total,
                        c.current_total - c.baseline_total
                    );
                }
            }

            if comparison.new_students > 0 {
                println!("\n{} new student(s)", comparison.new_students);
            }
            if comparison.removed_students > 0 {
                println!("{} removed student(s)", comparison.removed_students);
            }
        }
    }

    if fail_on_regression && comparison.has_new_failures() {
        std::process::exit(1);
    }

    Ok(())
}
