//! The `evalgrade evaluate` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Color, Table};

use evalgrade_core::config::load_config_from;
use evalgrade_core::evaluator::PassStatus;
use evalgrade_core::report::EvaluationReport;

pub fn execute(
    records_path: PathBuf,
    config_path: Option<PathBuf>,
    format: String,
    output: Option<PathBuf>,
    fail_on_fail: bool,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let records = super::load_records(&records_path)?;

    tracing::info!(
        course = %config.course_id,
        course_type = %config.course_type,
        records = records.len(),
        "evaluating"
    );
    let report = EvaluationReport::from_records(&config, &records);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "markdown" | "md" => println!("{}", report.to_markdown()),
        _ => print_table(&report),
    }

    if let Some(path) = output {
        report.save_json(&path)?;
        eprintln!("Report saved to {}", path.display());
    }

    if fail_on_fail && report.summary.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn print_table(report: &EvaluationReport) {
    let mut table = Table::new();
    let mut header = vec!["Student".to_string()];
    header.extend(
        report
            .course
            .components
            .iter()
            .map(|c| format!("{} /{}", c.component, c.max_marks)),
    );
    header.extend(["Total".to_string(), "Status".to_string()]);
    table.set_header(header);

    for r in &report.results {
        let mut row = vec![Cell::new(&r.student_id)];
        for c in &report.course.components {
            let scaled = r
                .result
                .per_component_scaled
                .get(&c.component)
                .copied()
                .unwrap_or(0.0);
            row.push(Cell::new(scaled));
        }
        row.push(Cell::new(r.result.total));
        let color = match r.result.status {
            PassStatus::Pass => Color::Green,
            PassStatus::Fail => Color::Red,
        };
        let mut status = r.result.status.to_string();
        if r.result.lab_condition_met == Some(false) {
            status.push_str(" (lab)");
        }
        row.push(Cell::new(status).fg(color));
        table.add_row(row);
    }

    println!(
        "{} ({}, {}), pass mark {}",
        report.course.id,
        report.course.course_type,
        report.course.academic_year,
        report.course.passing_threshold
    );
    println!("{table}");
    println!(
        "{} passed, {} failed, average total {:.1}",
        report.summary.passed, report.summary.failed, report.summary.average_total
    );
    for gap in &report.config_gaps {
        println!("WARNING: {gap}");
    }
}
