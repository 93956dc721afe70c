//! The `evalgrade scales` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use evalgrade_core::config::load_config_from;
use evalgrade_core::model::CourseType;
use evalgrade_core::scale::ScaleRegistry;

pub fn execute(course_type: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let registry = match config_path {
        Some(path) => load_config_from(Some(&path))?.registry,
        None => ScaleRegistry::builtin(),
    };

    let course_types = match course_type {
        Some(name) => vec![name.parse::<CourseType>()?],
        None => CourseType::ALL.to_vec(),
    };

    let mut table = Table::new();
    table.set_header(vec![
        "Course type",
        "Component",
        "Max",
        "Passing",
        "Conversion",
        "Weight",
        "Total pass",
    ]);

    for course_type in course_types {
        let scheme = registry.evaluation_scheme(course_type);
        let total_passing = registry.course_total_passing_marks(course_type);
        for scale in registry.defined_components(course_type) {
            let conversion = scale
                .conversion_factor
                .map(|f| f.to_string())
                .unwrap_or_else(|| "-".to_string());
            let weight = scheme
                .weight(scale.component)
                .map(|w| format!("{:.0}%", w * 100.0))
                .unwrap_or_default();
            table.add_row(vec![
                Cell::new(course_type),
                Cell::new(scale.component),
                Cell::new(scale.max_marks),
                Cell::new(scale.passing_marks),
                Cell::new(conversion),
                Cell::new(weight),
                Cell::new(total_passing),
            ]);
        }
    }

    println!("{table}");
    Ok(())
}
