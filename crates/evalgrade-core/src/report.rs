//! Evaluation reports with JSON persistence and status comparison.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{config_gaps, CourseConfig};
use crate::evaluator::{Evaluator, PassStatus, TotalResult};
use crate::model::{Component, CourseType};
use crate::record::{RecordCodec, ScoreRecord};

/// Pass/fail results of every student of a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub course: CourseSummary,
    /// One result per student, ordered by student id.
    pub results: Vec<StudentResult>,
    pub summary: ReportSummary,
    /// Configuration problems that affected the numbers.
    #[serde(default)]
    pub config_gaps: Vec<String>,
}

/// The course a report was computed for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub course_type: CourseType,
    pub academic_year: String,
    pub passing_threshold: f64,
    pub components: Vec<ComponentSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSummary {
    pub component: Component,
    pub max_marks: f64,
    pub passing_marks: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResult {
    pub student_id: String,
    #[serde(flatten)]
    pub result: TotalResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub students: usize,
    pub passed: usize,
    pub failed: usize,
    pub average_total: f64,
    pub pass_rate: f64,
}

impl ReportSummary {
    pub fn from_results(results: &[StudentResult]) -> Self {
        let students = results.len();
        if students == 0 {
            return Self::default();
        }
        let passed = results
            .iter()
            .filter(|r| r.result.status == PassStatus::Pass)
            .count();
        let total: f64 = results.iter().map(|r| r.result.total).sum();
        Self {
            students,
            passed,
            failed: students - passed,
            average_total: total / students as f64,
            pass_rate: passed as f64 / students as f64,
        }
    }
}

impl EvaluationReport {
    /// Reconstruct and evaluate every record of the configured academic year.
    pub fn from_records(config: &CourseConfig, records: &[ScoreRecord]) -> Self {
        let evaluator = Evaluator::new(&config.registry, config.course_type);
        let codec = RecordCodec::new(&config.registry, config.course_type, &config.weights);

        let mut by_student: BTreeMap<String, StudentResult> = BTreeMap::new();
        let mut fallback_components: BTreeSet<Component> = BTreeSet::new();
        let mut flat_only: BTreeMap<Component, BTreeSet<String>> = BTreeMap::new();
        for record in records {
            if record.academic_year != config.academic_year {
                tracing::debug!(
                    student = %record.student_id,
                    year = %record.academic_year,
                    "skipping record from another academic year"
                );
                continue;
            }
            for component in codec.flat_only_components(record) {
                flat_only
                    .entry(component)
                    .or_default()
                    .insert(record.student_id.clone());
            }
            let set = codec.decode(record);
            fallback_components.extend(
                set.ca
                    .iter()
                    .filter(|(_, score)| score.conversion_fallback)
                    .map(|(component, _)| *component),
            );
            if by_student.contains_key(&set.student_id) {
                tracing::warn!(student = %set.student_id, "duplicate record, keeping the last one");
            }
            by_student.insert(
                set.student_id.clone(),
                StudentResult {
                    student_id: set.student_id.clone(),
                    result: evaluator.evaluate(&set),
                },
            );
        }

        let mut gaps = config_gaps(config);
        if !fallback_components.is_empty() {
            tracing::warn!(
                components = ?fallback_components,
                "scores were converted with the fallback conversion factor"
            );
        }
        for component in evaluator.scheme().ca_components() {
            let configured = config.weights.get(&component).is_some_and(|w| w.configured);
            if !configured {
                gaps.push(format!(
                    "{component} part weights are not configured; stored detail was bounded by the default weights"
                ));
            }
        }

        for (component, students) in flat_only {
            let students: Vec<String> = students.into_iter().collect();
            gaps.push(format!(
                "{component} stored scores without question detail were counted as 0 for: {}",
                students.join(", ")
            ));
        }

        let results: Vec<StudentResult> = by_student.into_values().collect();
        let summary = ReportSummary::from_results(&results);

        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            course: CourseSummary {
                id: config.course_id.clone(),
                name: config.name.clone(),
                course_type: config.course_type,
                academic_year: config.academic_year.clone(),
                passing_threshold: evaluator.passing_threshold(),
                components: evaluator
                    .scheme()
                    .components()
                    .map(|component| {
                        let scale = config.registry.component_scale(config.course_type, component);
                        ComponentSummary {
                            component,
                            max_marks: scale.max_marks,
                            passing_marks: scale.passing_marks,
                        }
                    })
                    .collect(),
            },
            results,
            summary,
            config_gaps: gaps,
        }
    }

    pub fn result(&self, student_id: &str) -> Option<&TotalResult> {
        self.results
            .iter()
            .find(|r| r.student_id == student_id)
            .map(|r| &r.result)
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: EvaluationReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare this report against a baseline to find status changes.
    pub fn compare(&self, baseline: &EvaluationReport) -> StatusComparison {
        let statuses = |report: &EvaluationReport| -> BTreeMap<String, (PassStatus, f64)> {
            report
                .results
                .iter()
                .map(|r| (r.student_id.clone(), (r.result.status, r.result.total)))
                .collect()
        };
        let before = statuses(baseline);
        let after = statuses(self);

        let mut comparison = StatusComparison::default();
        for (student, (status, total)) in &after {
            let Some((previous, previous_total)) = before.get(student) else {
                comparison.new_students += 1;
                continue;
            };
            let change = StatusChange {
                student_id: student.clone(),
                baseline_total: *previous_total,
                current_total: *total,
            };
            match (previous, status) {
                (PassStatus::Fail, PassStatus::Pass) => comparison.newly_passed.push(change),
                (PassStatus::Pass, PassStatus::Fail) => comparison.newly_failed.push(change),
                _ => comparison.unchanged += 1,
            }
        }
        comparison.removed_students = before.keys().filter(|k| !after.contains_key(*k)).count();
        comparison
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!(
            "## {} ({}, {})\n\n",
            self.course.id, self.course.course_type, self.course.academic_year
        ));
        md.push_str(&format!(
            "**Summary:** {} passed, {} failed of {} (average {:.1}, pass mark {})\n\n",
            self.summary.passed,
            self.summary.failed,
            self.summary.students,
            self.summary.average_total,
            self.course.passing_threshold
        ));

        md.push_str("| Student |");
        for c in &self.course.components {
            md.push_str(&format!(" {} |", c.component));
        }
        md.push_str(" Total | Status |\n|---------|");
        for _ in &self.course.components {
            md.push_str("------|");
        }
        md.push_str("-------|--------|\n");

        for r in &self.results {
            md.push_str(&format!("| {} |", r.student_id));
            for c in &self.course.components {
                let scaled = r.result.per_component_scaled.get(&c.component).copied();
                md.push_str(&format!(" {} |", scaled.unwrap_or(0.0)));
            }
            md.push_str(&format!(" {} | {} |\n", r.result.total, r.result.status));
        }

        if !self.config_gaps.is_empty() {
            md.push_str("\n### Configuration gaps\n\n");
            for gap in &self.config_gaps {
                md.push_str(&format!("- {gap}\n"));
            }
        }
        md
    }
}

/// Result of comparing two reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusComparison {
    /// Students who failed in the baseline and pass now.
    pub newly_passed: Vec<StatusChange>,
    /// Students who passed in the baseline and fail now.
    pub newly_failed: Vec<StatusChange>,
    pub unchanged: usize,
    /// Students in current but not baseline.
    pub new_students: usize,
    /// Students in baseline but not current.
    pub removed_students: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub student_id: String,
    pub baseline_total: f64,
    pub current_total: f64,
}

impl StatusComparison {
    pub fn has_new_failures(&self) -> bool {
        !self.newly_failed.is_empty()
    }
}
