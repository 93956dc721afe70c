//! Aggregation and pass/fail evaluation.
//!
//! Totals are always derived from the current component scores. Only
//! components in the course's evaluation scheme are counted or shown;
//! anything else found in a student's data is dropped.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assignment::AssignmentScore;
use crate::ca::StudentCaScore;
use crate::lab::{lab_scale_max, LabScore};
use crate::model::{Component, CourseType};
use crate::scale::{EvaluationScheme, ScaleRegistry};

/// Fraction of the LAB maximum a lab-constrained course must reach.
pub const LAB_PASS_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PassStatus {
    Pass,
    Fail,
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassStatus::Pass => write!(f, "PASS"),
            PassStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// A student's derived result. Never stored; recompute instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalResult {
    pub per_component_scaled: BTreeMap<Component, f64>,
    pub total: f64,
    pub passing_threshold: f64,
    pub status: PassStatus,
    /// `None` when the course has no lab condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_condition_met: Option<bool>,
}

/// Every score a student holds for one course and academic year.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentComponentSet {
    pub student_id: String,
    pub academic_year: String,
    pub ca: BTreeMap<Component, StudentCaScore>,
    pub lab: Option<LabScore>,
    pub assignment: Option<AssignmentScore>,
}

impl StudentComponentSet {
    /// All-zero scores for every component in the course's scheme.
    pub fn empty(
        student_id: impl Into<String>,
        academic_year: impl Into<String>,
        registry: &ScaleRegistry,
        course_type: CourseType,
    ) -> Self {
        let scheme = registry.evaluation_scheme(course_type);
        Self {
            student_id: student_id.into(),
            academic_year: academic_year.into(),
            ca: scheme
                .ca_components()
                .map(|c| (c, StudentCaScore::empty()))
                .collect(),
            lab: scheme
                .supports(Component::Lab)
                .then(|| LabScore::new(registry, course_type)),
            assignment: scheme
                .supports(Component::Assignment)
                .then(|| AssignmentScore::new(registry, course_type)),
        }
    }

    /// Scaled score of one component, if the student has data for it.
    pub fn scaled(&self, component: Component) -> Option<f64> {
        match component {
            Component::Ca1 | Component::Ca2 | Component::Ca3 => {
                self.ca.get(&component).map(|s| s.converted)
            }
            Component::Lab => self.lab.as_ref().map(LabScore::scaled),
            Component::Assignment => self.assignment.as_ref().map(AssignmentScore::scaled),
        }
    }

    /// Components with data, in component order.
    pub fn present_components(&self) -> Vec<Component> {
        Component::ALL
            .into_iter()
            .filter(|c| self.scaled(*c).is_some())
            .collect()
    }

    /// Drop data for components outside the scheme. Returns what was dropped.
    pub fn retain_scheme(&mut self, scheme: &EvaluationScheme) -> Vec<Component> {
        let stray: Vec<Component> = self
            .present_components()
            .into_iter()
            .filter(|c| !scheme.supports(*c))
            .collect();
        for component in &stray {
            tracing::warn!(
                student = %self.student_id,
                %component,
                course_type = %scheme.course_type,
                "dropping score for component outside the evaluation scheme"
            );
            match component {
                Component::Lab => self.lab = None,
                Component::Assignment => self.assignment = None,
                ca => {
                    self.ca.remove(ca);
                }
            }
        }
        stray
    }
}

/// Applies one course type's aggregation and pass rule.
#[derive(Debug, Clone)]
pub struct Evaluator {
    course_type: CourseType,
    scheme: EvaluationScheme,
    threshold: f64,
    lab_max: f64,
}

impl Evaluator {
    pub fn new(registry: &ScaleRegistry, course_type: CourseType) -> Self {
        Self {
            course_type,
            scheme: registry.evaluation_scheme(course_type),
            threshold: registry.course_total_passing_marks(course_type),
            lab_max: lab_scale_max(registry, course_type),
        }
    }

    pub fn course_type(&self) -> CourseType {
        self.course_type
    }

    pub fn scheme(&self) -> &EvaluationScheme {
        &self.scheme
    }

    pub fn passing_threshold(&self) -> f64 {
        self.threshold
    }

    fn lab_condition_applies(&self) -> bool {
        self.course_type.is_lab_constrained() && self.scheme.supports(Component::Lab)
    }

    /// Evaluate already-scaled component scores.
    ///
    /// Components outside the scheme are ignored; scheme components with no
    /// score count as 0.
    pub fn evaluate_scores(&self, scaled: &BTreeMap<Component, f64>) -> TotalResult {
        for component in scaled.keys().filter(|c| !self.scheme.supports(**c)) {
            tracing::warn!(
                %component,
                course_type = %self.course_type,
                "ignoring score for component outside the evaluation scheme"
            );
        }

        let per_component_scaled: BTreeMap<Component, f64> = self
            .scheme
            .components()
            .map(|c| {
                let value = scaled.get(&c).copied().filter(|v| v.is_finite());
                (c, value.unwrap_or(0.0))
            })
            .collect();
        let total: f64 = per_component_scaled.values().sum();

        let meets_total = total >= self.threshold;
        let lab_condition_met = self.lab_condition_applies().then(|| {
            let lab = per_component_scaled
                .get(&Component::Lab)
                .copied()
                .unwrap_or(0.0);
            lab >= LAB_PASS_FRACTION * self.lab_max
        });

        let status = if meets_total && lab_condition_met.unwrap_or(true) {
            PassStatus::Pass
        } else {
            PassStatus::Fail
        };

        TotalResult {
            per_component_scaled,
            total,
            passing_threshold: self.threshold,
            status,
            lab_condition_met,
        }
    }

    /// Evaluate a student's full component set.
    pub fn evaluate(&self, set: &StudentComponentSet) -> TotalResult {
        let scaled: BTreeMap<Component, f64> = set
            .present_components()
            .into_iter()
            .filter_map(|c| set.scaled(c).map(|v| (c, v)))
            .collect();
        self.evaluate_scores(&scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(Component, f64)]) -> BTreeMap<Component, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn ug_passes_on_total_alone() {
        let registry = ScaleRegistry::builtin();
        let evaluator = Evaluator::new(&registry, CourseType::Ug);
        let result = evaluator.evaluate_scores(&scores(&[
            (Component::Ca1, 12.0),
            (Component::Ca2, 13.0),
            (Component::Ca3, 10.0),
            (Component::Assignment, 15.0),
        ]));
        assert_eq!(result.total, 50.0);
        assert_eq!(result.status, PassStatus::Pass);
        assert_eq!(result.lab_condition_met, None);
    }

    #[test]
    fn stray_component_is_excluded_from_total_and_display() {
        let registry = ScaleRegistry::builtin();
        let evaluator = Evaluator::new(&registry, CourseType::Ug);
        let result = evaluator.evaluate_scores(&scores(&[
            (Component::Ca1, 10.0),
            (Component::Lab, 30.0),
        ]));
        assert_eq!(result.total, 10.0);
        assert!(!result.per_component_scaled.contains_key(&Component::Lab));
        assert_eq!(result.per_component_scaled.get(&Component::Ca2), Some(&0.0));
        assert_eq!(result.status, PassStatus::Fail);
    }

    #[test]
    fn integrated_fails_on_weak_lab_despite_total() {
        let registry = ScaleRegistry::builtin();
        let evaluator = Evaluator::new(&registry, CourseType::UgIntegrated);
        let result = evaluator.evaluate_scores(&scores(&[
            (Component::Ca1, 20.0),
            (Component::Ca2, 20.0),
            (Component::Ca3, 18.0),
            (Component::Assignment, 10.0),
            (Component::Lab, 14.0),
        ]));
        assert_eq!(result.total, 82.0);
        assert_eq!(result.lab_condition_met, Some(false));
        assert_eq!(result.status, PassStatus::Fail);
    }

    #[test]
    fn integrated_fails_on_total_despite_strong_lab() {
        let registry = ScaleRegistry::builtin();
        let evaluator = Evaluator::new(&registry, CourseType::PgIntegrated);
        let result = evaluator.evaluate_scores(&scores(&[(Component::Lab, 30.0)]));
        assert_eq!(result.lab_condition_met, Some(true));
        assert_eq!(result.status, PassStatus::Fail);
    }

    #[test]
    fn integrated_passes_when_both_hold() {
        let registry = ScaleRegistry::builtin();
        let evaluator = Evaluator::new(&registry, CourseType::UgIntegrated);
        let result = evaluator.evaluate_scores(&scores(&[
            (Component::Ca1, 10.0),
            (Component::Ca2, 10.0),
            (Component::Ca3, 10.0),
            (Component::Lab, 15.0),
        ]));
        assert_eq!(result.total, 45.0);
        assert_eq!(result.status, PassStatus::Fail);

        let result = evaluator.evaluate_scores(&scores(&[
            (Component::Ca1, 12.0),
            (Component::Ca2, 10.0),
            (Component::Ca3, 10.0),
            (Component::Assignment, 3.0),
            (Component::Lab, 15.0),
        ]));
        assert_eq!(result.total, 50.0);
        assert_eq!(result.status, PassStatus::Pass);
    }

    #[test]
    fn pg_lab_only_seventy_five_passes() {
        let registry = ScaleRegistry::builtin();
        let evaluator = Evaluator::new(&registry, CourseType::PgLabOnly);
        let result = evaluator.evaluate_scores(&scores(&[(Component::Lab, 75.0)]));
        assert_eq!(result.total, 75.0);
        assert_eq!(result.lab_condition_met, Some(true));
        assert_eq!(result.status, PassStatus::Pass);
    }

    #[test]
    fn empty_set_has_scheme_components_only() {
        let registry = ScaleRegistry::builtin();
        let set = StudentComponentSet::empty("s1", "2024-25", &registry, CourseType::UgLabOnly);
        assert!(set.ca.is_empty());
        assert!(set.assignment.is_none());
        assert_eq!(set.present_components(), vec![Component::Lab]);

        let result = Evaluator::new(&registry, CourseType::UgLabOnly).evaluate(&set);
        assert_eq!(result.total, 0.0);
        assert_eq!(result.status, PassStatus::Fail);
    }

    #[test]
    fn retain_scheme_drops_stray_data() {
        let registry = ScaleRegistry::builtin();
        let mut set = StudentComponentSet::empty("s1", "2024-25", &registry, CourseType::UgIntegrated);
        let scheme = registry.evaluation_scheme(CourseType::Ug);
        let dropped = set.retain_scheme(&scheme);
        assert_eq!(dropped, vec![Component::Lab]);
        assert!(set.lab.is_none());
        assert_eq!(set.ca.len(), 3);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let registry = ScaleRegistry::builtin();
        let evaluator = Evaluator::new(&registry, CourseType::Pg);
        let input = scores(&[(Component::Ca1, 22.0), (Component::Assignment, 7.0)]);
        assert_eq!(evaluator.evaluate_scores(&input), evaluator.evaluate_scores(&input));
    }

    #[test]
    fn non_finite_scores_count_as_zero() {
        let registry = ScaleRegistry::builtin();
        let evaluator = Evaluator::new(&registry, CourseType::Pg);
        let result = evaluator.evaluate_scores(&scores(&[(Component::Ca1, f64::NAN)]));
        assert_eq!(result.total, 0.0);
    }

    #[test]
    fn result_serializes_status_uppercase() {
        let registry = ScaleRegistry::builtin();
        let result = Evaluator::new(&registry, CourseType::PgLabOnly)
            .evaluate_scores(&scores(&[(Component::Lab, 75.0)]));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "PASS");
        assert_eq!(json["perComponentScaled"]["LAB"], 75.0);
        assert_eq!(json["labConditionMet"], true);
    }
}
