//! Scale registry: maximum marks, passing marks and conversion factors per
//! (course type, component).
//!
//! The registry is an ordinary value handed to whatever needs it. Lookups
//! that miss fall back to a safe default so display code always has
//! something to render; the miss is logged rather than returned as an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ScoringError;
use crate::model::{Component, CourseType};

/// Max marks used when a (course type, component) pair is not registered.
pub const FALLBACK_MAX_MARKS: f64 = 100.0;
/// Passing marks used when a (course type, component) pair is not registered.
pub const FALLBACK_PASSING_MARKS: f64 = 40.0;
/// Aggregate pass threshold used for unregistered course types.
pub const FALLBACK_TOTAL_PASSING_MARKS: f64 = 40.0;

/// How one component is marked for one course type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentScale {
    pub component: Component,
    pub max_marks: f64,
    pub passing_marks: f64,
    /// Multiplier from the raw 0–50 CA total to `max_marks`. Only CA
    /// components carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_factor: Option<f64>,
}

impl ComponentScale {
    pub fn new(component: Component, max_marks: f64, passing_marks: f64) -> Self {
        Self {
            component,
            max_marks,
            passing_marks,
            conversion_factor: None,
        }
    }

    pub fn with_conversion(mut self, factor: f64) -> Self {
        self.conversion_factor = Some(factor);
        self
    }

    fn fallback(component: Component) -> Self {
        Self::new(component, FALLBACK_MAX_MARKS, FALLBACK_PASSING_MARKS)
    }
}

/// Components a course type is evaluated on, with each one's share of the
/// total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationScheme {
    pub course_type: CourseType,
    pub weights: BTreeMap<Component, f64>,
}

impl EvaluationScheme {
    pub fn supports(&self, component: Component) -> bool {
        self.weights.contains_key(&component)
    }

    pub fn components(&self) -> impl Iterator<Item = Component> + '_ {
        self.weights.keys().copied()
    }

    pub fn weight(&self, component: Component) -> Option<f64> {
        self.weights.get(&component).copied()
    }

    pub fn ca_components(&self) -> impl Iterator<Item = Component> + '_ {
        self.components().filter(|c| c.is_ca())
    }
}

/// Lookup table of component scales and aggregate pass thresholds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaleRegistry {
    scales: BTreeMap<CourseType, BTreeMap<Component, ComponentScale>>,
    total_passing: BTreeMap<CourseType, f64>,
}

impl ScaleRegistry {
    /// A registry with nothing registered; every lookup falls back.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The university's standard scales.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();

        let ca = |max: f64, pass: f64, factor: f64| {
            Component::CA.map(|c| ComponentScale::new(c, max, pass).with_conversion(factor))
        };

        registry.register_all(
            CourseType::Ug,
            ca(25.0, 10.0, 0.5)
                .into_iter()
                .chain([ComponentScale::new(Component::Assignment, 25.0, 10.0)]),
        );
        registry.register_all(
            CourseType::UgIntegrated,
            ca(20.0, 8.0, 0.4).into_iter().chain([
                ComponentScale::new(Component::Assignment, 10.0, 4.0),
                ComponentScale::new(Component::Lab, 30.0, 15.0),
            ]),
        );
        registry.register_all(
            CourseType::Pg,
            ca(30.0, 15.0, 0.6)
                .into_iter()
                .chain([ComponentScale::new(Component::Assignment, 10.0, 5.0)]),
        );
        registry.register_all(
            CourseType::PgIntegrated,
            ca(20.0, 10.0, 0.4).into_iter().chain([
                ComponentScale::new(Component::Assignment, 10.0, 5.0),
                ComponentScale::new(Component::Lab, 30.0, 15.0),
            ]),
        );
        for lab_only in [CourseType::UgLabOnly, CourseType::PgLabOnly] {
            registry.register_all(
                lab_only,
                [ComponentScale::new(Component::Lab, 100.0, 50.0)],
            );
        }

        for course_type in CourseType::ALL {
            registry.total_passing.insert(course_type, 50.0);
        }

        registry
    }

    fn register_all(
        &mut self,
        course_type: CourseType,
        scales: impl IntoIterator<Item = ComponentScale>,
    ) {
        let entry = self.scales.entry(course_type).or_default();
        for scale in scales {
            entry.insert(scale.component, scale);
        }
    }

    /// Replace (or add) one component scale.
    pub fn with_override(
        mut self,
        course_type: CourseType,
        scale: ComponentScale,
    ) -> Result<Self, ScoringError> {
        let valid = scale.max_marks > 0.0
            && scale.passing_marks >= 0.0
            && scale.passing_marks <= scale.max_marks;
        if !valid {
            return Err(ScoringError::InvalidScale {
                course_type,
                component: scale.component,
                passing: scale.passing_marks,
                max: scale.max_marks,
            });
        }
        self.register_all(course_type, [scale]);
        Ok(self)
    }

    /// Replace the aggregate pass threshold of a course type.
    pub fn with_total_passing(mut self, course_type: CourseType, marks: f64) -> Self {
        self.total_passing.insert(course_type, marks);
        self
    }

    /// Whether any component is registered for the course type.
    pub fn knows(&self, course_type: CourseType) -> bool {
        self.scales
            .get(&course_type)
            .is_some_and(|scales| !scales.is_empty())
    }

    /// Exact lookup with no fallback.
    pub fn lookup(&self, course_type: CourseType, component: Component) -> Option<&ComponentScale> {
        self.scales.get(&course_type)?.get(&component)
    }

    /// Scale for a component, or the 100/40 fallback on a miss.
    pub fn component_scale(&self, course_type: CourseType, component: Component) -> ComponentScale {
        match self.lookup(course_type, component) {
            Some(scale) => *scale,
            None => {
                tracing::warn!(
                    %course_type,
                    %component,
                    "no scale registered, using fallback {FALLBACK_MAX_MARKS}/{FALLBACK_PASSING_MARKS}"
                );
                ComponentScale::fallback(component)
            }
        }
    }

    /// Aggregate pass threshold for a course type, 40 if unregistered.
    pub fn course_total_passing_marks(&self, course_type: CourseType) -> f64 {
        match self.total_passing.get(&course_type) {
            Some(marks) => *marks,
            None => {
                tracing::warn!(
                    %course_type,
                    "no total passing marks registered, using fallback {FALLBACK_TOTAL_PASSING_MARKS}"
                );
                FALLBACK_TOTAL_PASSING_MARKS
            }
        }
    }

    /// Components registered for a course type, in component order.
    pub fn defined_components(&self, course_type: CourseType) -> Vec<ComponentScale> {
        self.scales
            .get(&course_type)
            .map(|scales| scales.values().copied().collect())
            .unwrap_or_default()
    }

    /// The supported components of a course type, weighted by max marks.
    pub fn evaluation_scheme(&self, course_type: CourseType) -> EvaluationScheme {
        let scales = self.defined_components(course_type);
        let total: f64 = scales.iter().map(|s| s.max_marks).sum();
        let weights = scales
            .iter()
            .map(|s| {
                let weight = if total > 0.0 { s.max_marks / total } else { 0.0 };
                (s.component, weight)
            })
            .collect();
        EvaluationScheme {
            course_type,
            weights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ug_ca_converts_to_25() {
        let registry = ScaleRegistry::builtin();
        let scale = registry.component_scale(CourseType::Ug, Component::Ca1);
        assert_eq!(scale.max_marks, 25.0);
        assert_eq!(scale.passing_marks, 10.0);
        assert_eq!(scale.conversion_factor, Some(0.5));
    }

    #[test]
    fn builtin_passing_never_exceeds_max() {
        let registry = ScaleRegistry::builtin();
        for course_type in CourseType::ALL {
            for scale in registry.defined_components(course_type) {
                assert!(scale.passing_marks <= scale.max_marks, "{course_type} {scale:?}");
            }
        }
    }

    #[test]
    fn unknown_component_falls_back() {
        let registry = ScaleRegistry::builtin();
        let scale = registry.component_scale(CourseType::UgLabOnly, Component::Ca1);
        assert_eq!(scale.max_marks, 100.0);
        assert_eq!(scale.passing_marks, 40.0);
        assert_eq!(scale.conversion_factor, None);
    }

    #[test]
    fn unknown_course_type_falls_back() {
        let registry = ScaleRegistry::empty();
        assert!(!registry.knows(CourseType::Pg));
        let scale = registry.component_scale(CourseType::Pg, Component::Lab);
        assert_eq!(scale.max_marks, 100.0);
        assert_eq!(registry.course_total_passing_marks(CourseType::Pg), 40.0);
    }

    #[test]
    fn schemes_sum_to_one() {
        let registry = ScaleRegistry::builtin();
        for course_type in CourseType::ALL {
            let scheme = registry.evaluation_scheme(course_type);
            let sum: f64 = scheme.weights.values().sum();
            assert!((sum - 1.0).abs() < 1e-9, "{course_type}: {sum}");
        }
    }

    #[test]
    fn lab_only_scheme_is_lab_alone() {
        let scheme = ScaleRegistry::builtin().evaluation_scheme(CourseType::PgLabOnly);
        let components: Vec<_> = scheme.components().collect();
        assert_eq!(components, vec![Component::Lab]);
        assert_eq!(scheme.weight(Component::Lab), Some(1.0));
        assert!(!scheme.supports(Component::Ca1));
    }

    #[test]
    fn integrated_lab_is_out_of_30() {
        let registry = ScaleRegistry::builtin();
        let lab = registry.component_scale(CourseType::UgIntegrated, Component::Lab);
        assert_eq!(lab.max_marks, 30.0);
        assert_eq!(registry.course_total_passing_marks(CourseType::UgIntegrated), 50.0);
    }

    #[test]
    fn override_replaces_scale() {
        let registry = ScaleRegistry::builtin()
            .with_override(
                CourseType::Ug,
                ComponentScale::new(Component::Ca1, 20.0, 8.0).with_conversion(0.4),
            )
            .unwrap()
            .with_total_passing(CourseType::Ug, 45.0);
        let scale = registry.component_scale(CourseType::Ug, Component::Ca1);
        assert_eq!(scale.max_marks, 20.0);
        assert_eq!(registry.course_total_passing_marks(CourseType::Ug), 45.0);
    }

    #[test]
    fn override_rejects_passing_above_max() {
        let result = ScaleRegistry::builtin().with_override(
            CourseType::Ug,
            ComponentScale::new(Component::Assignment, 10.0, 12.0),
        );
        assert!(matches!(result, Err(ScoringError::InvalidScale { .. })));
    }
}
