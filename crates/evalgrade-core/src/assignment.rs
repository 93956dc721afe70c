//! Assignment scores: one value capped at the component's max marks.

use serde::{Deserialize, Serialize};

use crate::model::{Component, CourseType};
use crate::scale::ScaleRegistry;

/// Clamp a mark into `[0, max]`.
///
/// NaN becomes 0 and infinities land on the nearest bound. A non-positive
/// or non-finite `max` clamps everything to 0, so the result is always a
/// usable number.
pub fn clamp_marks(value: f64, max: f64) -> f64 {
    let max = if max.is_finite() && max > 0.0 { max } else { 0.0 };
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentScore {
    pub max_marks: f64,
    pub obtained_marks: f64,
}

impl AssignmentScore {
    /// An empty score on the course type's assignment scale.
    pub fn new(registry: &ScaleRegistry, course_type: CourseType) -> Self {
        let scale = registry.component_scale(course_type, Component::Assignment);
        Self {
            max_marks: scale.max_marks,
            obtained_marks: 0.0,
        }
    }

    /// Record marks, clamped to `[0, max_marks]`.
    pub fn set(&mut self, value: f64) -> f64 {
        self.obtained_marks = clamp_marks(value, self.max_marks);
        self.obtained_marks
    }

    /// The counted score. Assignments have no conversion.
    pub fn scaled(&self) -> f64 {
        clamp_marks(self.obtained_marks, self.max_marks)
    }
}
