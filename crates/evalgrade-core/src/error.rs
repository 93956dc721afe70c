//! Scoring error types.
//!
//! Out-of-range marks are never errors: they are clamped where they enter the
//! engine. The variants here cover configuration problems, lab-session
//! structure violations and persistence failures, all of which are reported
//! to the faculty member entering scores.

use thiserror::Error;

use crate::model::{Component, CourseType};

/// Errors raised by the scoring engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    /// Configured part weights add up to more than 50.
    #[error("part weights total {sum:.2}, which exceeds the maximum of 50 by {excess:.2}")]
    WeightSumExceeded { sum: f64, excess: f64 },

    /// A part weight is negative or not a number.
    #[error("part weight for {part} must be a non-negative number, got {value}")]
    InvalidWeight { part: String, value: f64 },

    /// A part key outside `I..V` × `a..d`.
    #[error("unknown question part: {0}")]
    UnknownPart(String),

    /// A course type name that is not part of the fixed enumeration.
    #[error("unknown course type: {0}")]
    UnknownCourseType(String),

    /// A component name that is not part of the fixed enumeration.
    #[error("unknown component: {0}")]
    UnknownComponent(String),

    /// A scale override whose passing marks exceed its maximum.
    #[error("invalid scale for {component} in {course_type}: passing marks {passing} exceed max marks {max}")]
    InvalidScale {
        course_type: CourseType,
        component: Component,
        passing: f64,
        max: f64,
    },

    /// Part weights for a CA component have not been configured yet.
    #[error("{component} part weights for course {course_id} must be configured before scores can be entered")]
    ConfigurationRequired { course_id: String, component: Component },

    /// The component is not part of the course's evaluation scheme.
    #[error("{component} is not evaluated for {course_type} courses")]
    UnsupportedComponent {
        course_type: CourseType,
        component: Component,
    },

    /// An entry operation for one kind of component was used on another.
    #[error("{operation} is not available while entering {component} scores")]
    ComponentMismatch {
        component: Component,
        operation: &'static str,
    },

    /// Removing a lab session would leave fewer than the minimum.
    #[error("at least {minimum} lab sessions are required")]
    MinimumSessions { minimum: usize },

    /// No lab session carries the given index.
    #[error("no lab session with index {0}")]
    UnknownSession(u32),

    /// The score store rejected a write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScoringError {
    /// Returns `true` if the message is meant to be shown to the person
    /// entering scores rather than only logged.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            ScoringError::UnknownPart(_)
                | ScoringError::UnknownSession(_)
                | ScoringError::ComponentMismatch { .. }
        )
    }

    /// Returns `true` for errors caused by course or weight configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ScoringError::WeightSumExceeded { .. }
                | ScoringError::InvalidWeight { .. }
                | ScoringError::UnknownCourseType(_)
                | ScoringError::UnknownComponent(_)
                | ScoringError::InvalidScale { .. }
                | ScoringError::ConfigurationRequired { .. }
                | ScoringError::UnsupportedComponent { .. }
        )
    }
}

/// Errors returned by a [`ScoreStore`](crate::flush::ScoreStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Score entry has been administratively disabled for the course.
    #[error("score entry is disabled for course {course_id}")]
    EntryDisabled { course_id: String },

    /// The backing store failed.
    #[error("score store failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` if the write was refused because entry is locked.
    pub fn is_entry_disabled(&self) -> bool {
        matches!(self, StoreError::EntryDisabled { .. })
    }
}
