//! In-memory score entry for one (course, component).
//!
//! An [`EntrySession`] owns the authoritative scores while faculty enter
//! them. Every mutation bumps the session's revision; [`EntrySession::snapshot`]
//! turns the current state into flat records for the flush queue. Entering
//! another component means opening another session.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::assignment::AssignmentScore;
use crate::ca::{CaCalculator, StudentCaScore};
use crate::config::CourseConfig;
use crate::error::ScoringError;
use crate::evaluator::StudentComponentSet;
use crate::flush::ComponentSnapshot;
use crate::lab::{LabScore, LabSession};
use crate::model::{Component, CourseType, PartKey};
use crate::record::{RecordCodec, ScoreRecord};
use crate::scale::{ComponentScale, ScaleRegistry};
use crate::weights::{require_weights, PartWeights, WeightConfig};

/// Result of asking to replace a CA component's part weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconfigureOutcome {
    /// Students already hold marks that the change would zero. Nothing changed.
    ConfirmationRequired { affected_students: usize },
    /// The weights were saved and every student's detail was reset.
    Applied { reset_students: usize },
}

#[derive(Debug, Clone)]
enum EntryState {
    Ca {
        test_date: Option<NaiveDate>,
        scores: BTreeMap<String, StudentCaScore>,
    },
    Lab {
        scores: BTreeMap<String, LabScore>,
    },
    Assignment {
        scores: BTreeMap<String, AssignmentScore>,
    },
}

/// Authoritative scores for one component of one course.
#[derive(Debug, Clone)]
pub struct EntrySession {
    id: Uuid,
    course_id: String,
    course_type: CourseType,
    academic_year: String,
    component: Component,
    scale: ComponentScale,
    registry: ScaleRegistry,
    weights: BTreeMap<Component, WeightConfig>,
    state: EntryState,
    revision: u64,
}

impl EntrySession {
    /// Open score entry for `component`.
    ///
    /// Fails with `UnsupportedComponent` when the course does not evaluate
    /// the component and with `ConfigurationRequired` when a CA component's
    /// part weights were never saved.
    pub fn open(config: &CourseConfig, component: Component) -> Result<Self, ScoringError> {
        let scheme = config.registry.evaluation_scheme(config.course_type);
        if !scheme.supports(component) {
            return Err(ScoringError::UnsupportedComponent {
                course_type: config.course_type,
                component,
            });
        }

        let state = if component.is_ca() {
            require_weights(&config.weights, &config.course_id, component)?;
            EntryState::Ca {
                test_date: None,
                scores: BTreeMap::new(),
            }
        } else if component == Component::Lab {
            EntryState::Lab {
                scores: BTreeMap::new(),
            }
        } else {
            EntryState::Assignment {
                scores: BTreeMap::new(),
            }
        };

        tracing::debug!(course = %config.course_id, %component, "opened entry session");

        Ok(Self {
            id: Uuid::new_v4(),
            course_id: config.course_id.clone(),
            course_type: config.course_type,
            academic_year: config.academic_year.clone(),
            component,
            scale: config.registry.component_scale(config.course_type, component),
            registry: config.registry.clone(),
            weights: config.weights.clone(),
            state,
            revision: 0,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn scale(&self) -> &ComponentScale {
        &self.scale
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    fn codec(&self) -> RecordCodec<'_> {
        RecordCodec::new(&self.registry, self.course_type, &self.weights)
    }

    fn part_weights(&self) -> Result<&PartWeights, ScoringError> {
        require_weights(&self.weights, &self.course_id, self.component)
    }

    fn mismatch(&self, operation: &'static str) -> ScoringError {
        ScoringError::ComponentMismatch {
            component: self.component,
            operation,
        }
    }

    /// Replace the session's scores with this component's slice of the
    /// stored records. Records from other academic years are ignored.
    /// Returns how many students were loaded.
    pub fn load(&mut self, records: &[ScoreRecord]) -> usize {
        let mut loaded = Vec::new();
        for record in records {
            if record.academic_year != self.academic_year {
                tracing::debug!(
                    student = %record.student_id,
                    year = %record.academic_year,
                    "skipping record from another academic year"
                );
                continue;
            }
            loaded.push(self.codec().decode(record));
        }

        let count = loaded.len();
        let component = self.component;
        match &mut self.state {
            EntryState::Ca { test_date, scores } => {
                scores.clear();
                for mut set in loaded {
                    if let Some(score) = set.ca.remove(&component) {
                        if test_date.is_none() {
                            *test_date = score.test_date;
                        }
                        scores.insert(set.student_id, score);
                    }
                }
            }
            EntryState::Lab { scores } => {
                scores.clear();
                for set in loaded {
                    if let Some(lab) = set.lab {
                        scores.insert(set.student_id, lab);
                    }
                }
            }
            EntryState::Assignment { scores } => {
                scores.clear();
                for set in loaded {
                    if let Some(assignment) = set.assignment {
                        scores.insert(set.student_id, assignment);
                    }
                }
            }
        }
        tracing::debug!(course = %self.course_id, %component, count, "loaded scores");
        count
    }

    /// Present a student in the entry view, creating all-zero scores on
    /// first sight. Returns `true` if the student was new.
    pub fn ensure_student(&mut self, student_id: &str) -> bool {
        let registry = &self.registry;
        let course_type = self.course_type;
        let created = match &mut self.state {
            EntryState::Ca { test_date, scores } => {
                if scores.contains_key(student_id) {
                    false
                } else {
                    let mut score = StudentCaScore::empty();
                    score.test_date = *test_date;
                    scores.insert(student_id.to_string(), score);
                    true
                }
            }
            EntryState::Lab { scores } => {
                if scores.contains_key(student_id) {
                    false
                } else {
                    scores.insert(student_id.to_string(), LabScore::new(registry, course_type));
                    true
                }
            }
            EntryState::Assignment { scores } => {
                if scores.contains_key(student_id) {
                    false
                } else {
                    scores.insert(
                        student_id.to_string(),
                        AssignmentScore::new(registry, course_type),
                    );
                    true
                }
            }
        };
        if created {
            self.bump();
        }
        created
    }

    /// Students in the session, in id order.
    pub fn student_ids(&self) -> Vec<&str> {
        match &self.state {
            EntryState::Ca { scores, .. } => scores.keys().map(String::as_str).collect(),
            EntryState::Lab { scores } => scores.keys().map(String::as_str).collect(),
            EntryState::Assignment { scores } => scores.keys().map(String::as_str).collect(),
        }
    }

    /// Scaled score of a student for this component.
    pub fn scaled(&self, student_id: &str) -> Option<f64> {
        match &self.state {
            EntryState::Ca { scores, .. } => scores.get(student_id).map(|s| s.converted),
            EntryState::Lab { scores } => scores.get(student_id).map(LabScore::scaled),
            EntryState::Assignment { scores } => scores.get(student_id).map(AssignmentScore::scaled),
        }
    }

    // CA entry

    pub fn weight_config(&self) -> Result<&WeightConfig, ScoringError> {
        if !self.component.is_ca() {
            return Err(self.mismatch("part weights"));
        }
        self.weights
            .get(&self.component)
            .ok_or_else(|| ScoringError::ConfigurationRequired {
                course_id: self.course_id.clone(),
                component: self.component,
            })
    }

    pub fn ca_score(&self, student_id: &str) -> Option<&StudentCaScore> {
        match &self.state {
            EntryState::Ca { scores, .. } => scores.get(student_id),
            _ => None,
        }
    }

    pub fn test_date(&self) -> Option<NaiveDate> {
        match &self.state {
            EntryState::Ca { test_date, .. } => *test_date,
            _ => None,
        }
    }

    /// Record one part mark for a student.
    ///
    /// Returns `Ok(false)` when the part is disabled by a zero weight; the
    /// score is untouched then. Values are clamped to the part weight.
    pub fn set_part(
        &mut self,
        student_id: &str,
        key: PartKey,
        value: f64,
    ) -> Result<bool, ScoringError> {
        let mismatch = self.mismatch("part entry");
        if !self.component.is_ca() {
            return Err(mismatch);
        }
        let weights = *self.part_weights()?;
        let scale = self.scale.clone();
        let calc = CaCalculator::new(&weights, &scale);
        let EntryState::Ca { test_date, scores } = &mut self.state else {
            return Err(mismatch);
        };
        let score = scores.entry(student_id.to_string()).or_insert_with(|| {
            let mut score = StudentCaScore::empty();
            score.test_date = *test_date;
            score
        });
        let applied = calc.set_part(score, key, value);
        if applied {
            self.bump();
        }
        Ok(applied)
    }

    /// Set the test date for the component, applied to every student.
    pub fn set_test_date(&mut self, date: Option<NaiveDate>) -> Result<(), ScoringError> {
        let mismatch = self.mismatch("test date");
        let EntryState::Ca { test_date, scores } = &mut self.state else {
            return Err(mismatch);
        };
        *test_date = date;
        for score in scores.values_mut() {
            score.test_date = date;
        }
        self.bump();
        Ok(())
    }

    /// Replace the component's part weights.
    ///
    /// The weights are validated first; an invalid set changes nothing. If
    /// any student holds marks and `confirmed` is false the change is held
    /// back with [`ReconfigureOutcome::ConfirmationRequired`]. Once applied,
    /// every student's detail for the component is reset to zero.
    pub fn reconfigure(
        &mut self,
        parts: PartWeights,
        confirmed: bool,
    ) -> Result<ReconfigureOutcome, ScoringError> {
        let mismatch = self.mismatch("part weights");
        parts.validate()?;
        let EntryState::Ca { scores, .. } = &mut self.state else {
            return Err(mismatch);
        };
        let affected_students = scores
            .values()
            .filter(|s| s.raw_total() != 0.0 || s.out_of_50 != 0.0)
            .count();
        if affected_students > 0 && !confirmed {
            return Ok(ReconfigureOutcome::ConfirmationRequired { affected_students });
        }

        for score in scores.values_mut() {
            score.clear();
        }
        let reset_students = scores.len();

        self.weights
            .entry(self.component)
            .or_default()
            .save(parts)?;
        self.bump();
        tracing::info!(
            course = %self.course_id,
            component = %self.component,
            reset_students,
            "part weights reconfigured"
        );
        Ok(ReconfigureOutcome::Applied { reset_students })
    }

    // Lab entry

    fn lab_mut(
        &mut self,
        student_id: &str,
        operation: &'static str,
    ) -> Result<&mut LabScore, ScoringError> {
        let mismatch = self.mismatch(operation);
        let registry = &self.registry;
        let course_type = self.course_type;
        match &mut self.state {
            EntryState::Lab { scores } => Ok(scores
                .entry(student_id.to_string())
                .or_insert_with(|| LabScore::new(registry, course_type))),
            _ => Err(mismatch),
        }
    }

    pub fn lab_score(&self, student_id: &str) -> Option<&LabScore> {
        match &self.state {
            EntryState::Lab { scores } => scores.get(student_id),
            _ => None,
        }
    }

    pub fn add_lab_session(
        &mut self,
        student_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<u32, ScoringError> {
        let index = self.lab_mut(student_id, "lab sessions")?.add_session(date);
        self.bump();
        Ok(index)
    }

    pub fn insert_lab_session(
        &mut self,
        student_id: &str,
        index: u32,
        date: Option<NaiveDate>,
    ) -> Result<u32, ScoringError> {
        let index = self
            .lab_mut(student_id, "lab sessions")?
            .insert_session(index, date)?;
        self.bump();
        Ok(index)
    }

    pub fn remove_lab_session(
        &mut self,
        student_id: &str,
        index: u32,
    ) -> Result<LabSession, ScoringError> {
        let removed = self
            .lab_mut(student_id, "lab sessions")?
            .remove_session(index)?;
        self.bump();
        Ok(removed)
    }

    /// Record session marks, clamped to 10. Returns the stored value.
    pub fn set_lab_marks(
        &mut self,
        student_id: &str,
        index: u32,
        value: f64,
    ) -> Result<f64, ScoringError> {
        let marks = self
            .lab_mut(student_id, "lab marks")?
            .set_marks(index, value)?;
        self.bump();
        Ok(marks)
    }

    pub fn set_lab_date(
        &mut self,
        student_id: &str,
        index: u32,
        date: Option<NaiveDate>,
    ) -> Result<(), ScoringError> {
        self.lab_mut(student_id, "lab dates")?.set_date(index, date)?;
        self.bump();
        Ok(())
    }

    // Assignment entry

    pub fn assignment_score(&self, student_id: &str) -> Option<&AssignmentScore> {
        match &self.state {
            EntryState::Assignment { scores } => scores.get(student_id),
            _ => None,
        }
    }

    /// Record assignment marks, clamped to the component's max.
    pub fn set_assignment(&mut self, student_id: &str, value: f64) -> Result<f64, ScoringError> {
        let mismatch = self.mismatch("assignment marks");
        let registry = &self.registry;
        let course_type = self.course_type;
        let EntryState::Assignment { scores } = &mut self.state else {
            return Err(mismatch);
        };
        let marks = scores
            .entry(student_id.to_string())
            .or_insert_with(|| AssignmentScore::new(registry, course_type))
            .set(value);
        self.bump();
        Ok(marks)
    }

    /// Flat records holding only this component's data for every student.
    pub fn snapshot(&self) -> ComponentSnapshot {
        let codec = self.codec();
        let records = self
            .student_ids()
            .into_iter()
            .map(|student_id| {
                let mut set = StudentComponentSet {
                    student_id: student_id.to_string(),
                    academic_year: self.academic_year.clone(),
                    ca: BTreeMap::new(),
                    lab: None,
                    assignment: None,
                };
                match &self.state {
                    EntryState::Ca { scores, .. } => {
                        if let Some(score) = scores.get(student_id) {
                            set.ca.insert(self.component, score.clone());
                        }
                    }
                    EntryState::Lab { scores } => set.lab = scores.get(student_id).cloned(),
                    EntryState::Assignment { scores } => {
                        set.assignment = scores.get(student_id).copied()
                    }
                }
                codec.encode_component(&set, self.component)
            })
            .collect();

        ComponentSnapshot {
            session_id: self.id,
            course_id: self.course_id.clone(),
            component: self.component,
            academic_year: self.academic_year.clone(),
            revision: self.revision,
            records,
        }
    }
}
