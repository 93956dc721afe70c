//! Persisted score records.
//!
//! A record stores each component twice: as a flat `scores` entry and, for CA
//! components, as per-question detail. The structured detail is canonical.
//! Decoding rebuilds it and recomputes every derived number; encoding derives
//! the flat entries from it.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::assignment::AssignmentScore;
use crate::ca::{CaCalculator, StudentCaScore};
use crate::evaluator::StudentComponentSet;
use crate::lab::{LabScore, LabSession};
use crate::model::{Component, CourseType, Part, PartKey, Question};
use crate::scale::ScaleRegistry;
use crate::weights::{PartWeights, WeightConfig};

/// Question numbers span three CA papers of five questions each.
pub const MAX_QUESTION_NUMBER: u32 = 15;

const RECONCILE_EPSILON: f64 = 1e-9;

/// One student's stored scores for a course and academic year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub student_id: String,
    pub academic_year: String,
    #[serde(default)]
    pub scores: Vec<ScoreEntry>,
    #[serde(default)]
    pub questions: Vec<QuestionRecord>,
    #[serde(default, rename = "lab_sessions")]
    pub lab_sessions: Vec<LabSession>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub component_name: String,
    pub max_marks: f64,
    pub obtained_marks: f64,
    #[serde(default)]
    pub test_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub question_number: u32,
    #[serde(default)]
    pub meta: QuestionMeta,
    #[serde(default)]
    pub parts: Vec<PartRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionMeta {
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRecord {
    pub part_name: String,
    pub max_marks: f64,
    pub obtained_marks: f64,
}

/// Flat question number (1–15) of a question on a CA paper.
pub fn question_number(component: Component, question: Question) -> Option<u32> {
    component
        .ca_block()
        .map(|block| block * 5 + question.position())
}

/// Map a flat question number back to its CA component and question.
///
/// `meta.component` decides the component when it names a CA component;
/// otherwise the number's block of five does. Numbers outside 1–15 map to
/// nothing.
pub fn locate_question(number: u32, meta_component: Option<&str>) -> Option<(Component, Question)> {
    if number == 0 || number > MAX_QUESTION_NUMBER {
        return None;
    }
    let question = Question::from_position((number - 1) % 5 + 1)?;
    let from_meta = meta_component
        .and_then(|name| name.parse::<Component>().ok())
        .filter(|c| c.is_ca());
    let component = match from_meta {
        Some(component) => component,
        None => Component::from_ca_block((number - 1) / 5)?,
    };
    Some((component, question))
}

impl ScoreRecord {
    pub fn new(student_id: impl Into<String>, academic_year: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            academic_year: academic_year.into(),
            scores: Vec::new(),
            questions: Vec::new(),
            lab_sessions: Vec::new(),
        }
    }

    fn question_component(question: &QuestionRecord) -> Option<Component> {
        locate_question(question.question_number, question.meta.component.as_deref())
            .map(|(component, _)| component)
    }

    /// Replace everything this record holds for `component` with the data
    /// `slice` holds for it. Applying the same slice twice is a no-op.
    pub fn replace_component(&mut self, component: Component, slice: &ScoreRecord) {
        let name = component.to_string();
        let same = |entry: &ScoreEntry| entry.component_name.eq_ignore_ascii_case(&name);

        self.scores.retain(|entry| !same(entry));
        self.scores
            .extend(slice.scores.iter().filter(|entry| same(*entry)).cloned());

        if component.is_ca() {
            self.questions
                .retain(|q| Self::question_component(q) != Some(component));
            self.questions.extend(
                slice
                    .questions
                    .iter()
                    .filter(|q| Self::question_component(q) == Some(component))
                    .cloned(),
            );
        }

        if component == Component::Lab {
            self.lab_sessions = slice.lab_sessions.clone();
        }
    }
}

/// Converts between [`ScoreRecord`]s and [`StudentComponentSet`]s for one
/// course.
#[derive(Debug, Clone, Copy)]
pub struct RecordCodec<'a> {
    registry: &'a ScaleRegistry,
    course_type: CourseType,
    weights: &'a BTreeMap<Component, WeightConfig>,
}

impl<'a> RecordCodec<'a> {
    pub fn new(
        registry: &'a ScaleRegistry,
        course_type: CourseType,
        weights: &'a BTreeMap<Component, WeightConfig>,
    ) -> Self {
        Self {
            registry,
            course_type,
            weights,
        }
    }

    /// Weights used to bound stored CA detail. Unconfigured components use
    /// the uniform default so stored data can still be displayed.
    fn part_weights(&self, component: Component) -> PartWeights {
        match self.weights.get(&component) {
            Some(config) if config.configured => config.parts,
            _ => {
                tracing::debug!(%component, "part weights not configured, bounding with defaults");
                PartWeights::uniform()
            }
        }
    }

    /// CA components whose stored flat score is nonzero but that have no
    /// question detail. [`decode`](Self::decode) scores these as 0.
    pub fn flat_only_components(&self, record: &ScoreRecord) -> Vec<Component> {
        let scheme = self.registry.evaluation_scheme(self.course_type);
        scheme
            .ca_components()
            .filter(|&component| {
                let stored = record
                    .scores
                    .iter()
                    .rev()
                    .find(|e| e.component_name.parse::<Component>().ok() == Some(component))
                    .is_some_and(|e| e.obtained_marks != 0.0);
                let has_detail = record.questions.iter().any(|q| {
                    locate_question(q.question_number, q.meta.component.as_deref())
                        .is_some_and(|(c, _)| c == component)
                });
                stored && !has_detail
            })
            .collect()
    }

    /// Rebuild a student's component set from a stored record.
    ///
    /// Entries for unknown components, components outside the scheme and
    /// question numbers outside 1–15 are skipped with a warning. Derived
    /// numbers are always recomputed; stored totals that disagree lose.
    pub fn decode(&self, record: &ScoreRecord) -> StudentComponentSet {
        let scheme = self.registry.evaluation_scheme(self.course_type);
        let mut set = StudentComponentSet {
            student_id: record.student_id.clone(),
            academic_year: record.academic_year.clone(),
            ca: BTreeMap::new(),
            lab: None,
            assignment: None,
        };

        let mut flat: BTreeMap<Component, &ScoreEntry> = BTreeMap::new();
        for entry in &record.scores {
            match entry.component_name.parse::<Component>() {
                Ok(component) if scheme.supports(component) => {
                    flat.insert(component, entry);
                }
                Ok(component) => tracing::warn!(
                    student = %record.student_id,
                    %component,
                    "skipping score for component outside the evaluation scheme"
                ),
                Err(e) => tracing::warn!(student = %record.student_id, "skipping score: {e}"),
            }
        }

        let mut detail: BTreeMap<Component, StudentCaScore> = BTreeMap::new();
        for question in &record.questions {
            let Some((component, q)) =
                locate_question(question.question_number, question.meta.component.as_deref())
            else {
                tracing::warn!(
                    student = %record.student_id,
                    number = question.question_number,
                    "skipping question number outside 1-{MAX_QUESTION_NUMBER}"
                );
                continue;
            };
            if !scheme.supports(component) {
                tracing::warn!(
                    student = %record.student_id,
                    %component,
                    "skipping question for component outside the evaluation scheme"
                );
                continue;
            }
            let score = detail.entry(component).or_default();
            if score.test_date.is_none() {
                score.test_date = question.meta.date;
            }
            for part in &question.parts {
                let Some(p) = part.part_name.chars().last().and_then(Part::from_letter) else {
                    tracing::warn!(part = %part.part_name, "skipping unknown question part");
                    continue;
                };
                score.set_part_unchecked(PartKey::new(q, p), part.obtained_marks);
            }
        }

        for component in scheme.ca_components() {
            let had_detail = detail.contains_key(&component);
            let mut score = detail.remove(&component).unwrap_or_default();
            let entry = flat.get(&component);
            if let Some(date) = entry.and_then(|e| e.test_date) {
                score.test_date = Some(date);
            }

            let weights = self.part_weights(component);
            let scale = self.registry.component_scale(self.course_type, component);
            let clamped = CaCalculator::new(&weights, &scale).reclamp(&mut score);
            if clamped > 0 {
                tracing::debug!(
                    student = %record.student_id,
                    %component,
                    clamped,
                    "stored part marks exceeded current weights"
                );
            }

            if let Some(entry) = entry {
                if !had_detail && entry.obtained_marks != 0.0 {
                    tracing::warn!(
                        student = %record.student_id,
                        %component,
                        stored = entry.obtained_marks,
                        "flat score has no question detail, treating as 0"
                    );
                } else if (entry.obtained_marks - score.converted).abs() > RECONCILE_EPSILON {
                    tracing::debug!(
                        student = %record.student_id,
                        %component,
                        stored = entry.obtained_marks,
                        recomputed = score.converted,
                        "stored total disagrees with question detail, using recomputed"
                    );
                }
            }
            set.ca.insert(component, score);
        }

        if scheme.supports(Component::Lab) {
            let lab = LabScore::from_sessions(
                self.registry,
                self.course_type,
                record.lab_sessions.clone(),
            );
            if let Some(entry) = flat.get(&Component::Lab) {
                if (entry.obtained_marks - lab.scaled()).abs() > RECONCILE_EPSILON {
                    tracing::debug!(
                        student = %record.student_id,
                        stored = entry.obtained_marks,
                        recomputed = lab.scaled(),
                        "stored lab score disagrees with sessions, using recomputed"
                    );
                }
            }
            set.lab = Some(lab);
        } else if !record.lab_sessions.is_empty() {
            tracing::warn!(
                student = %record.student_id,
                course_type = %self.course_type,
                "skipping lab sessions for a course without a lab component"
            );
        }

        if scheme.supports(Component::Assignment) {
            let mut assignment = AssignmentScore::new(self.registry, self.course_type);
            if let Some(entry) = flat.get(&Component::Assignment) {
                assignment.set(entry.obtained_marks);
            }
            set.assignment = Some(assignment);
        }

        set
    }

    /// Flatten a student's component set into a record.
    pub fn encode(&self, set: &StudentComponentSet) -> ScoreRecord {
        let scheme = self.registry.evaluation_scheme(self.course_type);
        let mut record = ScoreRecord::new(&set.student_id, &set.academic_year);
        for component in scheme.components() {
            self.encode_into(&mut record, set, component);
        }
        record
    }

    /// A record holding only one component's data.
    pub fn encode_component(&self, set: &StudentComponentSet, component: Component) -> ScoreRecord {
        let mut record = ScoreRecord::new(&set.student_id, &set.academic_year);
        self.encode_into(&mut record, set, component);
        record
    }

    fn encode_into(&self, record: &mut ScoreRecord, set: &StudentComponentSet, component: Component) {
        match component {
            Component::Ca1 | Component::Ca2 | Component::Ca3 => {
                if let Some(score) = set.ca.get(&component) {
                    self.encode_ca(record, component, score);
                }
            }
            Component::Lab => {
                if let Some(lab) = &set.lab {
                    record.scores.push(ScoreEntry {
                        component_name: component.to_string(),
                        max_marks: lab.max_marks,
                        obtained_marks: lab.scaled(),
                        test_date: None,
                    });
                    record.lab_sessions = lab.sessions().to_vec();
                }
            }
            Component::Assignment => {
                if let Some(assignment) = &set.assignment {
                    record.scores.push(ScoreEntry {
                        component_name: component.to_string(),
                        max_marks: assignment.max_marks,
                        obtained_marks: assignment.scaled(),
                        test_date: None,
                    });
                }
            }
        }
    }

    /// Append one CA score as flat entry plus five question records.
    pub fn encode_ca(&self, record: &mut ScoreRecord, component: Component, score: &StudentCaScore) {
        let weights = self.part_weights(component);
        let scale = self.registry.component_scale(self.course_type, component);
        let mut score = score.clone();
        CaCalculator::new(&weights, &scale).reclamp(&mut score);

        record.scores.push(ScoreEntry {
            component_name: component.to_string(),
            max_marks: scale.max_marks,
            obtained_marks: score.converted,
            test_date: score.test_date,
        });

        for question in Question::ALL {
            let Some(number) = question_number(component, question) else {
                continue;
            };
            let parts = Part::ALL
                .into_iter()
                .map(|part| {
                    let key = PartKey::new(question, part);
                    PartRecord {
                        part_name: part.letter().to_string(),
                        max_marks: weights.get(key),
                        obtained_marks: score.part(key),
                    }
                })
                .collect();
            record.questions.push(QuestionRecord {
                question_number: number,
                meta: QuestionMeta {
                    component: Some(component.to_string()),
                    date: score.test_date,
                },
                parts,
            });
        }
    }
}
