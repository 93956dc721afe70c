//! Continuous-assessment scoring.
//!
//! Part marks are clamped to their configured weights, question totals are
//! summed, the paper total is capped at 50 and then converted onto the
//! component's scale with its conversion factor.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::assignment::clamp_marks;
use crate::model::{Part, PartKey, Question};
use crate::scale::ComponentScale;
use crate::weights::{PartWeights, CA_RAW_MAX};

/// Conversion factor used when a CA scale has none configured.
pub const FALLBACK_CONVERSION_FACTOR: f64 = 0.4;

/// Marks for the four parts of one question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionPartScore {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub total: f64,
}

impl QuestionPartScore {
    pub fn get(&self, part: Part) -> f64 {
        match part {
            Part::A => self.a,
            Part::B => self.b,
            Part::C => self.c,
            Part::D => self.d,
        }
    }

    fn set(&mut self, part: Part, value: f64) {
        match part {
            Part::A => self.a = value,
            Part::B => self.b = value,
            Part::C => self.c = value,
            Part::D => self.d = value,
        }
        self.total = self.a + self.b + self.c + self.d;
    }
}

/// One student's detailed marks for one CA component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCaScore {
    #[serde(rename = "I")]
    pub q1: QuestionPartScore,
    #[serde(rename = "II")]
    pub q2: QuestionPartScore,
    #[serde(rename = "III")]
    pub q3: QuestionPartScore,
    #[serde(rename = "IV")]
    pub q4: QuestionPartScore,
    #[serde(rename = "V")]
    pub q5: QuestionPartScore,
    /// Sum of question totals, capped at 50.
    #[serde(rename = "outOf50")]
    pub out_of_50: f64,
    /// `out_of_50` converted onto the component's scale.
    #[serde(alias = "outOf20")]
    pub converted: f64,
    #[serde(default)]
    pub test_date: Option<NaiveDate>,
    /// Set when `converted` used [`FALLBACK_CONVERSION_FACTOR`].
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub conversion_fallback: bool,
}

impl StudentCaScore {
    /// The all-zero structure a student starts from.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn question(&self, question: Question) -> &QuestionPartScore {
        match question {
            Question::I => &self.q1,
            Question::II => &self.q2,
            Question::III => &self.q3,
            Question::IV => &self.q4,
            Question::V => &self.q5,
        }
    }

    fn question_mut(&mut self, question: Question) -> &mut QuestionPartScore {
        match question {
            Question::I => &mut self.q1,
            Question::II => &mut self.q2,
            Question::III => &mut self.q3,
            Question::IV => &mut self.q4,
            Question::V => &mut self.q5,
        }
    }

    pub fn part(&self, key: PartKey) -> f64 {
        self.question(key.question).get(key.part)
    }

    /// Sum of the five question totals before capping.
    pub fn raw_total(&self) -> f64 {
        Question::ALL
            .into_iter()
            .map(|q| self.question(q).total)
            .sum()
    }

    /// Store a part mark as-is. Callers re-clamp before the score is used.
    pub(crate) fn set_part_unchecked(&mut self, key: PartKey, value: f64) {
        self.question_mut(key.question).set(key.part, value);
    }

    /// Zero every part and total, keeping the test date.
    pub fn clear(&mut self) {
        let test_date = self.test_date;
        *self = Self::empty();
        self.test_date = test_date;
    }
}

/// Convert a raw CA total (out of 50) onto a component scale.
pub fn convert(out_of_50: f64, conversion_factor: f64) -> f64 {
    (out_of_50 * conversion_factor).round()
}

/// Applies part weights and a component scale to CA scores.
#[derive(Debug, Clone, Copy)]
pub struct CaCalculator<'a> {
    weights: &'a PartWeights,
    factor: f64,
    fallback: bool,
}

impl<'a> CaCalculator<'a> {
    pub fn new(weights: &'a PartWeights, scale: &ComponentScale) -> Self {
        let (factor, fallback) = match scale.conversion_factor {
            Some(factor) if factor.is_finite() && factor >= 0.0 => (factor, false),
            _ => {
                tracing::warn!(
                    component = %scale.component,
                    "no usable conversion factor configured, using {FALLBACK_CONVERSION_FACTOR}"
                );
                (FALLBACK_CONVERSION_FACTOR, true)
            }
        };
        Self {
            weights,
            factor,
            fallback,
        }
    }

    pub fn conversion_factor(&self) -> f64 {
        self.factor
    }

    pub fn uses_fallback(&self) -> bool {
        self.fallback
    }

    /// Record a part mark.
    ///
    /// Returns `false` and leaves the score untouched when the part is
    /// disabled (weight 0). Otherwise the value is clamped to the part's
    /// weight and every total is recomputed.
    pub fn set_part(&self, score: &mut StudentCaScore, key: PartKey, value: f64) -> bool {
        let max = self.weights.get(key);
        if max == 0.0 {
            return false;
        }
        score
            .question_mut(key.question)
            .set(key.part, clamp_marks(value, max));
        self.recompute(score);
        true
    }

    /// Recompute the capped total and the converted score.
    pub fn recompute(&self, score: &mut StudentCaScore) {
        score.out_of_50 = score.raw_total().min(CA_RAW_MAX);
        score.converted = convert(score.out_of_50, self.factor);
        score.conversion_fallback = self.fallback;
    }

    /// Re-apply the part bounds to a score that may predate the current
    /// weights, then recompute. Returns how many parts changed.
    pub fn reclamp(&self, score: &mut StudentCaScore) -> usize {
        let mut changed = 0;
        for (key, max) in self.weights.iter() {
            let current = score.part(key);
            let bounded = clamp_marks(current, max);
            if bounded != current {
                changed += 1;
            }
            score.question_mut(key.question).set(key.part, bounded);
        }
        self.recompute(score);
        changed
    }
}
