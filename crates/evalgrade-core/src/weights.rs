//! Part-weight configuration for CA components.
//!
//! Each CA paper has 5 questions of 4 parts. A weight is the most marks a
//! part can hold; weight 0 disables the part. The 20 weights may add up to
//! less than 50 but never more.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ScoringError;
use crate::model::{Component, Part, PartKey, Question};

/// Raw marks a CA paper is marked out of.
pub const CA_RAW_MAX: f64 = 50.0;
/// Weight of every part in the default configuration.
pub const DEFAULT_PART_WEIGHT: f64 = 2.5;
/// Floating-point slack allowed above [`CA_RAW_MAX`] when saving.
pub const SUM_TOLERANCE: f64 = 0.01;

const PARTS: usize = 20;

fn slot(key: PartKey) -> usize {
    let part = match key.part {
        Part::A => 0,
        Part::B => 1,
        Part::C => 2,
        Part::D => 3,
    };
    (key.question.position() as usize - 1) * 4 + part
}

/// Maximum marks of each of the 20 question parts.
///
/// Serialized as a map keyed `Ia` … `Vd`; keys left out of a map are 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct PartWeights {
    weights: [f64; PARTS],
}

impl Default for PartWeights {
    fn default() -> Self {
        Self::uniform()
    }
}

impl PartWeights {
    /// 2.5 on every part, 50 in total.
    pub fn uniform() -> Self {
        Self {
            weights: [DEFAULT_PART_WEIGHT; PARTS],
        }
    }

    pub fn zeros() -> Self {
        Self {
            weights: [0.0; PARTS],
        }
    }

    pub fn get(&self, key: PartKey) -> f64 {
        self.weights[slot(key)]
    }

    /// Set a weight without validation; [`PartWeights::validate`] runs on save.
    pub fn set(&mut self, key: PartKey, weight: f64) {
        self.weights[slot(key)] = weight;
    }

    pub fn is_disabled(&self, key: PartKey) -> bool {
        self.get(key) == 0.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (PartKey, f64)> + '_ {
        PartKey::all().map(|key| (key, self.get(key)))
    }

    pub fn question_total(&self, question: Question) -> f64 {
        Part::ALL
            .into_iter()
            .map(|p| self.get(PartKey::new(question, p)))
            .sum()
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Split `total` equally across the four parts of a question.
    pub fn distribute_evenly(&mut self, question: Question, total: f64) {
        let each = total / 4.0;
        for part in Part::ALL {
            self.set(PartKey::new(question, part), each);
        }
    }

    /// Disable every part of a question.
    pub fn zero_question(&mut self, question: Question) {
        self.distribute_evenly(question, 0.0);
    }

    /// Restore the uniform 2.5 default.
    pub fn reset_all(&mut self) {
        *self = Self::uniform();
    }

    /// Check the weights can be saved.
    ///
    /// Every weight must be a non-negative number and the total may not
    /// exceed 50 by more than [`SUM_TOLERANCE`]. Totals under 50 are valid.
    pub fn validate(&self) -> Result<(), ScoringError> {
        for (key, weight) in self.iter() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ScoringError::InvalidWeight {
                    part: key.to_string(),
                    value: weight,
                });
            }
        }

        let sum = self.total();
        if sum > CA_RAW_MAX + SUM_TOLERANCE {
            return Err(ScoringError::WeightSumExceeded {
                sum,
                excess: sum - CA_RAW_MAX,
            });
        }
        Ok(())
    }
}

impl TryFrom<BTreeMap<String, f64>> for PartWeights {
    type Error = ScoringError;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        let mut weights = PartWeights::zeros();
        for (name, weight) in map {
            let key: PartKey = name.parse()?;
            weights.set(key, weight);
        }
        Ok(weights)
    }
}

impl From<PartWeights> for BTreeMap<String, f64> {
    fn from(weights: PartWeights) -> Self {
        weights.iter().map(|(k, w)| (k.to_string(), w)).collect()
    }
}

/// Saved part-weight configuration for one (course, CA component).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    /// Set once the weights have been saved at least once.
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub parts: PartWeights,
}

impl WeightConfig {
    /// An already-configured set of weights.
    pub fn configured(parts: PartWeights) -> Self {
        Self {
            configured: true,
            parts,
        }
    }

    /// Validate and store new weights, marking the component configured.
    ///
    /// On error nothing changes.
    pub fn save(&mut self, parts: PartWeights) -> Result<(), ScoringError> {
        parts.validate()?;
        self.parts = parts;
        self.configured = true;
        Ok(())
    }
}

/// Look up the weights score entry may use for a CA component.
///
/// A missing or unconfigured entry means the component is in the
/// configuration-required state and score entry must be blocked. Weights
/// loaded from a file are validated here too, since deserializing them
/// skips [`WeightConfig::save`].
pub fn require_weights<'a>(
    configs: &'a BTreeMap<Component, WeightConfig>,
    course_id: &str,
    component: Component,
) -> Result<&'a PartWeights, ScoringError> {
    match configs.get(&component) {
        Some(config) if config.configured => {
            config.parts.validate()?;
            Ok(&config.parts)
        }
        _ => Err(ScoringError::ConfigurationRequired {
            course_id: course_id.to_string(),
            component,
        }),
    }
}
