//! Core data model types for evalgrade.
//!
//! Course types, evaluation components and the question/part grid that CA
//! components are marked on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScoringError;

/// The kind of course a student is enrolled in.
///
/// Fixed when a course is created; decides which components exist and every
/// scale and threshold used to score them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CourseType {
    #[serde(rename = "PG")]
    Pg,
    #[serde(rename = "PG-Integrated")]
    PgIntegrated,
    #[serde(rename = "UG")]
    Ug,
    #[serde(rename = "UG-Integrated")]
    UgIntegrated,
    #[serde(rename = "UG-Lab-Only")]
    UgLabOnly,
    #[serde(rename = "PG-Lab-Only")]
    PgLabOnly,
}

impl CourseType {
    pub const ALL: [CourseType; 6] = [
        CourseType::Pg,
        CourseType::PgIntegrated,
        CourseType::Ug,
        CourseType::UgIntegrated,
        CourseType::UgLabOnly,
        CourseType::PgLabOnly,
    ];

    /// Whether the entire grade is the LAB component.
    pub fn is_lab_only(self) -> bool {
        matches!(self, CourseType::UgLabOnly | CourseType::PgLabOnly)
    }

    /// Whether passing also requires a minimum LAB score.
    pub fn is_lab_constrained(self) -> bool {
        matches!(
            self,
            CourseType::PgIntegrated
                | CourseType::UgIntegrated
                | CourseType::UgLabOnly
                | CourseType::PgLabOnly
        )
    }
}

impl fmt::Display for CourseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseType::Pg => write!(f, "PG"),
            CourseType::PgIntegrated => write!(f, "PG-Integrated"),
            CourseType::Ug => write!(f, "UG"),
            CourseType::UgIntegrated => write!(f, "UG-Integrated"),
            CourseType::UgLabOnly => write!(f, "UG-Lab-Only"),
            CourseType::PgLabOnly => write!(f, "PG-Lab-Only"),
        }
    }
}

impl FromStr for CourseType {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "pg" => Ok(CourseType::Pg),
            "pg-integrated" => Ok(CourseType::PgIntegrated),
            "ug" => Ok(CourseType::Ug),
            "ug-integrated" => Ok(CourseType::UgIntegrated),
            "ug-lab-only" => Ok(CourseType::UgLabOnly),
            "pg-lab-only" => Ok(CourseType::PgLabOnly),
            _ => Err(ScoringError::UnknownCourseType(s.to_string())),
        }
    }
}

/// A named contributor to a course's total grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Component {
    #[serde(rename = "CA1")]
    Ca1,
    #[serde(rename = "CA2")]
    Ca2,
    #[serde(rename = "CA3")]
    Ca3,
    #[serde(rename = "LAB")]
    Lab,
    #[serde(rename = "ASSIGNMENT")]
    Assignment,
}

impl Component {
    pub const ALL: [Component; 5] = [
        Component::Ca1,
        Component::Ca2,
        Component::Ca3,
        Component::Lab,
        Component::Assignment,
    ];

    pub const CA: [Component; 3] = [Component::Ca1, Component::Ca2, Component::Ca3];

    /// Continuous-assessment tests marked on the 5 × 4 question grid.
    pub fn is_ca(self) -> bool {
        matches!(self, Component::Ca1 | Component::Ca2 | Component::Ca3)
    }

    /// Zero-based block of five question numbers owned by a CA component.
    pub fn ca_block(self) -> Option<u32> {
        match self {
            Component::Ca1 => Some(0),
            Component::Ca2 => Some(1),
            Component::Ca3 => Some(2),
            _ => None,
        }
    }

    pub fn from_ca_block(block: u32) -> Option<Component> {
        match block {
            0 => Some(Component::Ca1),
            1 => Some(Component::Ca2),
            2 => Some(Component::Ca3),
            _ => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Ca1 => write!(f, "CA1"),
            Component::Ca2 => write!(f, "CA2"),
            Component::Ca3 => write!(f, "CA3"),
            Component::Lab => write!(f, "LAB"),
            Component::Assignment => write!(f, "ASSIGNMENT"),
        }
    }
}

impl FromStr for Component {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CA1" => Ok(Component::Ca1),
            "CA2" => Ok(Component::Ca2),
            "CA3" => Ok(Component::Ca3),
            "LAB" => Ok(Component::Lab),
            "ASSIGNMENT" => Ok(Component::Assignment),
            _ => Err(ScoringError::UnknownComponent(s.to_string())),
        }
    }
}

/// One of the five questions on a CA paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Question {
    I,
    II,
    III,
    IV,
    V,
}

impl Question {
    pub const ALL: [Question; 5] = [
        Question::I,
        Question::II,
        Question::III,
        Question::IV,
        Question::V,
    ];

    pub fn roman(self) -> &'static str {
        match self {
            Question::I => "I",
            Question::II => "II",
            Question::III => "III",
            Question::IV => "IV",
            Question::V => "V",
        }
    }

    /// 1-based position on the paper.
    pub fn position(self) -> u32 {
        match self {
            Question::I => 1,
            Question::II => 2,
            Question::III => 3,
            Question::IV => 4,
            Question::V => 5,
        }
    }

    pub fn from_position(position: u32) -> Option<Question> {
        match position {
            1 => Some(Question::I),
            2 => Some(Question::II),
            3 => Some(Question::III),
            4 => Some(Question::IV),
            5 => Some(Question::V),
            _ => None,
        }
    }

    fn from_roman(s: &str) -> Option<Question> {
        Question::ALL.into_iter().find(|q| q.roman() == s)
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.roman())
    }
}

/// One of the four parts of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Part {
    A,
    B,
    C,
    D,
}

impl Part {
    pub const ALL: [Part; 4] = [Part::A, Part::B, Part::C, Part::D];

    pub fn letter(self) -> char {
        match self {
            Part::A => 'a',
            Part::B => 'b',
            Part::C => 'c',
            Part::D => 'd',
        }
    }

    pub fn from_letter(c: char) -> Option<Part> {
        match c.to_ascii_lowercase() {
            'a' => Some(Part::A),
            'b' => Some(Part::B),
            'c' => Some(Part::C),
            'd' => Some(Part::D),
            _ => None,
        }
    }
}

/// A single cell of the question grid, written `Ia`, `IIc`, `Vd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartKey {
    pub question: Question,
    pub part: Part,
}

impl PartKey {
    pub fn new(question: Question, part: Part) -> Self {
        Self { question, part }
    }

    /// All 20 keys in paper order.
    pub fn all() -> impl Iterator<Item = PartKey> {
        Question::ALL
            .into_iter()
            .flat_map(|q| Part::ALL.into_iter().map(move |p| PartKey::new(q, p)))
    }
}

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.question.roman(), self.part.letter())
    }
}

impl FromStr for PartKey {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let parsed = chars.next_back().and_then(|last| {
            let part = Part::from_letter(last)?;
            let question = Question::from_roman(chars.as_str())?;
            Some(PartKey::new(question, part))
        });
        parsed.ok_or_else(|| ScoringError::UnknownPart(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_type_display_and_parse() {
        assert_eq!(CourseType::UgIntegrated.to_string(), "UG-Integrated");
        assert_eq!(
            "pg-lab-only".parse::<CourseType>().unwrap(),
            CourseType::PgLabOnly
        );
        assert_eq!(
            "UG_Integrated".parse::<CourseType>().unwrap(),
            CourseType::UgIntegrated
        );
        assert!("MBA".parse::<CourseType>().is_err());
        for ty in CourseType::ALL {
            assert_eq!(ty.to_string().parse::<CourseType>().unwrap(), ty);
        }
    }

    #[test]
    fn lab_constrained_types() {
        assert!(!CourseType::Ug.is_lab_constrained());
        assert!(!CourseType::Pg.is_lab_constrained());
        assert!(CourseType::UgIntegrated.is_lab_constrained());
        assert!(CourseType::PgLabOnly.is_lab_constrained());
        assert!(CourseType::UgLabOnly.is_lab_only());
        assert!(!CourseType::PgIntegrated.is_lab_only());
    }

    #[test]
    fn component_parse_is_case_insensitive() {
        assert_eq!("ca2".parse::<Component>().unwrap(), Component::Ca2);
        assert_eq!("Lab".parse::<Component>().unwrap(), Component::Lab);
        assert!(matches!(
            "QUIZ".parse::<Component>(),
            Err(ScoringError::UnknownComponent(_))
        ));
    }

    #[test]
    fn component_serde_uses_display_names() {
        let json = serde_json::to_string(&Component::Assignment).unwrap();
        assert_eq!(json, "\"ASSIGNMENT\"");
        let ty: CourseType = serde_json::from_str("\"UG-Lab-Only\"").unwrap();
        assert_eq!(ty, CourseType::UgLabOnly);
    }

    #[test]
    fn part_key_parse() {
        let key: PartKey = "IIc".parse().unwrap();
        assert_eq!(key, PartKey::new(Question::II, Part::C));
        let key: PartKey = "IVa".parse().unwrap();
        assert_eq!(key.question, Question::IV);
        assert_eq!(key.to_string(), "IVa");
        assert!("VIa".parse::<PartKey>().is_err());
        assert!("Ie".parse::<PartKey>().is_err());
        assert!("".parse::<PartKey>().is_err());
    }

    #[test]
    fn twenty_part_keys_in_order() {
        let keys: Vec<String> = PartKey::all().map(|k| k.to_string()).collect();
        assert_eq!(keys.len(), 20);
        assert_eq!(keys[0], "Ia");
        assert_eq!(keys[5], "IIb");
        assert_eq!(keys[19], "Vd");
    }
}
