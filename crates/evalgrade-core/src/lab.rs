//! Lab scoring.
//!
//! A lab score is the mean of its dated sessions (each out of 10) scaled to
//! 100 for lab-only courses or to the LAB component's max marks otherwise.
//! Sessions are identified by a 1-based `index` that is renumbered by
//! exactly one when a session is inserted or removed before it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::assignment::clamp_marks;
use crate::error::ScoringError;
use crate::model::{Component, CourseType};
use crate::scale::ScaleRegistry;

/// Marks every lab session is out of.
pub const SESSION_MAX_MARKS: f64 = 10.0;
/// A lab score never has fewer sessions than this.
pub const MIN_SESSIONS: usize = 2;
/// Scale of lab-only courses, whose whole grade is the lab.
pub const LAB_ONLY_SCALE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabSession {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default = "default_session_max")]
    pub max_marks: f64,
    /// `None` until marks are recorded; counts as 0 in the average.
    #[serde(default)]
    pub obtained_marks: Option<f64>,
    pub index: u32,
}

fn default_session_max() -> f64 {
    SESSION_MAX_MARKS
}

impl LabSession {
    pub fn new(index: u32, date: Option<NaiveDate>) -> Self {
        Self {
            date,
            max_marks: SESSION_MAX_MARKS,
            obtained_marks: None,
            index,
        }
    }

    fn marks_or_zero(&self) -> f64 {
        self.obtained_marks
            .map(|m| clamp_marks(m, SESSION_MAX_MARKS))
            .unwrap_or(0.0)
    }
}

/// Max marks a lab score is scaled onto for a course type.
pub fn lab_scale_max(registry: &ScaleRegistry, course_type: CourseType) -> f64 {
    if course_type.is_lab_only() {
        LAB_ONLY_SCALE
    } else {
        registry
            .component_scale(course_type, Component::Lab)
            .max_marks
    }
}

/// Scale a session average (out of 10) onto `scale_max`, rounded.
pub fn scale_average(average: f64, scale_max: f64) -> f64 {
    (average / SESSION_MAX_MARKS * scale_max).round()
}

/// A student's lab sessions and the scaled lab score derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabScore {
    sessions: Vec<LabSession>,
    pub max_marks: f64,
    pub total_obtained: f64,
}

impl LabScore {
    /// A new lab score with the minimum number of empty sessions.
    pub fn new(registry: &ScaleRegistry, course_type: CourseType) -> Self {
        let sessions = (1..=MIN_SESSIONS as u32)
            .map(|index| LabSession::new(index, None))
            .collect();
        Self::with_max(sessions, lab_scale_max(registry, course_type))
    }

    /// Rebuild a lab score from stored sessions.
    ///
    /// Sessions are ordered by their stored index. Gaps or duplicate indices
    /// are renumbered densely from 1 and a short list is padded with empty
    /// sessions up to the minimum.
    pub fn from_sessions(
        registry: &ScaleRegistry,
        course_type: CourseType,
        mut sessions: Vec<LabSession>,
    ) -> Self {
        sessions.sort_by_key(|s| s.index);
        let mut renumbered = false;
        for (position, session) in sessions.iter_mut().enumerate() {
            let expected = position as u32 + 1;
            if session.index != expected {
                session.index = expected;
                renumbered = true;
            }
            session.max_marks = SESSION_MAX_MARKS;
            session.obtained_marks = session
                .obtained_marks
                .map(|m| clamp_marks(m, SESSION_MAX_MARKS));
        }
        if renumbered {
            tracing::warn!("lab session indices were not contiguous, renumbered from 1");
        }
        while sessions.len() < MIN_SESSIONS {
            let index = sessions.len() as u32 + 1;
            sessions.push(LabSession::new(index, None));
        }
        Self::with_max(sessions, lab_scale_max(registry, course_type))
    }

    fn with_max(sessions: Vec<LabSession>, max_marks: f64) -> Self {
        let mut score = Self {
            sessions,
            max_marks,
            total_obtained: 0.0,
        };
        score.recompute();
        score
    }

    pub fn sessions(&self) -> &[LabSession] {
        &self.sessions
    }

    pub fn session(&self, index: u32) -> Option<&LabSession> {
        self.sessions.iter().find(|s| s.index == index)
    }

    fn position(&self, index: u32) -> Result<usize, ScoringError> {
        self.sessions
            .iter()
            .position(|s| s.index == index)
            .ok_or(ScoringError::UnknownSession(index))
    }

    /// Mean of all sessions; unrecorded marks count as 0.
    pub fn average(&self) -> f64 {
        if self.sessions.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.sessions.iter().map(LabSession::marks_or_zero).sum();
        sum / self.sessions.len() as f64
    }

    /// The scaled lab score counted toward the course total.
    pub fn scaled(&self) -> f64 {
        self.total_obtained
    }

    fn recompute(&mut self) {
        self.total_obtained = scale_average(self.average(), self.max_marks);
    }

    /// Append a session after the last one. Returns its index.
    pub fn add_session(&mut self, date: Option<NaiveDate>) -> u32 {
        let index = self.sessions.len() as u32 + 1;
        self.sessions.push(LabSession::new(index, date));
        self.recompute();
        index
    }

    /// Insert an empty session at `index`, shifting later sessions up by one.
    pub fn insert_session(
        &mut self,
        index: u32,
        date: Option<NaiveDate>,
    ) -> Result<u32, ScoringError> {
        let next = self.sessions.len() as u32 + 1;
        if index == 0 || index > next {
            return Err(ScoringError::UnknownSession(index));
        }
        for session in self.sessions.iter_mut().filter(|s| s.index >= index) {
            session.index += 1;
        }
        let at = (index - 1) as usize;
        self.sessions.insert(at, LabSession::new(index, date));
        self.recompute();
        Ok(index)
    }

    /// Remove the session at `index`, shifting later sessions down by one.
    ///
    /// Refused when only [`MIN_SESSIONS`] remain; nothing changes then.
    pub fn remove_session(&mut self, index: u32) -> Result<LabSession, ScoringError> {
        let position = self.position(index)?;
        if self.sessions.len() <= MIN_SESSIONS {
            return Err(ScoringError::MinimumSessions {
                minimum: MIN_SESSIONS,
            });
        }
        let removed = self.sessions.remove(position);
        for session in self.sessions.iter_mut().filter(|s| s.index > index) {
            session.index -= 1;
        }
        self.recompute();
        Ok(removed)
    }

    /// Record marks for a session, clamped to `[0, 10]`.
    pub fn set_marks(&mut self, index: u32, value: f64) -> Result<f64, ScoringError> {
        let position = self.position(index)?;
        let marks = clamp_marks(value, SESSION_MAX_MARKS);
        self.sessions[position].obtained_marks = Some(marks);
        self.recompute();
        Ok(marks)
    }

    pub fn set_date(&mut self, index: u32, date: Option<NaiveDate>) -> Result<(), ScoringError> {
        let position = self.position(index)?;
        self.sessions[position].date = date;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 10, day)
    }

    fn lab_with_marks(course_type: CourseType, marks: &[f64]) -> LabScore {
        let registry = ScaleRegistry::builtin();
        let sessions = marks
            .iter()
            .enumerate()
            .map(|(i, m)| LabSession {
                date: date(i as u32 + 1),
                max_marks: SESSION_MAX_MARKS,
                obtained_marks: Some(*m),
                index: i as u32 + 1,
            })
            .collect();
        LabScore::from_sessions(&registry, course_type, sessions)
    }

    #[test]
    fn averaging_and_scaling() {
        let lab_only = lab_with_marks(CourseType::UgLabOnly, &[8.0, 6.0, 10.0]);
        assert_eq!(lab_only.average(), 8.0);
        assert_eq!(lab_only.scaled(), 80.0);

        let integrated = lab_with_marks(CourseType::UgIntegrated, &[8.0, 6.0, 10.0]);
        assert_eq!(integrated.max_marks, 30.0);
        assert_eq!(integrated.scaled(), 24.0);
    }

    #[test]
    fn pg_lab_only_seven_and_a_half() {
        let lab = lab_with_marks(CourseType::PgLabOnly, &[7.0, 8.0]);
        assert_eq!(lab.average(), 7.5);
        assert_eq!(lab.scaled(), 75.0);
    }

    #[test]
    fn unrecorded_sessions_count_as_zero() {
        let registry = ScaleRegistry::builtin();
        let mut lab = LabScore::new(&registry, CourseType::UgLabOnly);
        lab.set_marks(1, 9.0).unwrap();
        assert_eq!(lab.average(), 4.5);
        assert_eq!(lab.scaled(), 45.0);
    }

    #[test]
    fn marks_are_clamped_to_ten() {
        let registry = ScaleRegistry::builtin();
        let mut lab = LabScore::new(&registry, CourseType::PgLabOnly);
        assert_eq!(lab.set_marks(2, 14.0).unwrap(), 10.0);
        assert_eq!(lab.set_marks(1, -2.0).unwrap(), 0.0);
        assert!(matches!(
            lab.set_marks(7, 5.0),
            Err(ScoringError::UnknownSession(7))
        ));
    }

    #[test]
    fn removing_below_minimum_is_rejected() {
        let registry = ScaleRegistry::builtin();
        let mut lab = LabScore::new(&registry, CourseType::UgIntegrated);
        lab.set_marks(1, 6.0).unwrap();
        let before = lab.clone();

        let err = lab.remove_session(1).unwrap_err();
        assert_eq!(err, ScoringError::MinimumSessions { minimum: 2 });
        assert_eq!(lab.sessions().len(), 2);
        assert_eq!(lab, before);
    }

    #[test]
    fn insert_shifts_later_indices_and_keeps_pairings() {
        let mut lab = lab_with_marks(CourseType::UgLabOnly, &[8.0, 6.0, 10.0]);
        lab.insert_session(2, date(20)).unwrap();

        let indices: Vec<u32> = lab.sessions().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert_eq!(lab.session(1).unwrap().obtained_marks, Some(8.0));
        assert_eq!(lab.session(2).unwrap().date, date(20));
        assert_eq!(lab.session(2).unwrap().obtained_marks, None);
        assert_eq!(lab.session(3).unwrap().date, date(2));
        assert_eq!(lab.session(3).unwrap().obtained_marks, Some(6.0));
        assert_eq!(lab.session(4).unwrap().date, date(3));
        assert_eq!(lab.average(), 6.0);

        assert!(lab.insert_session(9, None).is_err());
        assert!(lab.insert_session(0, None).is_err());
    }

    #[test]
    fn remove_shifts_later_indices_down() {
        let mut lab = lab_with_marks(CourseType::UgLabOnly, &[8.0, 6.0, 10.0]);
        let removed = lab.remove_session(2).unwrap();
        assert_eq!(removed.obtained_marks, Some(6.0));

        assert_eq!(lab.sessions().len(), 2);
        assert_eq!(lab.session(1).unwrap().date, date(1));
        assert_eq!(lab.session(2).unwrap().date, date(3));
        assert_eq!(lab.session(2).unwrap().obtained_marks, Some(10.0));
        assert_eq!(lab.scaled(), 90.0);
    }

    #[test]
    fn add_session_appends() {
        let registry = ScaleRegistry::builtin();
        let mut lab = LabScore::new(&registry, CourseType::PgIntegrated);
        assert_eq!(lab.add_session(date(5)), 3);
        assert_eq!(lab.sessions().len(), 3);
        lab.set_date(1, date(1)).unwrap();
        assert_eq!(lab.session(1).unwrap().date, date(1));
    }

    #[test]
    fn loading_sorts_renumbers_and_pads() {
        let registry = ScaleRegistry::builtin();
        let stored = vec![LabSession {
            date: date(9),
            max_marks: 25.0,
            obtained_marks: Some(12.0),
            index: 4,
        }];
        let lab = LabScore::from_sessions(&registry, CourseType::UgLabOnly, stored);
        assert_eq!(lab.sessions().len(), 2);
        let first = lab.session(1).unwrap();
        assert_eq!(first.date, date(9));
        assert_eq!(first.max_marks, 10.0);
        assert_eq!(first.obtained_marks, Some(10.0));
        assert_eq!(lab.session(2).unwrap().obtained_marks, None);
        assert_eq!(lab.scaled(), 50.0);
    }
}
