//! Class and subject-requirement models.
//!
//! A class is a group of students identified by grade, section, and
//! session, carrying an ordered list of subjects with weekly-hour quotas.
//! Subjects exist only in the context of their owning class.

use serde::{Deserialize, Serialize};

/// Morning or evening school session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Session {
    Morning,
    Evening,
}

/// A subject with its weekly-hour quota, owned by a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRequirement {
    /// Subject identifier.
    pub subject_id: String,
    /// Required teaching periods per week.
    pub weekly_hours: u8,
}

impl SubjectRequirement {
    /// Creates a requirement.
    pub fn new(subject_id: impl Into<String>, weekly_hours: u8) -> Self {
        Self {
            subject_id: subject_id.into(),
            weekly_hours,
        }
    }
}

/// A class to be timetabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    /// Unique class identifier.
    pub id: String,
    /// Grade number (e.g. 7).
    pub grade: u8,
    /// Section within the grade (e.g. "A").
    pub section: String,
    /// School session.
    pub session: Session,
    /// Subjects with weekly-hour quotas, in curriculum order.
    pub subjects: Vec<SubjectRequirement>,
}

impl Class {
    /// Creates a class with no subjects.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            grade: 0,
            section: String::new(),
            session: Session::Morning,
            subjects: Vec::new(),
        }
    }

    /// Sets the grade number.
    pub fn with_grade(mut self, grade: u8) -> Self {
        self.grade = grade;
        self
    }

    /// Sets the section.
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    /// Sets the session.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Adds a subject with its weekly-hour quota.
    pub fn with_subject(mut self, subject_id: impl Into<String>, weekly_hours: u8) -> Self {
        self.subjects
            .push(SubjectRequirement::new(subject_id, weekly_hours));
        self
    }

    /// Looks up the requirement for a subject.
    pub fn requirement(&self, subject_id: &str) -> Option<&SubjectRequirement> {
        self.subjects.iter().find(|s| s.subject_id == subject_id)
    }

    /// Whether the class curriculum contains a subject.
    pub fn has_subject(&self, subject_id: &str) -> bool {
        self.requirement(subject_id).is_some()
    }

    /// Sum of weekly hours across all subjects.
    pub fn total_weekly_hours(&self) -> u32 {
        self.subjects.iter().map(|s| s.weekly_hours as u32).sum()
    }
}
