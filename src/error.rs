//! Error taxonomy for timetable generation.
//!
//! Non-fatal issues (skipped subjects, availability shortfalls, soft
//! violations) are collected into structured reports returned alongside
//! partial results — they never surface as `Err`. Only invariant breaks
//! ([`TimetableError::SlotConflict`]) and caller mistakes abort an
//! operation outright.

use thiserror::Error;

use crate::models::{GridShape, Slot, ViolationReport};

/// Result alias for timetabling operations.
pub type Result<T> = std::result::Result<T, TimetableError>;

/// Errors raised by the timetabling engine.
#[derive(Debug, Clone, Error)]
pub enum TimetableError {
    /// A subject cannot be scheduled at all: no assigned teacher, or a
    /// zero weekly-hour quota. Skipped per subject, not fatal per run.
    #[error("class {class_id}: subject {subject_id} cannot be scheduled: {reason}")]
    DataMissing {
        class_id: String,
        subject_id: String,
        reason: String,
    },

    /// A teacher's free slots cannot cover the hours required of them.
    #[error("teacher {teacher_id} has {available} free slot(s) but needs {required}")]
    InsufficientAvailability {
        teacher_id: String,
        available: usize,
        required: usize,
    },

    /// Reservation of a slot that is not free. The committer checks a
    /// consistent snapshot first, so this indicates an internal
    /// invariant break; the run is aborted, never silently recovered.
    #[error("slot {slot} for teacher {teacher_id} is not free")]
    SlotConflict { teacher_id: String, slot: Slot },

    /// Manual edit of a generator-owned occupied slot. Such a slot is
    /// editable only through its owning schedule entry.
    #[error("slot {slot} for teacher {teacher_id} is generator-owned; edit the owning schedule entry instead")]
    GeneratorOwned { teacher_id: String, slot: Slot },

    /// Publishing was attempted with priority-4 violations present.
    #[error("publish blocked by {} violation(s)", .0.blocking_len())]
    PublishBlocked(ViolationReport),

    /// Two active constraints contradict each other for the same slot.
    /// Detected at validation time; the offenders are disabled.
    #[error("constraints {ids:?} are mutually unsatisfiable")]
    ConstraintUnsatisfiable { ids: Vec<String> },

    /// Teacher id not registered with the availability tracker.
    #[error("unknown teacher {0}")]
    UnknownTeacher(String),

    /// No schedule exists for the class.
    #[error("no schedule for class {0}")]
    UnknownSchedule(String),

    /// No registered context (class + assignments) for the class.
    #[error("class {0} is not registered")]
    UnknownClass(String),

    /// A second entry was inserted at an occupied class slot.
    #[error("class {class_id} already has an entry at {slot}")]
    DuplicateEntry { class_id: String, slot: Slot },

    /// No entry exists at the slot.
    #[error("class {class_id} has no entry at {slot}")]
    EntryNotFound { class_id: String, slot: Slot },

    /// A slot lies outside the scheduling grid.
    #[error("slot {slot} outside the {shape} grid")]
    SlotOutOfRange { slot: Slot, shape: GridShape },

    /// Edit of a published schedule. Unpublish first.
    #[error("schedule for class {0} is published; unpublish before editing")]
    PublishedImmutable(String),

    /// `Ignore` was requested for a priority-4 violation.
    #[error("blocking violations cannot be ignored")]
    BlockingNotIgnorable,

    /// Auto-resolution could not clear every blocking violation.
    #[error("{remaining} blocking violation(s) could not be auto-resolved")]
    ResolutionFailed { remaining: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, Violation, ViolationKind};

    #[test]
    fn test_display_messages() {
        let err = TimetableError::SlotConflict {
            teacher_id: "t1".into(),
            slot: Slot::new(1, 2),
        };
        assert_eq!(err.to_string(), "slot day 1 period 2 for teacher t1 is not free");

        let err = TimetableError::InsufficientAvailability {
            teacher_id: "t1".into(),
            available: 3,
            required: 5,
        };
        assert!(err.to_string().contains("3 free slot(s)"));
    }

    #[test]
    fn test_publish_blocked_counts_blocking_only() {
        let mut report = ViolationReport::new();
        report.push(Violation::new(
            ViolationKind::ForbiddenSlot,
            Priority::Hard,
            "bad slot",
        ));
        report.push(Violation::new(
            ViolationKind::RunTooShort,
            Priority::Low,
            "short run",
        ));
        let err = TimetableError::PublishBlocked(report);
        assert_eq!(err.to_string(), "publish blocked by 1 violation(s)");
    }
}
