//! Constraint violations and the priority-grouped report.
//!
//! The constraint engine returns a [`ViolationReport`] for every
//! evaluation; the report never blocks anything by itself — publishing
//! consults [`ViolationReport::is_publishable`], which is exactly
//! "zero priority-4 entries".

use serde::{Deserialize, Serialize};

use super::{Priority, Slot};

/// Classification of constraint violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A subject/teacher occupies a forbidden slot.
    ForbiddenSlot,
    /// A required slot is not occupied by the demanded subject/teacher.
    RequiredSlotMissing,
    /// Two periods of a no-consecutive subject are adjacent.
    AdjacentPlacement,
    /// A daily run exceeds its maximum length.
    RunTooLong,
    /// A daily run is shorter than its minimum length.
    RunTooShort,
    /// An ordering rule between two subjects is broken.
    OrderingBroken,
    /// A subject has fewer placed periods than its weekly quota.
    UnmetWeeklyHours,
    /// Two entries of one class share a slot.
    DoubleBooked,
}

/// A single constraint violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// What went wrong.
    pub kind: ViolationKind,
    /// Severity of the broken rule.
    pub priority: Priority,
    /// Originating constraint, if any (quota and double-booking checks
    /// are intrinsic and carry no constraint id).
    pub constraint_id: Option<String>,
    /// Subject involved, if any.
    pub subject_id: Option<String>,
    /// Teacher involved, if any.
    pub teacher_id: Option<String>,
    /// Offending slot, if the violation is slot-local.
    pub slot: Option<Slot>,
    /// Human-readable description.
    pub message: String,
}

impl Violation {
    /// Creates a violation with no entity references.
    pub fn new(kind: ViolationKind, priority: Priority, message: impl Into<String>) -> Self {
        Self {
            kind,
            priority,
            constraint_id: None,
            subject_id: None,
            teacher_id: None,
            slot: None,
            message: message.into(),
        }
    }

    /// Attaches the originating constraint id.
    pub fn with_constraint(mut self, id: impl Into<String>) -> Self {
        self.constraint_id = Some(id.into());
        self
    }

    /// Attaches the subject.
    pub fn with_subject(mut self, id: impl Into<String>) -> Self {
        self.subject_id = Some(id.into());
        self
    }

    /// Attaches the teacher.
    pub fn with_teacher(mut self, id: impl Into<String>) -> Self {
        self.teacher_id = Some(id.into());
        self
    }

    /// Attaches the offending slot.
    pub fn at(mut self, slot: Slot) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Whether this violation blocks publishing.
    #[inline]
    pub fn is_blocking(&self) -> bool {
        self.priority.is_blocking()
    }
}

/// Violations of one evaluation pass, grouped by priority on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationReport {
    violations: Vec<Violation>,
}

impl ViolationReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a violation.
    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Merges another report into this one.
    pub fn merge(&mut self, other: ViolationReport) {
        self.violations.extend(other.violations);
    }

    /// All violations, unordered.
    pub fn all(&self) -> &[Violation] {
        &self.violations
    }

    /// Violations at exactly the given priority.
    pub fn by_priority(&self, priority: Priority) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(move |v| v.priority == priority)
    }

    /// Priority-4 violations.
    pub fn blocking(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_blocking())
    }

    /// Number of priority-4 violations.
    pub fn blocking_len(&self) -> usize {
        self.blocking().count()
    }

    /// Violation counts per priority level, ascending.
    pub fn counts(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for v in &self.violations {
            counts[v.priority.level() as usize - 1] += 1;
        }
        counts
    }

    /// Violations of a given kind.
    pub fn of_kind<'a>(
        &'a self,
        kind: &'a ViolationKind,
    ) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations.iter().filter(move |v| &v.kind == kind)
    }

    /// Whether the schedule may be published: zero priority-4 entries.
    pub fn is_publishable(&self) -> bool {
        self.blocking_len() == 0
    }

    /// Total number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Whether the report is clean.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations sorted ascending by priority (used by the resolver to
    /// process soft violations first and blocking ones last).
    pub fn sorted_ascending(&self) -> Vec<Violation> {
        let mut sorted = self.violations.clone();
        sorted.sort_by_key(|v| v.priority);
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> ViolationReport {
        let mut report = ViolationReport::new();
        report.push(
            Violation::new(ViolationKind::ForbiddenSlot, Priority::Hard, "math on day 0")
                .with_constraint("c1")
                .with_subject("math")
                .at(Slot::new(0, 0)),
        );
        report.push(Violation::new(
            ViolationKind::UnmetWeeklyHours,
            Priority::High,
            "math short 1 period",
        ));
        report.push(Violation::new(
            ViolationKind::AdjacentPlacement,
            Priority::Low,
            "arabic back to back",
        ));
        report
    }

    #[test]
    fn test_grouping() {
        let report = sample_report();
        assert_eq!(report.len(), 3);
        assert_eq!(report.blocking_len(), 1);
        assert_eq!(report.by_priority(Priority::High).count(), 1);
        assert_eq!(report.by_priority(Priority::Medium).count(), 0);
        assert_eq!(report.counts(), [1, 0, 1, 1]);
    }

    #[test]
    fn test_publishable_is_exactly_zero_blocking() {
        let report = sample_report();
        assert!(!report.is_publishable());

        let mut soft_only = ViolationReport::new();
        soft_only.push(Violation::new(
            ViolationKind::RunTooShort,
            Priority::High,
            "single period",
        ));
        assert!(soft_only.is_publishable());
        assert!(ViolationReport::new().is_publishable());
    }

    #[test]
    fn test_sorted_ascending() {
        let sorted = sample_report().sorted_ascending();
        assert_eq!(sorted[0].priority, Priority::Low);
        assert_eq!(sorted[2].priority, Priority::Hard);
    }

    #[test]
    fn test_merge() {
        let mut a = sample_report();
        let b = sample_report();
        a.merge(b);
        assert_eq!(a.len(), 6);
        assert_eq!(a.blocking_len(), 2);
    }
}
