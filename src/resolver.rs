//! Conflict resolution.
//!
//! Turns a violation report into resolution actions:
//!
//! - `auto_relocate` — find an alternate feasible slot for the single
//!   offending entry, reusing the optimizer's slot-feasibility check;
//! - `manual_edit` — caller supplies the replacement slot, re-validated
//!   immediately;
//! - `ignore` — soft violations only, recorded as an acknowledged
//!   exception on the schedule;
//! - `auto_resolve_all` — relocation sweep in ascending priority order
//!   with blocking violations last, stopping with an error when a
//!   blocking violation cannot be cleared within the attempt budget.

use log::{debug, info};

use crate::error::{Result, TimetableError};
use crate::lifecycle::ScheduleService;
use crate::models::{Slot, Violation, ViolationReport};
use crate::optimizer;

/// Outcome of a single resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The offending entry moved to a feasible slot.
    Relocated { from: Slot, to: Slot },
    /// No feasible relocation cleared the violation; everything was
    /// put back where it started.
    Failed,
}

/// Tally of an [`ConflictResolver::auto_resolve_all`] sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionSummary {
    /// Violations cleared by relocation.
    pub resolved: usize,
    /// Violations that had vanished by the time they were attempted
    /// (cleared as a side effect of an earlier relocation).
    pub vanished: usize,
    /// Violations still standing after the sweep.
    pub failed: Vec<Violation>,
}

/// Resolves violations against a live [`ScheduleService`].
pub struct ConflictResolver<'a> {
    service: &'a ScheduleService,
    max_attempts: usize,
}

impl<'a> ConflictResolver<'a> {
    /// Creates a resolver with the default attempt budget.
    pub fn new(service: &'a ScheduleService) -> Self {
        Self {
            service,
            max_attempts: 8,
        }
    }

    /// Caps relocation attempts per violation.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Searches alternate feasible slots for the entry behind a
    /// violation, moving it until the violation clears. On failure the
    /// entry is restored to its original slot.
    ///
    /// Violations without an offending entry (unmet quotas, missing
    /// required slots) cannot be relocated and error with
    /// [`TimetableError::EntryNotFound`].
    pub fn auto_relocate(&self, class_id: &str, violation: &Violation) -> Result<Resolution> {
        let origin = violation.slot.ok_or_else(|| TimetableError::EntryNotFound {
            class_id: class_id.to_string(),
            slot: Slot::new(0, 0),
        })?;
        let schedule = self.service.schedule(class_id)?;
        let entry = schedule
            .entry_at(origin)
            .cloned()
            .ok_or_else(|| TimetableError::EntryNotFound {
                class_id: class_id.to_string(),
                slot: origin,
            })?;

        let constraints = self.service.constraints();
        let teacher_grid = self.service.tracker().snapshot(&entry.teacher_id)?;
        let candidates = optimizer::feasible_slots(
            &schedule,
            class_id,
            &entry.subject_id,
            &entry.teacher_id,
            &constraints,
            self.service.shape(),
            |slot| teacher_grid.is_free(slot),
        );

        let mut current = origin;
        for to in candidates.into_iter().take(self.max_attempts) {
            self.service.edit(class_id, current, to)?;
            current = to;
            let report = self.service.report(class_id)?;
            if !contains_violation(&report, violation) {
                debug!(
                    "relocated {} entry {origin} -> {to} for class {class_id}",
                    entry.subject_id
                );
                return Ok(Resolution::Relocated { from: origin, to });
            }
        }

        if current != origin {
            self.service.edit(class_id, current, origin)?;
        }
        Ok(Resolution::Failed)
    }

    /// Applies a caller-chosen replacement slot and returns the
    /// immediate local re-validation.
    pub fn manual_edit(
        &self,
        class_id: &str,
        from: Slot,
        to: Slot,
    ) -> Result<ViolationReport> {
        self.service.edit(class_id, from, to)
    }

    /// Records a soft violation as an acknowledged exception.
    /// Rejected for blocking violations.
    pub fn ignore(&self, class_id: &str, violation: Violation) -> Result<()> {
        self.service.acknowledge(class_id, violation)
    }

    /// Relocation sweep over the class's current report: soft
    /// violations in ascending priority first, blocking violations
    /// last. Stops with [`TimetableError::ResolutionFailed`] as soon as
    /// a blocking violation survives its attempt budget.
    pub fn auto_resolve_all(&self, class_id: &str) -> Result<ResolutionSummary> {
        let initial = self.service.report(class_id)?;
        let mut summary = ResolutionSummary::default();

        for violation in initial.sorted_ascending() {
            // Earlier relocations may have cleared this one already.
            let report = self.service.report(class_id)?;
            if !contains_violation(&report, &violation) {
                summary.vanished += 1;
                continue;
            }

            let resolution = match self.auto_relocate(class_id, &violation) {
                Ok(r) => r,
                // Not relocatable (no offending entry): leave standing.
                Err(TimetableError::EntryNotFound { .. }) => Resolution::Failed,
                Err(other) => return Err(other),
            };

            match resolution {
                Resolution::Relocated { .. } => summary.resolved += 1,
                Resolution::Failed => {
                    if violation.is_blocking() {
                        let remaining = self
                            .service
                            .report(class_id)?
                            .blocking_len();
                        return Err(TimetableError::ResolutionFailed { remaining });
                    }
                    summary.failed.push(violation);
                }
            }
        }

        info!(
            "auto-resolve for class {class_id}: {} resolved, {} vanished, {} failed",
            summary.resolved,
            summary.vanished,
            summary.failed.len()
        );
        Ok(summary)
    }
}

/// Identity match for re-checking a violation after edits: same rule,
/// same entities. The slot is intentionally excluded — a violation that
/// merely moved with its entry still counts as unresolved.
fn contains_violation(report: &ViolationReport, violation: &Violation) -> bool {
    report.all().iter().any(|v| {
        v.kind == violation.kind
            && v.constraint_id == violation.constraint_id
            && v.subject_id == violation.subject_id
            && v.teacher_id == violation.teacher_id
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::AvailabilityTracker;
    use crate::models::{
        Class, Constraint, GridShape, Priority, Schedule, ScheduleEntry, Teacher,
        TeacherAssignment, ViolationKind,
    };
    use crate::optimizer::{FillStats, GenerationOutcome};

    /// Adopts a handcrafted schedule through the service.
    fn adopt_entries(service: &ScheduleService, class_id: &str, entries: Vec<ScheduleEntry>) {
        let mut schedule = Schedule::new(class_id);
        for e in entries {
            schedule.insert(e).unwrap();
        }
        let outcome = GenerationOutcome {
            schedule,
            report: ViolationReport::new(),
            stats: FillStats::default(),
            skipped: Vec::new(),
            shortfalls: Vec::new(),
        };
        service.adopt(outcome).unwrap();
    }

    fn setup() -> ScheduleService {
        let shape = GridShape::default();
        let tracker = AvailabilityTracker::new(shape);
        tracker.register_teacher(&Teacher::new("t1", shape).all_free());
        tracker.register_teacher(&Teacher::new("t2", shape).all_free());
        let service = ScheduleService::new(tracker);
        service.register_class(
            Class::new("7a").with_subject("math", 2).with_subject("arabic", 1),
            vec![
                TeacherAssignment::new("7a", "math", "t1"),
                TeacherAssignment::new("7a", "arabic", "t2"),
            ],
        );
        service
    }

    #[test]
    fn test_auto_relocate_clears_forbidden_slot() {
        let service = setup();
        adopt_entries(
            &service,
            "7a",
            vec![
                ScheduleEntry::new("7a", Slot::new(0, 0), "math", "t1"),
                ScheduleEntry::new("7a", Slot::new(1, 0), "math", "t1"),
                ScheduleEntry::new("7a", Slot::new(2, 0), "arabic", "t2"),
            ],
        );
        service.set_constraints(vec![
            Constraint::forbidden("c1", "math", Slot::new(0, 0)).hard()
        ]);

        let report = service.report("7a").unwrap();
        let violation = report.blocking().next().unwrap().clone();

        let resolver = ConflictResolver::new(&service);
        let resolution = resolver.auto_relocate("7a", &violation).unwrap();
        match resolution {
            Resolution::Relocated { from, to } => {
                assert_eq!(from, Slot::new(0, 0));
                assert_ne!(to, Slot::new(0, 0));
            }
            other => panic!("expected relocation, got {other:?}"),
        }
        assert!(service.report("7a").unwrap().is_publishable());
        // The tracker followed the move.
        assert!(service.tracker().snapshot("t1").unwrap().is_free(Slot::new(0, 0)));
    }

    #[test]
    fn test_auto_relocate_restores_on_failure() {
        let shape = GridShape::default();
        let tracker = AvailabilityTracker::new(shape);
        // t1 free only at the forbidden slot: nowhere to go.
        tracker.register_teacher(&Teacher::new("t1", shape).with_free_slot(0, 0));
        let service = ScheduleService::new(tracker);
        service.register_class(
            Class::new("7a").with_subject("math", 1),
            vec![TeacherAssignment::new("7a", "math", "t1")],
        );
        adopt_entries(
            &service,
            "7a",
            vec![ScheduleEntry::new("7a", Slot::new(0, 0), "math", "t1")],
        );
        service.set_constraints(vec![
            Constraint::forbidden("c1", "math", Slot::new(0, 0)).hard()
        ]);

        let violation = service.report("7a").unwrap().blocking().next().unwrap().clone();
        let resolver = ConflictResolver::new(&service);
        assert_eq!(
            resolver.auto_relocate("7a", &violation).unwrap(),
            Resolution::Failed
        );
        // Entry still where it was.
        assert!(service
            .schedule("7a")
            .unwrap()
            .entry_at(Slot::new(0, 0))
            .is_some());
    }

    #[test]
    fn test_auto_relocate_needs_offending_entry() {
        let service = setup();
        adopt_entries(
            &service,
            "7a",
            vec![ScheduleEntry::new("7a", Slot::new(0, 0), "math", "t1")],
        );
        let resolver = ConflictResolver::new(&service);

        // Quota shortfall carries no offending entry.
        let quota = Violation::new(
            ViolationKind::UnmetWeeklyHours,
            Priority::High,
            "math short",
        );
        let err = resolver.auto_relocate("7a", &quota).unwrap_err();
        assert!(matches!(err, TimetableError::EntryNotFound { .. }));
    }

    #[test]
    fn test_ignore_records_exception_soft_only() {
        let service = setup();
        adopt_entries(
            &service,
            "7a",
            vec![ScheduleEntry::new("7a", Slot::new(0, 0), "math", "t1")],
        );
        let resolver = ConflictResolver::new(&service);

        let soft = Violation::new(
            ViolationKind::AdjacentPlacement,
            Priority::Medium,
            "back to back",
        );
        resolver.ignore("7a", soft).unwrap();
        assert_eq!(service.schedule("7a").unwrap().meta.acknowledged.len(), 1);

        let hard = Violation::new(ViolationKind::ForbiddenSlot, Priority::Hard, "no");
        assert!(matches!(
            resolver.ignore("7a", hard).unwrap_err(),
            TimetableError::BlockingNotIgnorable
        ));
    }

    #[test]
    fn test_auto_resolve_all_clears_mixed_priorities() {
        let service = setup();
        adopt_entries(
            &service,
            "7a",
            vec![
                ScheduleEntry::new("7a", Slot::new(0, 0), "math", "t1"),
                ScheduleEntry::new("7a", Slot::new(1, 0), "math", "t1"),
                ScheduleEntry::new("7a", Slot::new(2, 0), "arabic", "t2"),
            ],
        );
        service.set_constraints(vec![
            Constraint::forbidden("c-hard", "math", Slot::new(0, 0)).hard(),
            Constraint::forbidden("c-soft", "arabic", Slot::new(2, 0))
                .with_priority(Priority::Low),
        ]);
        assert_eq!(service.report("7a").unwrap().len(), 2);

        let resolver = ConflictResolver::new(&service);
        let summary = resolver.auto_resolve_all("7a").unwrap();
        assert_eq!(summary.resolved, 2);
        assert!(summary.failed.is_empty());
        assert!(service.report("7a").unwrap().is_empty());
    }

    #[test]
    fn test_auto_resolve_all_fails_on_stuck_blocking() {
        let shape = GridShape::default();
        let tracker = AvailabilityTracker::new(shape);
        tracker.register_teacher(&Teacher::new("t1", shape).with_free_slot(0, 0));
        let service = ScheduleService::new(tracker);
        service.register_class(
            Class::new("7a").with_subject("math", 1),
            vec![TeacherAssignment::new("7a", "math", "t1")],
        );
        adopt_entries(
            &service,
            "7a",
            vec![ScheduleEntry::new("7a", Slot::new(0, 0), "math", "t1")],
        );
        service.set_constraints(vec![
            Constraint::forbidden("c1", "math", Slot::new(0, 0)).hard()
        ]);

        let resolver = ConflictResolver::new(&service);
        let err = resolver.auto_resolve_all("7a").unwrap_err();
        match err {
            TimetableError::ResolutionFailed { remaining } => assert_eq!(remaining, 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_auto_resolve_all_leaves_soft_failures_standing() {
        let shape = GridShape::default();
        let tracker = AvailabilityTracker::new(shape);
        tracker.register_teacher(&Teacher::new("t1", shape).with_free_slot(0, 0));
        let service = ScheduleService::new(tracker);
        service.register_class(
            Class::new("7a").with_subject("math", 1),
            vec![TeacherAssignment::new("7a", "math", "t1")],
        );
        adopt_entries(
            &service,
            "7a",
            vec![ScheduleEntry::new("7a", Slot::new(0, 0), "math", "t1")],
        );
        // Soft dislike of the only slot the teacher has: unresolvable,
        // but not fatal.
        service.set_constraints(vec![Constraint::forbidden(
            "c1",
            "math",
            Slot::new(0, 0),
        )
        .with_priority(Priority::Medium)]);

        let resolver = ConflictResolver::new(&service);
        let summary = resolver.auto_resolve_all("7a").unwrap();
        assert_eq!(summary.resolved, 0);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].priority, Priority::Medium);
    }

    #[test]
    fn test_manual_edit_revalidates() {
        let service = setup();
        adopt_entries(
            &service,
            "7a",
            vec![
                ScheduleEntry::new("7a", Slot::new(0, 0), "math", "t1"),
                ScheduleEntry::new("7a", Slot::new(0, 2), "math", "t1"),
            ],
        );
        service.set_constraints(vec![Constraint::no_consecutive("c1", "math").hard()]);

        let resolver = ConflictResolver::new(&service);
        // Moving (0,2) next to (0,0) surfaces the violation immediately.
        let report = resolver.manual_edit("7a", Slot::new(0, 2), Slot::new(0, 1)).unwrap();
        assert_eq!(report.blocking_len(), 1);

        // Moving it away clears it.
        let report = resolver.manual_edit("7a", Slot::new(0, 1), Slot::new(0, 4)).unwrap();
        assert!(report.is_publishable());
    }
}
