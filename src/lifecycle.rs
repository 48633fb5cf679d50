//! Draft/Publish lifecycle.
//!
//! [`ScheduleService`] owns the generated schedules, the availability
//! tracker, and the active constraint set, and gates every mutation:
//!
//! - `generate` runs the optimizer against snapshots and touches nothing;
//! - `adopt` commits the winning candidate's reservations as one atomic
//!   batch and stores the Draft;
//! - `edit` moves one entry with slot-local re-validation;
//! - `publish` requires a full, clean hard-constraint pass;
//! - `delete` releases every held reservation before removing entries.
//!
//! Edits to one schedule are serialized behind a per-schedule mutex;
//! commits serialize per teacher inside the tracker. Generations over
//! disjoint teacher sets never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use log::info;

use crate::availability::{AvailabilityTracker, OccupancyMeta, Ownership};
use crate::engine::{self, EvalContext};
use crate::error::{Result, TimetableError};
use crate::models::{
    Class, Constraint, GridShape, Schedule, ScheduleEntry, ScheduleStatus, Slot,
    TeacherAssignment, Violation, ViolationKind, ViolationReport,
};
use crate::optimizer::{GenerationInput, GenerationOutcome, Generator, ProgressFn};
use crate::validation::validate_constraints;

/// What beyond hard violations may block publishing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishPolicy {
    /// Also block when a weekly-hour quota is unmet (off by default:
    /// a shortfall caused purely by missing availability is reported
    /// but publishable).
    pub block_on_unmet_quota: bool,
}

struct ClassContext {
    class: Class,
    assignments: Vec<TeacherAssignment>,
}

/// Coordinates generation, editing, and publishing for all classes.
pub struct ScheduleService {
    tracker: AvailabilityTracker,
    shape: GridShape,
    contexts: RwLock<HashMap<String, ClassContext>>,
    constraints: RwLock<Vec<Constraint>>,
    schedules: RwLock<HashMap<String, Arc<Mutex<Schedule>>>>,
}

impl ScheduleService {
    /// Creates a service around a tracker.
    pub fn new(tracker: AvailabilityTracker) -> Self {
        let shape = tracker.shape();
        Self {
            tracker,
            shape,
            contexts: RwLock::new(HashMap::new()),
            constraints: RwLock::new(Vec::new()),
            schedules: RwLock::new(HashMap::new()),
        }
    }

    /// The underlying availability tracker.
    pub fn tracker(&self) -> &AvailabilityTracker {
        &self.tracker
    }

    /// Grid dimensions.
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Registers (or replaces) a class and its teacher assignments.
    pub fn register_class(&self, class: Class, assignments: Vec<TeacherAssignment>) {
        self.contexts
            .write()
            .expect("contexts lock poisoned")
            .insert(class.id.clone(), ClassContext { class, assignments });
    }

    /// Installs the active constraint set. Mutually contradictory
    /// constraints are disabled and returned as findings for manual
    /// review; the rest of the set stays active.
    pub fn set_constraints(&self, mut constraints: Vec<Constraint>) -> Vec<TimetableError> {
        let findings = validate_constraints(&mut constraints);
        *self.constraints.write().expect("constraints lock poisoned") = constraints;
        findings
    }

    /// The active constraint set.
    pub fn constraints(&self) -> Vec<Constraint> {
        self.constraints
            .read()
            .expect("constraints lock poisoned")
            .clone()
    }

    /// Runs generation for a class against fresh availability
    /// snapshots. The tracker is not modified; pass the outcome to
    /// [`ScheduleService::adopt`] to commit it.
    pub fn generate(
        &self,
        class_id: &str,
        generator: &Generator,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<GenerationOutcome> {
        let (class, assignments) = self.class_context(class_id)?;
        let constraints = self.constraints();

        let mut availability = HashMap::new();
        for a in &assignments {
            if a.class_id != class_id || availability.contains_key(&a.teacher_id) {
                continue;
            }
            // Unregistered teachers are left out; the optimizer skips
            // their subjects as data-missing.
            if let Ok(snapshot) = self.tracker.snapshot(&a.teacher_id) {
                availability.insert(a.teacher_id.clone(), snapshot);
            }
        }

        let input = GenerationInput {
            class: &class,
            assignments: &assignments,
            constraints: &constraints,
            shape: self.shape,
            availability,
        };
        Ok(generator.generate(&input, progress))
    }

    /// Stores a generation outcome as the class's Draft, committing its
    /// reservations as one atomic batch. An existing schedule for the
    /// class is deleted (and its reservations released) first.
    ///
    /// A [`TimetableError::SlotConflict`] here means the tracker changed
    /// between snapshot and commit; nothing is stored and the caller
    /// should regenerate against fresh snapshots.
    pub fn adopt(&self, outcome: GenerationOutcome) -> Result<()> {
        let class_id = outcome.schedule.class_id.clone();
        self.class_context(&class_id)?;
        if self.schedules
            .read()
            .expect("schedules lock poisoned")
            .contains_key(&class_id)
        {
            self.delete(&class_id)?;
        }

        self.tracker
            .commit_batch(outcome.schedule.entries(), Ownership::Generator)?;
        info!(
            "adopted draft for class {class_id}: {} entries",
            outcome.schedule.len()
        );
        self.schedules
            .write()
            .expect("schedules lock poisoned")
            .insert(class_id, Arc::new(Mutex::new(outcome.schedule)));
        Ok(())
    }

    /// Moves one entry to another slot, re-validating only the affected
    /// slots' days for responsiveness. A full pass still guards
    /// `publish`. Fails without side effects if the target slot is
    /// taken by the class or the teacher.
    pub fn edit(&self, class_id: &str, from: Slot, to: Slot) -> Result<ViolationReport> {
        if !self.shape.contains(to) {
            return Err(TimetableError::SlotOutOfRange {
                slot: to,
                shape: self.shape,
            });
        }
        let (class, assignments) = self.class_context(class_id)?;
        let constraints = self.constraints();
        let arc = self.schedule_arc(class_id)?;
        let mut schedule = arc.lock().expect("schedule lock poisoned");

        if schedule.is_published() {
            return Err(TimetableError::PublishedImmutable(class_id.to_string()));
        }
        let entry = schedule
            .entry_at(from)
            .cloned()
            .ok_or_else(|| TimetableError::EntryNotFound {
                class_id: class_id.to_string(),
                slot: from,
            })?;

        let ctx = EvalContext {
            class: &class,
            assignments: &assignments,
            shape: self.shape,
        };
        if to == from {
            return Ok(engine::evaluate_slot(&schedule, &constraints, &ctx, to));
        }
        if schedule.entry_at(to).is_some() {
            return Err(TimetableError::DuplicateEntry {
                class_id: class_id.to_string(),
                slot: to,
            });
        }

        // Reserve the target before releasing the source so a busy
        // teacher slot leaves everything untouched.
        self.tracker.reserve(
            &entry.teacher_id,
            to,
            OccupancyMeta::new(&entry.class_id, &entry.subject_id),
            Ownership::Generator,
        )?;
        self.tracker.release(&entry.teacher_id, from)?;

        schedule.remove(from);
        schedule
            .insert(ScheduleEntry::new(
                &entry.class_id,
                to,
                &entry.subject_id,
                &entry.teacher_id,
            ))
            .expect("target slot verified empty");

        let mut report = engine::evaluate_slot(&schedule, &constraints, &ctx, to);
        if from.day != to.day {
            report.merge(engine::evaluate_slot(&schedule, &constraints, &ctx, from));
        }
        Ok(report)
    }

    /// Removes one entry from a Draft, releasing its reservation.
    pub fn remove_entry(&self, class_id: &str, slot: Slot) -> Result<ScheduleEntry> {
        let arc = self.schedule_arc(class_id)?;
        let mut schedule = arc.lock().expect("schedule lock poisoned");
        if schedule.is_published() {
            return Err(TimetableError::PublishedImmutable(class_id.to_string()));
        }
        let entry = schedule
            .remove(slot)
            .ok_or_else(|| TimetableError::EntryNotFound {
                class_id: class_id.to_string(),
                slot,
            })?;
        self.tracker.release(&entry.teacher_id, slot)?;
        Ok(entry)
    }

    /// Full constraint-engine pass over the class's current schedule.
    pub fn report(&self, class_id: &str) -> Result<ViolationReport> {
        let (class, assignments) = self.class_context(class_id)?;
        let constraints = self.constraints();
        let arc = self.schedule_arc(class_id)?;
        let schedule = arc.lock().expect("schedule lock poisoned");
        let ctx = EvalContext {
            class: &class,
            assignments: &assignments,
            shape: self.shape,
        };
        Ok(engine::evaluate(&schedule, &constraints, &ctx))
    }

    /// Publishes a Draft. Succeeds only if a full evaluation yields
    /// zero priority-4 violations (and, under a strict policy, no unmet
    /// quotas); otherwise the schedule stays Draft and the blocking
    /// report is returned in the error.
    pub fn publish(&self, class_id: &str, policy: &PublishPolicy) -> Result<ViolationReport> {
        let (class, assignments) = self.class_context(class_id)?;
        let constraints = self.constraints();
        let arc = self.schedule_arc(class_id)?;
        let mut schedule = arc.lock().expect("schedule lock poisoned");

        let ctx = EvalContext {
            class: &class,
            assignments: &assignments,
            shape: self.shape,
        };
        let report = engine::evaluate(&schedule, &constraints, &ctx);

        let quota_blocked = policy.block_on_unmet_quota
            && report
                .of_kind(&ViolationKind::UnmetWeeklyHours)
                .next()
                .is_some();
        if !report.is_publishable() || quota_blocked {
            return Err(TimetableError::PublishBlocked(report));
        }

        schedule.status = ScheduleStatus::Published;
        schedule.meta.unresolved = report.counts();
        info!(
            "published schedule for class {class_id} with {} warning(s)",
            report.len()
        );
        Ok(report)
    }

    /// Returns a Published schedule to Draft.
    pub fn unpublish(&self, class_id: &str) -> Result<()> {
        let arc = self.schedule_arc(class_id)?;
        let mut schedule = arc.lock().expect("schedule lock poisoned");
        schedule.status = ScheduleStatus::Draft;
        Ok(())
    }

    /// Deletes a schedule on any status, releasing every reservation it
    /// holds in the tracker before removing the entries.
    pub fn delete(&self, class_id: &str) -> Result<Schedule> {
        let arc = self
            .schedules
            .write()
            .expect("schedules lock poisoned")
            .remove(class_id)
            .ok_or_else(|| TimetableError::UnknownSchedule(class_id.to_string()))?;
        let schedule = arc.lock().expect("schedule lock poisoned");
        self.tracker.release_batch(schedule.entries())?;
        info!(
            "deleted schedule for class {class_id}; released {} reservation(s)",
            schedule.len()
        );
        Ok(schedule.clone())
    }

    /// Snapshot of the class's current schedule.
    pub fn schedule(&self, class_id: &str) -> Result<Schedule> {
        let arc = self.schedule_arc(class_id)?;
        let schedule = arc.lock().expect("schedule lock poisoned");
        Ok(schedule.clone())
    }

    /// Records a soft violation as an acknowledged exception on the
    /// schedule. Blocking violations cannot be acknowledged away.
    pub fn acknowledge(&self, class_id: &str, violation: Violation) -> Result<()> {
        if violation.is_blocking() {
            return Err(TimetableError::BlockingNotIgnorable);
        }
        let arc = self.schedule_arc(class_id)?;
        let mut schedule = arc.lock().expect("schedule lock poisoned");
        schedule.meta.acknowledged.push(violation);
        Ok(())
    }

    fn class_context(&self, class_id: &str) -> Result<(Class, Vec<TeacherAssignment>)> {
        let contexts = self.contexts.read().expect("contexts lock poisoned");
        let ctx = contexts
            .get(class_id)
            .ok_or_else(|| TimetableError::UnknownClass(class_id.to_string()))?;
        Ok((ctx.class.clone(), ctx.assignments.clone()))
    }

    fn schedule_arc(&self, class_id: &str) -> Result<Arc<Mutex<Schedule>>> {
        self.schedules
            .read()
            .expect("schedules lock poisoned")
            .get(class_id)
            .cloned()
            .ok_or_else(|| TimetableError::UnknownSchedule(class_id.to_string()))
    }
}
