//! Timetabling domain models.
//!
//! Core value types for the class-timetable engine: the weekly grid,
//! classes with subject quotas, teachers with declared free time,
//! constraints with priorities, and the schedule solution itself.
//!
//! # Invariants
//!
//! - At most one [`ScheduleEntry`] per (class, slot) — enforced by
//!   [`Schedule::insert`].
//! - At most one entry per (teacher, slot) across all classes — enforced
//!   by the availability tracker.
//! - [`Priority::Hard`] violations must be zero for a schedule to be
//!   published.

mod class;
mod constraint;
mod schedule;
mod slot;
mod teacher;
mod violation;

pub use class::{Class, Session, SubjectRequirement};
pub use constraint::{
    Constraint, ConstraintRule, ConstraintScope, OrderSide, Priority, SlotFilter,
};
pub use schedule::{GenerationMeta, Schedule, ScheduleEntry, ScheduleStatus};
pub use slot::{GridShape, Slot, MAX_DAYS, MAX_PERIODS};
pub use teacher::{Teacher, TeacherAssignment};
pub use violation::{Violation, ViolationKind, ViolationReport};
