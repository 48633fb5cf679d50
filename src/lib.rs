//! Class-timetable generation engine.
//!
//! Given classes with weekly-hour subject quotas, teachers with declared
//! free time, and a prioritized constraint set, produces a weekly
//! day×period assignment of subject+teacher per class that satisfies
//! hard constraints and minimizes soft violations — without ever
//! double-booking a teacher.
//!
//! # Modules
//!
//! - **`models`**: domain types — `Class`, `Teacher`, `Constraint`,
//!   `ScheduleEntry`, `Schedule`, `ViolationReport`
//! - **`availability`**: per-teacher slot grids; single source of truth
//!   for bookings
//! - **`engine`**: pure constraint evaluation
//! - **`validation`**: input integrity and contradiction checks
//! - **`optimizer`**: greedy seeding + evolutionary search under a time
//!   budget
//! - **`lifecycle`**: Draft → Published state machine with atomic
//!   reservation commits
//! - **`resolver`**: auto/manual resolution of reported violations
//! - **`export`**: stable read model for external renderers
//!
//! # Flow
//!
//! Domain model → availability tracker → constraint engine → optimizer
//! → draft/publish → conflict resolver → (external export renderer).
//! Persistence, rendering, and UI are collaborators outside this crate.

pub mod availability;
pub mod engine;
pub mod error;
pub mod export;
pub mod lifecycle;
pub mod models;
pub mod optimizer;
pub mod resolver;
pub mod validation;

pub use error::{Result, TimetableError};
