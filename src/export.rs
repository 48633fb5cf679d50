//! Read model for external export renderers.
//!
//! The engine owns no output format. Finalized schedules are handed to
//! collaborators as a flat, stable list of rows; days and periods are
//! 1-based at this boundary (day 1..7, period 1..N), matching how the
//! surrounding application numbers them.

use serde::{Deserialize, Serialize};

use crate::models::Schedule;

/// One row of the export read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub class_id: String,
    /// Day of week, 1-based (1..7).
    pub day: u8,
    /// Period within the day, 1-based (1..N).
    pub period: u8,
    pub subject_id: String,
    pub teacher_id: String,
}

/// Flattens a schedule into export rows, sorted by day then period.
pub fn read_model(schedule: &Schedule) -> Vec<ExportRow> {
    // Entries are already slot-sorted.
    schedule
        .entries()
        .iter()
        .map(|e| ExportRow {
            class_id: e.class_id.clone(),
            day: e.slot.day + 1,
            period: e.slot.period + 1,
            subject_id: e.subject_id.clone(),
            teacher_id: e.teacher_id.clone(),
        })
        .collect()
}
