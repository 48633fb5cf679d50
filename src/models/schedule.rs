//! Schedule (solution) model.
//!
//! A schedule is the weekly timetable of one class: a set of entries
//! assigning subject+teacher to slots, a draft/publish status, and
//! generation metadata. Entries are unique per slot; the cross-class
//! teacher uniqueness invariant is owned by the availability tracker.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimetableError};

use super::{Priority, Slot, Violation};

/// One subject+teacher placement in a class timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Owning class.
    pub class_id: String,
    /// Grid position.
    pub slot: Slot,
    /// Subject taught in this period.
    pub subject_id: String,
    /// Teacher delivering it.
    pub teacher_id: String,
}

impl ScheduleEntry {
    /// Creates an entry.
    pub fn new(
        class_id: impl Into<String>,
        slot: Slot,
        subject_id: impl Into<String>,
        teacher_id: impl Into<String>,
    ) -> Self {
        Self {
            class_id: class_id.into(),
            slot,
            subject_id: subject_id.into(),
            teacher_id: teacher_id.into(),
        }
    }
}

/// Lifecycle status of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStatus {
    /// Generated, editable, not yet in force.
    Draft,
    /// In force; immutable until unpublished or deleted.
    Published,
}

/// Metadata attached to a generated schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationMeta {
    /// Fitness of the winning candidate (lower = better).
    pub fitness: f64,
    /// Generations the search ran for.
    pub generations: u32,
    /// Unresolved violation counts per priority level, ascending.
    pub unresolved: [usize; 4],
    /// Soft violations the operator chose to ignore.
    pub acknowledged: Vec<Violation>,
}

impl GenerationMeta {
    /// Records the unresolved counts from a report's `counts()`.
    pub fn with_unresolved(mut self, counts: [usize; 4]) -> Self {
        self.unresolved = counts;
        self
    }

    /// Unresolved violations at a given priority.
    pub fn unresolved_at(&self, priority: Priority) -> usize {
        self.unresolved[priority.level() as usize - 1]
    }
}

/// The weekly timetable of one class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    /// Owning class.
    pub class_id: String,
    /// Slot assignments, kept sorted by slot.
    entries: Vec<ScheduleEntry>,
    /// Draft/Published status.
    pub status: ScheduleStatus,
    /// Generation metadata.
    pub meta: GenerationMeta,
}

impl Schedule {
    /// Creates an empty draft for a class.
    pub fn new(class_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            entries: Vec::new(),
            status: ScheduleStatus::Draft,
            meta: GenerationMeta::default(),
        }
    }

    /// All entries, sorted by slot.
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Inserts an entry, rejecting a second entry for the same slot.
    pub fn insert(&mut self, entry: ScheduleEntry) -> Result<()> {
        if self.entry_at(entry.slot).is_some() {
            return Err(TimetableError::DuplicateEntry {
                class_id: self.class_id.clone(),
                slot: entry.slot,
            });
        }
        let pos = self
            .entries
            .partition_point(|e| e.slot < entry.slot);
        self.entries.insert(pos, entry);
        Ok(())
    }

    /// Removes and returns the entry at a slot.
    pub fn remove(&mut self, slot: Slot) -> Option<ScheduleEntry> {
        let pos = self.entries.iter().position(|e| e.slot == slot)?;
        Some(self.entries.remove(pos))
    }

    /// Entry at a slot, if any.
    pub fn entry_at(&self, slot: Slot) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| e.slot == slot)
    }

    /// Entries for a subject.
    pub fn entries_for_subject(&self, subject_id: &str) -> Vec<&ScheduleEntry> {
        self.entries
            .iter()
            .filter(|e| e.subject_id == subject_id)
            .collect()
    }

    /// Entries taught by a teacher.
    pub fn entries_for_teacher(&self, teacher_id: &str) -> Vec<&ScheduleEntry> {
        self.entries
            .iter()
            .filter(|e| e.teacher_id == teacher_id)
            .collect()
    }

    /// Entries on a given day, in period order.
    pub fn entries_on_day(&self, day: u8) -> Vec<&ScheduleEntry> {
        self.entries.iter().filter(|e| e.slot.day == day).collect()
    }

    /// Placed periods for a subject.
    pub fn subject_hours(&self, subject_id: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.subject_id == subject_id)
            .count()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the schedule has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the schedule is published.
    pub fn is_published(&self) -> bool {
        self.status == ScheduleStatus::Published
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schedule() -> Schedule {
        let mut s = Schedule::new("7a");
        s.insert(ScheduleEntry::new("7a", Slot::new(0, 0), "math", "t1"))
            .unwrap();
        s.insert(ScheduleEntry::new("7a", Slot::new(0, 1), "arabic", "t2"))
            .unwrap();
        s.insert(ScheduleEntry::new("7a", Slot::new(2, 3), "math", "t1"))
            .unwrap();
        s
    }

    #[test]
    fn test_insert_rejects_slot_collision() {
        let mut s = sample_schedule();
        let err = s
            .insert(ScheduleEntry::new("7a", Slot::new(0, 0), "sport", "t3"))
            .unwrap_err();
        assert!(matches!(err, TimetableError::DuplicateEntry { .. }));
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn test_entries_sorted_by_slot() {
        let mut s = Schedule::new("7a");
        s.insert(ScheduleEntry::new("7a", Slot::new(3, 1), "math", "t1"))
            .unwrap();
        s.insert(ScheduleEntry::new("7a", Slot::new(0, 2), "math", "t1"))
            .unwrap();
        let slots: Vec<Slot> = s.entries().iter().map(|e| e.slot).collect();
        assert_eq!(slots, vec![Slot::new(0, 2), Slot::new(3, 1)]);
    }

    #[test]
    fn test_remove_and_lookup() {
        let mut s = sample_schedule();
        assert!(s.entry_at(Slot::new(0, 1)).is_some());
        let removed = s.remove(Slot::new(0, 1)).unwrap();
        assert_eq!(removed.subject_id, "arabic");
        assert!(s.entry_at(Slot::new(0, 1)).is_none());
        assert!(s.remove(Slot::new(4, 4)).is_none());
    }

    #[test]
    fn test_subject_and_teacher_queries() {
        let s = sample_schedule();
        assert_eq!(s.subject_hours("math"), 2);
        assert_eq!(s.subject_hours("physics"), 0);
        assert_eq!(s.entries_for_teacher("t1").len(), 2);
        assert_eq!(s.entries_on_day(0).len(), 2);
    }

    #[test]
    fn test_new_schedule_is_draft() {
        let s = Schedule::new("7a");
        assert_eq!(s.status, ScheduleStatus::Draft);
        assert!(!s.is_published());
        assert!(s.is_empty());
    }

    #[test]
    fn test_meta_unresolved_counts() {
        let meta = GenerationMeta::default().with_unresolved([0, 2, 1, 0]);
        assert_eq!(meta.unresolved_at(Priority::Medium), 2);
        assert_eq!(meta.unresolved_at(Priority::Hard), 0);
    }
}
