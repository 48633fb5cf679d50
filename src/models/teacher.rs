//! Teacher model.
//!
//! A teacher declares a weekly free-slot grid before any generation run.
//! The declared grid is the outer bound on what the availability tracker
//! may ever book: slots not declared free are unavailable to the engine.

use serde::{Deserialize, Serialize};

use super::{GridShape, Slot};

/// A teacher with a declared weekly free-slot grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    /// Unique teacher identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Grid dimensions the free grid is laid out over.
    pub shape: GridShape,
    /// Declared free slots, dense row-major over `shape`.
    free: Vec<bool>,
}

impl Teacher {
    /// Creates a teacher with no declared free time.
    pub fn new(id: impl Into<String>, shape: GridShape) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            shape,
            free: vec![false; shape.slot_count()],
        }
    }

    /// Sets the teacher name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declares a single slot free.
    pub fn with_free_slot(mut self, day: u8, period: u8) -> Self {
        self.set_free(Slot::new(day, period), true);
        self
    }

    /// Declares every slot in the grid free.
    pub fn all_free(mut self) -> Self {
        self.free.fill(true);
        self
    }

    /// Declares a whole day free.
    pub fn with_free_day(mut self, day: u8) -> Self {
        for slot in self.shape.day_slots(day) {
            self.set_free(slot, true);
        }
        self
    }

    /// Updates the declared state of one slot. Out-of-grid slots are ignored.
    pub fn set_free(&mut self, slot: Slot, free: bool) {
        if self.shape.contains(slot) {
            let idx = self.shape.index(slot);
            self.free[idx] = free;
        }
    }

    /// Whether the teacher declared this slot free.
    pub fn is_free(&self, slot: Slot) -> bool {
        self.shape.contains(slot) && self.free[self.shape.index(slot)]
    }

    /// Number of declared free slots in the week.
    pub fn declared_free_count(&self) -> usize {
        self.free.iter().filter(|f| **f).count()
    }
}

/// Links a teacher to a subject they teach for a specific class.
///
/// The generation run consults these to resolve which teacher covers
/// each subject; a subject without an assignment cannot be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherAssignment {
    /// Class receiving the lessons.
    pub class_id: String,
    /// Subject taught.
    pub subject_id: String,
    /// Teacher delivering it.
    pub teacher_id: String,
}

impl TeacherAssignment {
    /// Creates a new assignment.
    pub fn new(
        class_id: impl Into<String>,
        subject_id: impl Into<String>,
        teacher_id: impl Into<String>,
    ) -> Self {
        Self {
            class_id: class_id.into(),
            subject_id: subject_id.into(),
            teacher_id: teacher_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teacher_starts_unavailable() {
        let t = Teacher::new("t1", GridShape::default());
        assert_eq!(t.declared_free_count(), 0);
        assert!(!t.is_free(Slot::new(0, 0)));
    }

    #[test]
    fn test_free_slot_builder() {
        let t = Teacher::new("t1", GridShape::default())
            .with_name("Sara")
            .with_free_slot(0, 1)
            .with_free_slot(2, 3);

        assert_eq!(t.name, "Sara");
        assert_eq!(t.declared_free_count(), 2);
        assert!(t.is_free(Slot::new(0, 1)));
        assert!(t.is_free(Slot::new(2, 3)));
        assert!(!t.is_free(Slot::new(1, 1)));
    }

    #[test]
    fn test_free_day_and_all_free() {
        let shape = GridShape::new(5, 6);
        let day = Teacher::new("t1", shape).with_free_day(1);
        assert_eq!(day.declared_free_count(), 6);

        let all = Teacher::new("t2", shape).all_free();
        assert_eq!(all.declared_free_count(), shape.slot_count());
    }

    #[test]
    fn test_out_of_grid_slot_ignored() {
        let mut t = Teacher::new("t1", GridShape::new(5, 6));
        t.set_free(Slot::new(6, 0), true);
        assert_eq!(t.declared_free_count(), 0);
        assert!(!t.is_free(Slot::new(6, 0)));
    }
}
