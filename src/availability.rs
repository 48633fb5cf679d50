//! Teacher availability tracking.
//!
//! The tracker holds one slot grid per teacher and is the single source
//! of truth for teacher bookings: no schedule entry exists without a
//! matching reservation here, and no teacher is ever double-booked.
//!
//! Occupied slots carry an ownership tag. Generator-owned reservations
//! may only be changed through the owning schedule entry; manual grid
//! edits against them are rejected.
//!
//! # Locking
//!
//! Each teacher grid sits behind its own mutex; there is no global
//! lock. [`AvailabilityTracker::commit_batch`] acquires the locks of
//! the involved teachers in sorted-id order, verifies every target slot
//! is free, and only then writes — so concurrent generations over
//! disjoint teacher sets proceed fully in parallel, and generations
//! sharing a teacher serialize only at the commit step.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimetableError};
use crate::models::{GridShape, ScheduleEntry, Slot, Teacher};

/// Who placed an occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ownership {
    /// Reserved by a generation run (or a lifecycle edit of one).
    Generator,
    /// Entered by hand outside any generated schedule.
    Manual,
}

/// What a booked slot is used for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyMeta {
    /// Class receiving the lesson.
    pub class_id: String,
    /// Subject taught.
    pub subject_id: String,
}

impl OccupancyMeta {
    /// Creates occupancy metadata.
    pub fn new(class_id: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            subject_id: subject_id.into(),
        }
    }
}

/// State of one slot in a teacher grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    /// Outside the teacher's declared free time.
    Unavailable,
    /// Declared free and not booked.
    Free,
    /// Booked, with what for and by whom.
    Occupied {
        meta: OccupancyMeta,
        owner: Ownership,
    },
}

impl SlotState {
    /// Whether the slot can take a reservation.
    #[inline]
    pub fn is_free(&self) -> bool {
        matches!(self, SlotState::Free)
    }
}

/// One teacher's weekly slot grid.
///
/// Also used as the immutable snapshot the optimizer searches against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherGrid {
    shape: GridShape,
    slots: Vec<SlotState>,
}

impl TeacherGrid {
    /// Builds a grid from a teacher's declared free slots.
    pub fn from_teacher(teacher: &Teacher) -> Self {
        let shape = teacher.shape;
        let slots = shape
            .slots()
            .map(|s| {
                if teacher.is_free(s) {
                    SlotState::Free
                } else {
                    SlotState::Unavailable
                }
            })
            .collect();
        Self { shape, slots }
    }

    /// Grid dimensions.
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// State of a slot.
    pub fn state(&self, slot: Slot) -> Result<&SlotState> {
        if !self.shape.contains(slot) {
            return Err(TimetableError::SlotOutOfRange {
                slot,
                shape: self.shape,
            });
        }
        Ok(&self.slots[self.shape.index(slot)])
    }

    /// Whether a slot is free.
    pub fn is_free(&self, slot: Slot) -> bool {
        self.shape.contains(slot) && self.slots[self.shape.index(slot)].is_free()
    }

    /// Number of free slots.
    pub fn free_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_free()).count()
    }

    /// Number of occupied slots.
    pub fn occupied_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, SlotState::Occupied { .. }))
            .count()
    }

    fn set(&mut self, slot: Slot, state: SlotState) {
        let idx = self.shape.index(slot);
        self.slots[idx] = state;
    }
}

/// Per-teacher day×period grid of slot states with per-teacher locking.
pub struct AvailabilityTracker {
    shape: GridShape,
    grids: RwLock<HashMap<String, Arc<Mutex<TeacherGrid>>>>,
}

impl AvailabilityTracker {
    /// Creates an empty tracker for a grid shape.
    pub fn new(shape: GridShape) -> Self {
        Self {
            shape,
            grids: RwLock::new(HashMap::new()),
        }
    }

    /// Grid dimensions.
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Registers a teacher, seeding their grid from declared free time.
    /// Re-registering replaces the grid and drops existing reservations.
    pub fn register_teacher(&self, teacher: &Teacher) {
        if teacher.shape != self.shape {
            warn!(
                "teacher {} declared a {} grid; tracker uses {}",
                teacher.id, teacher.shape, self.shape
            );
        }
        let mut grids = self.grids.write().expect("tracker lock poisoned");
        if grids
            .insert(
                teacher.id.clone(),
                Arc::new(Mutex::new(TeacherGrid::from_teacher(teacher))),
            )
            .is_some()
        {
            warn!("teacher {} re-registered; previous grid replaced", teacher.id);
        }
    }

    fn grid(&self, teacher_id: &str) -> Result<Arc<Mutex<TeacherGrid>>> {
        self.grids
            .read()
            .expect("tracker lock poisoned")
            .get(teacher_id)
            .cloned()
            .ok_or_else(|| TimetableError::UnknownTeacher(teacher_id.to_string()))
    }

    /// Reserves a free slot. Fails with [`TimetableError::SlotConflict`]
    /// on any non-free state — callers reserve only against a consistent
    /// snapshot, so a conflict here is an internal invariant break.
    pub fn reserve(
        &self,
        teacher_id: &str,
        slot: Slot,
        meta: OccupancyMeta,
        owner: Ownership,
    ) -> Result<()> {
        let grid = self.grid(teacher_id)?;
        let mut grid = grid.lock().expect("teacher grid lock poisoned");
        match grid.state(slot)? {
            SlotState::Free => {
                grid.set(slot, SlotState::Occupied { meta, owner });
                debug!("reserved {slot} for teacher {teacher_id}");
                Ok(())
            }
            _ => Err(TimetableError::SlotConflict {
                teacher_id: teacher_id.to_string(),
                slot,
            }),
        }
    }

    /// Releases an occupied slot back to free, clearing its metadata.
    /// Releasing a slot that is not occupied is a logged no-op.
    pub fn release(&self, teacher_id: &str, slot: Slot) -> Result<()> {
        let grid = self.grid(teacher_id)?;
        let mut grid = grid.lock().expect("teacher grid lock poisoned");
        match grid.state(slot)? {
            SlotState::Occupied { .. } => {
                grid.set(slot, SlotState::Free);
                debug!("released {slot} for teacher {teacher_id}");
                Ok(())
            }
            _ => {
                warn!("release of unoccupied {slot} for teacher {teacher_id} ignored");
                Ok(())
            }
        }
    }

    /// Number of free slots for a teacher. Used for pre-generation
    /// sufficiency checks.
    pub fn available_count(&self, teacher_id: &str) -> Result<usize> {
        let grid = self.grid(teacher_id)?;
        let grid = grid.lock().expect("teacher grid lock poisoned");
        Ok(grid.free_count())
    }

    /// Consistent copy of one teacher's grid.
    pub fn snapshot(&self, teacher_id: &str) -> Result<TeacherGrid> {
        let grid = self.grid(teacher_id)?;
        let grid = grid.lock().expect("teacher grid lock poisoned");
        Ok(grid.clone())
    }

    /// Snapshots several teachers at once. Unknown ids error out.
    pub fn snapshot_many(&self, teacher_ids: &[&str]) -> Result<HashMap<String, TeacherGrid>> {
        let mut out = HashMap::with_capacity(teacher_ids.len());
        for id in teacher_ids {
            out.insert(id.to_string(), self.snapshot(id)?);
        }
        Ok(out)
    }

    /// Manually marks a free slot unavailable (e.g. the teacher withdrew
    /// declared free time). Rejected when the slot is occupied.
    pub fn mark_unavailable(&self, teacher_id: &str, slot: Slot) -> Result<()> {
        self.manual_set(teacher_id, slot, SlotState::Unavailable)
    }

    /// Manually declares an unavailable slot free.
    /// Rejected when the slot is occupied.
    pub fn mark_free(&self, teacher_id: &str, slot: Slot) -> Result<()> {
        self.manual_set(teacher_id, slot, SlotState::Free)
    }

    fn manual_set(&self, teacher_id: &str, slot: Slot, state: SlotState) -> Result<()> {
        let grid = self.grid(teacher_id)?;
        let mut grid = grid.lock().expect("teacher grid lock poisoned");
        match grid.state(slot)? {
            SlotState::Occupied {
                owner: Ownership::Generator,
                ..
            } => Err(TimetableError::GeneratorOwned {
                teacher_id: teacher_id.to_string(),
                slot,
            }),
            SlotState::Occupied { .. } => Err(TimetableError::SlotConflict {
                teacher_id: teacher_id.to_string(),
                slot,
            }),
            _ => {
                grid.set(slot, state);
                Ok(())
            }
        }
    }

    /// Atomically reserves every slot of a winning candidate.
    ///
    /// Per-teacher locks are taken in sorted-id order, all target slots
    /// are verified free under lock, and only then are any written. On
    /// conflict nothing is written and [`TimetableError::SlotConflict`]
    /// is returned — an aborted run leaves the tracker untouched.
    pub fn commit_batch(&self, entries: &[ScheduleEntry], owner: Ownership) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut teacher_ids: Vec<&str> = entries.iter().map(|e| e.teacher_id.as_str()).collect();
        teacher_ids.sort_unstable();
        teacher_ids.dedup();

        let arcs: Vec<(String, Arc<Mutex<TeacherGrid>>)> = teacher_ids
            .iter()
            .map(|id| self.grid(id).map(|g| (id.to_string(), g)))
            .collect::<Result<_>>()?;

        // Lock in sorted order; guards live until the end of the commit.
        let mut guards: Vec<(String, std::sync::MutexGuard<'_, TeacherGrid>)> = Vec::new();
        for (id, arc) in &arcs {
            guards.push((id.clone(), arc.lock().expect("teacher grid lock poisoned")));
        }

        // Verify first: any non-free target aborts before a single write.
        for entry in entries {
            let grid = &guards
                .iter()
                .find(|(id, _)| id == &entry.teacher_id)
                .expect("guard present for every entry teacher")
                .1;
            match grid.state(entry.slot)? {
                SlotState::Free => {}
                _ => {
                    return Err(TimetableError::SlotConflict {
                        teacher_id: entry.teacher_id.clone(),
                        slot: entry.slot,
                    });
                }
            }
        }

        for entry in entries {
            let grid = &mut guards
                .iter_mut()
                .find(|(id, _)| id == &entry.teacher_id)
                .expect("guard present for every entry teacher")
                .1;
            grid.set(
                entry.slot,
                SlotState::Occupied {
                    meta: OccupancyMeta::new(&entry.class_id, &entry.subject_id),
                    owner,
                },
            );
        }

        debug!(
            "committed {} reservation(s) across {} teacher(s)",
            entries.len(),
            teacher_ids.len()
        );
        Ok(())
    }

    /// Releases every reservation a schedule holds. Used on delete.
    pub fn release_batch(&self, entries: &[ScheduleEntry]) -> Result<()> {
        for entry in entries {
            self.release(&entry.teacher_id, entry.slot)?;
        }
        Ok(())
    }
}
