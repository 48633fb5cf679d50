//! Slot coordinates and the weekly grid shape.
//!
//! A slot is a (day, period) coordinate in the weekly teaching grid.
//! Both axes are 0-based internally; external read models present them
//! 1-based (see `export`).
//!
//! # Bounds
//! A week has at most 7 days of at most 8 periods each. The default
//! shape is 5 days × 6 periods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of teaching days per week.
pub const MAX_DAYS: u8 = 7;
/// Maximum number of periods per day.
pub const MAX_PERIODS: u8 = 8;

/// A (day, period) coordinate in the weekly grid. 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    /// Day of week (0-based).
    pub day: u8,
    /// Period within the day (0-based).
    pub period: u8,
}

impl Slot {
    /// Creates a slot at the given coordinates.
    pub fn new(day: u8, period: u8) -> Self {
        Self { day, period }
    }

    /// Whether two slots are adjacent periods on the same day.
    pub fn is_adjacent(&self, other: &Slot) -> bool {
        self.day == other.day && self.period.abs_diff(other.period) == 1
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day {} period {}", self.day, self.period)
    }
}

/// Dimensions of the weekly grid.
///
/// Shared by every class and teacher in one scheduling run; grids of
/// different shapes are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    /// Teaching days per week (1..=7).
    pub days: u8,
    /// Periods per day (1..=8).
    pub periods: u8,
}

impl GridShape {
    /// Creates a grid shape, clamping both axes to the supported bounds.
    pub fn new(days: u8, periods: u8) -> Self {
        Self {
            days: days.clamp(1, MAX_DAYS),
            periods: periods.clamp(1, MAX_PERIODS),
        }
    }

    /// Total number of slots in the week.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.days as usize * self.periods as usize
    }

    /// Whether a slot lies inside this grid.
    #[inline]
    pub fn contains(&self, slot: Slot) -> bool {
        slot.day < self.days && slot.period < self.periods
    }

    /// Dense index of a slot (row-major: day, then period).
    #[inline]
    pub fn index(&self, slot: Slot) -> usize {
        slot.day as usize * self.periods as usize + slot.period as usize
    }

    /// Slot at a dense index. Inverse of [`GridShape::index`].
    #[inline]
    pub fn slot_at(&self, index: usize) -> Slot {
        Slot::new(
            (index / self.periods as usize) as u8,
            (index % self.periods as usize) as u8,
        )
    }

    /// Iterates every slot in the week, row-major.
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        let shape = *self;
        (0..shape.slot_count()).map(move |i| shape.slot_at(i))
    }

    /// Iterates the slots of a single day in period order.
    pub fn day_slots(&self, day: u8) -> impl Iterator<Item = Slot> {
        (0..self.periods).map(move |p| Slot::new(day, p))
    }
}

impl Default for GridShape {
    /// Five teaching days of six periods each.
    fn default() -> Self {
        Self { days: 5, periods: 6 }
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.days, self.periods)
    }
}
