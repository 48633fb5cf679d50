//! Timetabling constraints.
//!
//! Constraints restrict where subjects and teachers may be placed in the
//! weekly grid. Each carries a priority; priority-4 constraints are hard
//! and block publishing, priorities 1–3 are soft and only penalized.
//!
//! # Reference
//! Schaerf (1999), "A Survey of Automated Timetabling"

use serde::{Deserialize, Serialize};

use super::Slot;

/// Constraint priority. Ordered; [`Priority::Hard`] is the single
/// blocking level — everything below it is advisory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    /// Priority 1: mild preference.
    Low,
    /// Priority 2: standard preference.
    Medium,
    /// Priority 3: strong preference.
    High,
    /// Priority 4: must hold for a schedule to be published.
    Hard,
}

impl Priority {
    /// All priorities in ascending order.
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Hard,
    ];

    /// Numeric level, 1..=4.
    pub fn level(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Hard => 4,
        }
    }

    /// Priority for a numeric level, if valid.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Priority::Low),
            2 => Some(Priority::Medium),
            3 => Some(Priority::High),
            4 => Some(Priority::Hard),
            _ => None,
        }
    }

    /// Whether this is the blocking level.
    #[inline]
    pub fn is_blocking(&self) -> bool {
        matches!(self, Priority::Hard)
    }
}

/// Direction of an ordering constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    /// The scoped subject must come earlier in the day.
    Before,
    /// The scoped subject must come later in the day.
    After,
}

/// What a constraint demands of its scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintRule {
    /// The scoped subject/teacher must not occupy the filtered slot(s).
    Forbidden,
    /// The scoped subject/teacher must occupy at least one filtered slot.
    Required,
    /// Two periods of the scoped subject must not be adjacent within a day.
    NoConsecutive,
    /// No run of the scoped subject/teacher may exceed `k` periods in a day.
    MaxConsecutive(u8),
    /// Every run of the scoped subject in a day must span at least `k`
    /// periods (double-period policy).
    MinConsecutive(u8),
    /// On any day where both subjects appear, every period of the scoped
    /// subject must come before (or after) every period of `other_subject`.
    Ordering {
        other_subject: String,
        side: OrderSide,
    },
}

/// Which entries a constraint applies to. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintScope {
    pub class_id: Option<String>,
    pub subject_id: Option<String>,
    pub teacher_id: Option<String>,
}

impl ConstraintScope {
    /// Whether the scope constrains anything at all.
    pub fn is_empty(&self) -> bool {
        self.class_id.is_none() && self.subject_id.is_none() && self.teacher_id.is_none()
    }
}

/// Optional day/period restriction. `None` fields match any value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotFilter {
    pub day: Option<u8>,
    pub period: Option<u8>,
}

impl SlotFilter {
    /// Whether a slot passes the filter.
    pub fn matches(&self, slot: Slot) -> bool {
        self.day.is_none_or(|d| d == slot.day) && self.period.is_none_or(|p| p == slot.period)
    }

    /// Whether neither day nor period is restricted.
    pub fn is_empty(&self) -> bool {
        self.day.is_none() && self.period.is_none()
    }

    /// Exact-slot filter.
    pub fn at(slot: Slot) -> Self {
        Self {
            day: Some(slot.day),
            period: Some(slot.period),
        }
    }
}

/// A timetabling constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Unique constraint identifier.
    pub id: String,
    /// What the constraint demands.
    pub rule: ConstraintRule,
    /// Which subject/teacher/class it applies to.
    pub scope: ConstraintScope,
    /// Optional day/period restriction.
    pub slot: SlotFilter,
    /// Violation priority.
    pub priority: Priority,
    /// Disabled constraints are ignored by the evaluator. Validation
    /// disables mutually contradictory constraints instead of dropping them.
    pub enabled: bool,
}

impl Constraint {
    /// Creates a constraint with default scope, filter, and priority.
    pub fn new(id: impl Into<String>, rule: ConstraintRule) -> Self {
        Self {
            id: id.into(),
            rule,
            scope: ConstraintScope::default(),
            slot: SlotFilter::default(),
            priority: Priority::Medium,
            enabled: true,
        }
    }

    /// Forbids a subject from a slot.
    pub fn forbidden(id: impl Into<String>, subject_id: impl Into<String>, slot: Slot) -> Self {
        Self::new(id, ConstraintRule::Forbidden)
            .with_subject(subject_id)
            .at_slot(slot)
    }

    /// Requires a subject at a slot.
    pub fn required(id: impl Into<String>, subject_id: impl Into<String>, slot: Slot) -> Self {
        Self::new(id, ConstraintRule::Required)
            .with_subject(subject_id)
            .at_slot(slot)
    }

    /// Forbids adjacent periods of a subject.
    pub fn no_consecutive(id: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self::new(id, ConstraintRule::NoConsecutive).with_subject(subject_id)
    }

    /// Caps runs of a subject at `k` periods per day.
    pub fn max_consecutive(id: impl Into<String>, subject_id: impl Into<String>, k: u8) -> Self {
        Self::new(id, ConstraintRule::MaxConsecutive(k)).with_subject(subject_id)
    }

    /// Demands runs of a subject span at least `k` periods.
    pub fn min_consecutive(id: impl Into<String>, subject_id: impl Into<String>, k: u8) -> Self {
        Self::new(id, ConstraintRule::MinConsecutive(k)).with_subject(subject_id)
    }

    /// Orders one subject relative to another within a day.
    pub fn ordering(
        id: impl Into<String>,
        subject_id: impl Into<String>,
        other_subject: impl Into<String>,
        side: OrderSide,
    ) -> Self {
        Self::new(
            id,
            ConstraintRule::Ordering {
                other_subject: other_subject.into(),
                side,
            },
        )
        .with_subject(subject_id)
    }

    /// Scopes the constraint to a subject.
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.scope.subject_id = Some(subject_id.into());
        self
    }

    /// Scopes the constraint to a teacher.
    pub fn with_teacher(mut self, teacher_id: impl Into<String>) -> Self {
        self.scope.teacher_id = Some(teacher_id.into());
        self
    }

    /// Scopes the constraint to a class.
    pub fn with_class(mut self, class_id: impl Into<String>) -> Self {
        self.scope.class_id = Some(class_id.into());
        self
    }

    /// Restricts the constraint to an exact slot.
    pub fn at_slot(mut self, slot: Slot) -> Self {
        self.slot = SlotFilter::at(slot);
        self
    }

    /// Restricts the constraint to a day.
    pub fn on_day(mut self, day: u8) -> Self {
        self.slot.day = Some(day);
        self
    }

    /// Restricts the constraint to a period.
    pub fn on_period(mut self, period: u8) -> Self {
        self.slot.period = Some(period);
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Shortcut for [`Priority::Hard`].
    pub fn hard(self) -> Self {
        self.with_priority(Priority::Hard)
    }
}
