//! Constraint engine.
//!
//! Pure, read-only evaluation of a schedule against the active
//! constraint set. Safe to invoke in parallel across independent
//! schedules; nothing here touches the availability tracker.
//!
//! Constraints referencing a subject or teacher absent from the class
//! are no-ops with a logged warning, not an error. Disabled constraints
//! are skipped silently.

use log::warn;

use crate::models::{
    Class, Constraint, ConstraintRule, GridShape, OrderSide, Priority, Schedule, ScheduleEntry,
    Slot, TeacherAssignment, Violation, ViolationKind, ViolationReport,
};

/// Read-only inputs an evaluation runs against.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Class the schedule belongs to (authority on subjects and quotas).
    pub class: &'a Class,
    /// Teacher assignments for the class.
    pub assignments: &'a [TeacherAssignment],
    /// Grid dimensions.
    pub shape: GridShape,
}

/// Evaluates a full schedule, producing a priority-grouped report.
///
/// Includes the intrinsic checks (same-class double booking, unmet
/// weekly quotas) alongside every enabled constraint.
pub fn evaluate(
    schedule: &Schedule,
    constraints: &[Constraint],
    ctx: &EvalContext<'_>,
) -> ViolationReport {
    let mut report = ViolationReport::new();
    check_double_booking(schedule, &mut report);
    check_quotas(schedule, ctx, &mut report);
    for constraint in constraints {
        apply_constraint(schedule, constraint, ctx, None, &mut report);
    }
    report
}

/// Evaluates only the rules that can involve one slot's day: the
/// forbidden/required rules anchored there plus the consecutive-run and
/// ordering windows around it. Used by `edit()` for responsiveness; a
/// full [`evaluate`] pass is still mandatory before publishing.
pub fn evaluate_slot(
    schedule: &Schedule,
    constraints: &[Constraint],
    ctx: &EvalContext<'_>,
    slot: Slot,
) -> ViolationReport {
    let mut report = ViolationReport::new();
    check_double_booking(schedule, &mut report);
    for constraint in constraints {
        // A constraint is in the window if it can involve the slot's day.
        if constraint.slot.day.is_none_or(|d| d == slot.day) {
            apply_constraint(schedule, constraint, ctx, Some(slot.day), &mut report);
        }
    }
    report
}

fn check_double_booking(schedule: &Schedule, report: &mut ViolationReport) {
    // Entries are slot-sorted, so collisions are adjacent.
    for pair in schedule.entries().windows(2) {
        if pair[0].slot == pair[1].slot {
            report.push(
                Violation::new(
                    ViolationKind::DoubleBooked,
                    Priority::Hard,
                    format!(
                        "class {} has two entries at {}",
                        schedule.class_id, pair[0].slot
                    ),
                )
                .at(pair[0].slot),
            );
        }
    }
}

fn check_quotas(schedule: &Schedule, ctx: &EvalContext<'_>, report: &mut ViolationReport) {
    for req in &ctx.class.subjects {
        let placed = schedule.subject_hours(&req.subject_id);
        if placed < req.weekly_hours as usize {
            report.push(
                Violation::new(
                    ViolationKind::UnmetWeeklyHours,
                    Priority::High,
                    format!(
                        "subject {} has {placed} of {} weekly period(s)",
                        req.subject_id, req.weekly_hours
                    ),
                )
                .with_subject(&req.subject_id),
            );
        }
    }
}

fn apply_constraint(
    schedule: &Schedule,
    constraint: &Constraint,
    ctx: &EvalContext<'_>,
    day_filter: Option<u8>,
    report: &mut ViolationReport,
) {
    if !constraint.enabled {
        return;
    }
    if constraint
        .scope
        .class_id
        .as_deref()
        .is_some_and(|c| c != ctx.class.id)
    {
        return;
    }
    if !scope_resolves(constraint, ctx) {
        return;
    }

    let matched: Vec<&ScheduleEntry> = schedule
        .entries()
        .iter()
        .filter(|e| scope_matches(constraint, e))
        .collect();

    match &constraint.rule {
        ConstraintRule::Forbidden => {
            for entry in &matched {
                if day_filter.is_some_and(|d| d != entry.slot.day) {
                    continue;
                }
                if constraint.slot.matches(entry.slot) {
                    report.push(
                        violation_for(constraint, ViolationKind::ForbiddenSlot)
                            .at(entry.slot)
                            .with_subject(&entry.subject_id)
                            .with_teacher(&entry.teacher_id),
                    );
                }
            }
        }
        ConstraintRule::Required => {
            if !matched.iter().any(|e| constraint.slot.matches(e.slot)) {
                let mut v = violation_for(constraint, ViolationKind::RequiredSlotMissing);
                if let (Some(day), Some(period)) = (constraint.slot.day, constraint.slot.period) {
                    v = v.at(Slot::new(day, period));
                }
                report.push(v);
            }
        }
        ConstraintRule::NoConsecutive => {
            for_each_day(constraint, ctx, day_filter, |day| {
                let periods = day_periods(&matched, day);
                for w in periods.windows(2) {
                    if w[1] == w[0] + 1 {
                        report.push(
                            violation_for(constraint, ViolationKind::AdjacentPlacement)
                                .at(Slot::new(day, w[1])),
                        );
                    }
                }
            });
        }
        ConstraintRule::MaxConsecutive(k) => {
            for_each_day(constraint, ctx, day_filter, |day| {
                for (start, len) in runs(&day_periods(&matched, day)) {
                    if len > *k {
                        report.push(
                            violation_for(constraint, ViolationKind::RunTooLong)
                                .at(Slot::new(day, start)),
                        );
                    }
                }
            });
        }
        ConstraintRule::MinConsecutive(k) => {
            for_each_day(constraint, ctx, day_filter, |day| {
                for (start, len) in runs(&day_periods(&matched, day)) {
                    if len < *k {
                        report.push(
                            violation_for(constraint, ViolationKind::RunTooShort)
                                .at(Slot::new(day, start)),
                        );
                    }
                }
            });
        }
        ConstraintRule::Ordering {
            other_subject,
            side,
        } => {
            let others: Vec<&ScheduleEntry> = schedule
                .entries()
                .iter()
                .filter(|e| &e.subject_id == other_subject)
                .collect();
            for_each_day(constraint, ctx, day_filter, |day| {
                let a = day_periods(&matched, day);
                let b = day_periods(&others, day);
                if a.is_empty() || b.is_empty() {
                    return;
                }
                let holds = match side {
                    OrderSide::Before => a.iter().max() < b.iter().min(),
                    OrderSide::After => a.iter().min() > b.iter().max(),
                };
                if !holds {
                    report.push(
                        violation_for(constraint, ViolationKind::OrderingBroken)
                            .at(Slot::new(day, a[0])),
                    );
                }
            });
        }
    }
}

/// Checks that the scoped entities exist for this class; warns and
/// treats the constraint as a no-op otherwise.
fn scope_resolves(constraint: &Constraint, ctx: &EvalContext<'_>) -> bool {
    if let Some(subject) = constraint.scope.subject_id.as_deref() {
        if !ctx.class.has_subject(subject) {
            warn!(
                "constraint {}: subject {subject} not taught in class {}; skipped",
                constraint.id, ctx.class.id
            );
            return false;
        }
    }
    if let ConstraintRule::Ordering { other_subject, .. } = &constraint.rule {
        if !ctx.class.has_subject(other_subject) {
            warn!(
                "constraint {}: subject {other_subject} not taught in class {}; skipped",
                constraint.id, ctx.class.id
            );
            return false;
        }
    }
    if let Some(teacher) = constraint.scope.teacher_id.as_deref() {
        let teaches_here = ctx
            .assignments
            .iter()
            .any(|a| a.teacher_id == teacher && a.class_id == ctx.class.id);
        if !teaches_here {
            warn!(
                "constraint {}: teacher {teacher} not assigned to class {}; skipped",
                constraint.id, ctx.class.id
            );
            return false;
        }
    }
    true
}

fn scope_matches(constraint: &Constraint, entry: &ScheduleEntry) -> bool {
    constraint
        .scope
        .subject_id
        .as_deref()
        .is_none_or(|s| s == entry.subject_id)
        && constraint
            .scope
            .teacher_id
            .as_deref()
            .is_none_or(|t| t == entry.teacher_id)
}

fn violation_for(constraint: &Constraint, kind: ViolationKind) -> Violation {
    let mut v = Violation::new(
        kind,
        constraint.priority,
        format!("constraint {} violated", constraint.id),
    )
    .with_constraint(&constraint.id);
    if let Some(subject) = &constraint.scope.subject_id {
        v = v.with_subject(subject);
    }
    if let Some(teacher) = &constraint.scope.teacher_id {
        v = v.with_teacher(teacher);
    }
    v
}

fn for_each_day(
    constraint: &Constraint,
    ctx: &EvalContext<'_>,
    day_filter: Option<u8>,
    mut f: impl FnMut(u8),
) {
    for day in 0..ctx.shape.days {
        if constraint.slot.day.is_some_and(|d| d != day) {
            continue;
        }
        if day_filter.is_some_and(|d| d != day) {
            continue;
        }
        f(day);
    }
}

/// Sorted periods of the matched entries on one day.
fn day_periods(entries: &[&ScheduleEntry], day: u8) -> Vec<u8> {
    let mut periods: Vec<u8> = entries
        .iter()
        .filter(|e| e.slot.day == day)
        .map(|e| e.slot.period)
        .collect();
    periods.sort_unstable();
    periods
}

/// Maximal runs of consecutive periods: (start, length).
fn runs(periods: &[u8]) -> Vec<(u8, u8)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < periods.len() {
        let start = periods[i];
        let mut len = 1u8;
        while i + 1 < periods.len() && periods[i + 1] == periods[i] + 1 {
            i += 1;
            len += 1;
        }
        out.push((start, len));
        i += 1;
    }
    out
}
