//! Candidate encoding and genetic operators.
//!
//! A candidate is one class's weekly grid with each cell either empty
//! or holding a demand index (subject+teacher). Candidates are immutable
//! snapshots from the loop's point of view: crossover and mutation
//! produce new candidates, and fitness evaluation is pure, so a
//! generation can be scored in parallel and unit tests can drive the
//! search with a seeded RNG.

use std::collections::HashMap;

use rand::prelude::IndexedRandom;
use rand::rngs::SmallRng;
use rand::Rng;

use crate::availability::TeacherGrid;
use crate::engine::{self, EvalContext};
use crate::models::{
    Class, Constraint, ConstraintRule, GridShape, Priority, Schedule, ScheduleEntry, Slot,
    TeacherAssignment, ViolationKind,
};

/// Cost of one priority-4 violation; effectively disqualifying.
const HARD_PENALTY: f64 = 1_000_000.0;
/// Cost per violation at priorities 1..=3.
const SOFT_PENALTY: [f64; 3] = [40.0, 160.0, 640.0];
/// Cost per missing weekly period.
const UNMET_HOUR_PENALTY: f64 = 10_000.0;
/// Weight of the teacher per-day load variance term.
const BALANCE_WEIGHT: f64 = 1.0;

/// One subject's weekly demand resolved to its teacher.
#[derive(Debug, Clone)]
pub(crate) struct Demand {
    pub subject_id: String,
    pub teacher_id: String,
    pub hours: u8,
}

/// Read-only context one search runs against.
pub(crate) struct SearchContext<'a> {
    pub class: &'a Class,
    pub assignments: &'a [TeacherAssignment],
    pub constraints: &'a [Constraint],
    pub shape: GridShape,
    pub availability: &'a HashMap<String, TeacherGrid>,
    pub demands: Vec<Demand>,
}

impl<'a> SearchContext<'a> {
    pub fn eval_ctx(&self) -> EvalContext<'a> {
        EvalContext {
            class: self.class,
            assignments: self.assignments,
            shape: self.shape,
        }
    }

    /// Whether the demand's teacher is free (in the snapshot) at a slot.
    pub fn teacher_free(&self, demand: &Demand, slot: Slot) -> bool {
        self.availability
            .get(&demand.teacher_id)
            .is_some_and(|grid| grid.is_free(slot))
    }
}

/// Fitness of a candidate. Lower cost = better schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fitness {
    /// Weighted total cost.
    pub cost: f64,
    /// Priority-4 violation count.
    pub blocking: usize,
    /// Weekly periods still missing across all placed demands.
    pub unmet_hours: u32,
}

impl Fitness {
    const UNEVALUATED: Fitness = Fitness {
        cost: f64::INFINITY,
        blocking: usize::MAX,
        unmet_hours: u32::MAX,
    };

    /// A candidate that satisfies every hard constraint and quota.
    pub fn is_perfect(&self) -> bool {
        self.blocking == 0 && self.unmet_hours == 0
    }
}

/// One candidate timetable for a class.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    /// Demand index per dense slot index; `None` = free period.
    cells: Vec<Option<u16>>,
    pub fitness: Fitness,
}

impl Candidate {
    /// Creates an empty candidate.
    pub fn empty(shape: GridShape) -> Self {
        Self {
            cells: vec![None; shape.slot_count()],
            fitness: Fitness::UNEVALUATED,
        }
    }

    pub fn get(&self, shape: GridShape, slot: Slot) -> Option<u16> {
        if !shape.contains(slot) {
            return None;
        }
        self.cells[shape.index(slot)]
    }

    pub fn set(&mut self, shape: GridShape, slot: Slot, demand: Option<u16>) {
        let idx = shape.index(slot);
        self.cells[idx] = demand;
        self.fitness = Fitness::UNEVALUATED;
    }

    /// Number of placed periods.
    pub fn placed_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Placed periods per demand index.
    pub fn demand_counts(&self, demands: usize) -> Vec<u8> {
        let mut counts = vec![0u8; demands];
        for cell in self.cells.iter().flatten() {
            counts[*cell as usize] += 1;
        }
        counts
    }

    /// Subject occupying a slot, if any.
    fn subject_at<'c>(&self, ctx: &'c SearchContext<'_>, slot: Slot) -> Option<&'c str> {
        self.get(ctx.shape, slot)
            .map(|d| ctx.demands[d as usize].subject_id.as_str())
    }

    /// Decodes the candidate into a schedule (Draft, no metadata).
    pub fn decode(&self, ctx: &SearchContext<'_>) -> Schedule {
        let mut schedule = Schedule::new(&ctx.class.id);
        for (idx, cell) in self.cells.iter().enumerate() {
            if let Some(d) = cell {
                let demand = &ctx.demands[*d as usize];
                let entry = ScheduleEntry::new(
                    &ctx.class.id,
                    ctx.shape.slot_at(idx),
                    &demand.subject_id,
                    &demand.teacher_id,
                );
                // Cells are unique per slot by construction.
                schedule.insert(entry).expect("one entry per cell");
            }
        }
        schedule
    }

    /// Pure fitness evaluation: constraint violations, quota shortfall,
    /// and teacher workload balance.
    pub fn evaluate(&self, ctx: &SearchContext<'_>) -> Fitness {
        let schedule = self.decode(ctx);
        let report = engine::evaluate(&schedule, ctx.constraints, &ctx.eval_ctx());

        let blocking = report.blocking_len();
        let mut cost = blocking as f64 * HARD_PENALTY;
        for v in report.all() {
            // Quota shortfall is costed per missing hour below, not per
            // report entry.
            if v.priority.is_blocking() || v.kind == ViolationKind::UnmetWeeklyHours {
                continue;
            }
            cost += SOFT_PENALTY[v.priority.level() as usize - 1];
        }

        let counts = self.demand_counts(ctx.demands.len());
        let unmet_hours: u32 = ctx
            .demands
            .iter()
            .zip(&counts)
            .map(|(d, placed)| d.hours.saturating_sub(*placed) as u32)
            .sum();
        cost += unmet_hours as f64 * UNMET_HOUR_PENALTY;
        cost += self.balance_penalty(ctx) * BALANCE_WEIGHT;

        Fitness {
            cost,
            blocking,
            unmet_hours,
        }
    }

    /// Variance of each teacher's per-day period load, summed.
    fn balance_penalty(&self, ctx: &SearchContext<'_>) -> f64 {
        let mut loads: HashMap<&str, Vec<f64>> = HashMap::new();
        for (idx, cell) in self.cells.iter().enumerate() {
            if let Some(d) = cell {
                let teacher = ctx.demands[*d as usize].teacher_id.as_str();
                let day = ctx.shape.slot_at(idx).day as usize;
                loads
                    .entry(teacher)
                    .or_insert_with(|| vec![0.0; ctx.shape.days as usize])[day] += 1.0;
            }
        }
        loads
            .values()
            .map(|days| {
                let mean = days.iter().sum::<f64>() / days.len() as f64;
                days.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / days.len() as f64
            })
            .sum()
    }

    /// Whether a demand may be placed at a slot: the cell is empty, the
    /// teacher is free in the snapshot, and no enabled hard constraint
    /// forbids the placement.
    pub fn slot_feasible(&self, ctx: &SearchContext<'_>, demand_idx: u16, slot: Slot) -> bool {
        if !ctx.shape.contains(slot) || self.get(ctx.shape, slot).is_some() {
            return false;
        }
        let demand = &ctx.demands[demand_idx as usize];
        if !ctx.teacher_free(demand, slot) {
            return false;
        }
        placement_allowed(
            &ctx.class.id,
            &demand.subject_id,
            &demand.teacher_id,
            slot,
            ctx.constraints,
            &|s| self.subject_at(ctx, s).map(str::to_owned),
        )
    }

    /// All feasible empty slots for a demand.
    pub fn feasible_slots(&self, ctx: &SearchContext<'_>, demand_idx: u16) -> Vec<Slot> {
        ctx.shape
            .slots()
            .filter(|s| self.slot_feasible(ctx, demand_idx, *s))
            .collect()
    }

    /// Relocates one random placed period to another feasible slot.
    pub fn mutate(&mut self, ctx: &SearchContext<'_>, rng: &mut SmallRng) {
        let occupied: Vec<usize> = (0..self.cells.len())
            .filter(|i| self.cells[*i].is_some())
            .collect();
        let Some(&from_idx) = occupied.choose(rng) else {
            return;
        };
        let demand = self.cells[from_idx].expect("chosen cell occupied");
        let from = ctx.shape.slot_at(from_idx);

        self.set(ctx.shape, from, None);
        let options = self.feasible_slots(ctx, demand);
        match options.choose(rng) {
            Some(&to) => self.set(ctx.shape, to, Some(demand)),
            // No alternative: put it back.
            None => self.set(ctx.shape, from, Some(demand)),
        }
    }

    /// Whole-day crossover: children take the other parent's placements
    /// for one random day, then repair hour counts and feasibility.
    pub fn crossover(
        a: &Candidate,
        b: &Candidate,
        ctx: &SearchContext<'_>,
        rng: &mut SmallRng,
    ) -> (Candidate, Candidate) {
        let day = rng.random_range(0..ctx.shape.days);
        let mut child_a = a.clone();
        let mut child_b = b.clone();
        for slot in ctx.shape.day_slots(day) {
            let from_b = b.get(ctx.shape, slot);
            let from_a = a.get(ctx.shape, slot);
            child_a.set(ctx.shape, slot, from_b);
            child_b.set(ctx.shape, slot, from_a);
        }
        child_a.repair(ctx, rng);
        child_b.repair(ctx, rng);
        (child_a, child_b)
    }

    /// Restores candidate invariants after crossover: drops placements
    /// whose teacher is booked in the snapshot or that break a hard
    /// placement rule, trims demands over their weekly hours, and
    /// refills demands that fell short.
    fn repair(&mut self, ctx: &SearchContext<'_>, rng: &mut SmallRng) {
        // Drop infeasible placements (teacher double-booked against the
        // snapshot, or a hard rule broken by the swapped-in day).
        for idx in 0..self.cells.len() {
            let Some(d) = self.cells[idx] else { continue };
            let slot = ctx.shape.slot_at(idx);
            let demand = &ctx.demands[d as usize];
            self.cells[idx] = None;
            if ctx.teacher_free(demand, slot)
                && placement_allowed(
                    &ctx.class.id,
                    &demand.subject_id,
                    &demand.teacher_id,
                    slot,
                    ctx.constraints,
                    &|s| self.subject_at(ctx, s).map(str::to_owned),
                )
            {
                self.cells[idx] = Some(d);
            }
        }

        // Trim overfilled demands.
        let mut counts = self.demand_counts(ctx.demands.len());
        for idx in (0..self.cells.len()).rev() {
            if let Some(d) = self.cells[idx] {
                if counts[d as usize] > ctx.demands[d as usize].hours {
                    counts[d as usize] -= 1;
                    self.cells[idx] = None;
                }
            }
        }

        // Refill underfilled demands where feasible.
        for d in 0..ctx.demands.len() {
            while counts[d] < ctx.demands[d].hours {
                let options = self.feasible_slots(ctx, d as u16);
                match options.choose(rng) {
                    Some(&slot) => {
                        self.set(ctx.shape, slot, Some(d as u16));
                        counts[d] += 1;
                    }
                    None => break,
                }
            }
        }
        self.fitness = Fitness::UNEVALUATED;
    }
}

/// Hard-rule placement check shared by the seeder, the genetic
/// operators, and the conflict resolver's relocation search.
///
/// `subject_at` reports the subject occupying a class slot, letting the
/// check run against either a candidate grid or a live schedule.
pub(crate) fn placement_allowed(
    class_id: &str,
    subject_id: &str,
    teacher_id: &str,
    slot: Slot,
    constraints: &[Constraint],
    subject_at: &dyn Fn(Slot) -> Option<String>,
) -> bool {
    for constraint in constraints {
        if !constraint.enabled || constraint.priority != Priority::Hard {
            continue;
        }
        if constraint
            .scope
            .class_id
            .as_deref()
            .is_some_and(|c| c != class_id)
        {
            continue;
        }
        let subject_scoped = constraint
            .scope
            .subject_id
            .as_deref()
            .is_none_or(|s| s == subject_id);
        let teacher_scoped = constraint
            .scope
            .teacher_id
            .as_deref()
            .is_none_or(|t| t == teacher_id);
        if !subject_scoped || !teacher_scoped {
            continue;
        }

        match &constraint.rule {
            ConstraintRule::Forbidden => {
                if constraint.slot.matches(slot) {
                    return false;
                }
            }
            ConstraintRule::NoConsecutive => {
                if adjacent_same_subject(subject_id, slot, subject_at) {
                    return false;
                }
            }
            ConstraintRule::MaxConsecutive(k) => {
                if run_length_with(subject_id, slot, subject_at) > *k {
                    return false;
                }
            }
            // Required, MinConsecutive, and Ordering need whole-schedule
            // context; the fitness function covers them.
            _ => {}
        }
    }
    true
}

fn adjacent_same_subject(
    subject_id: &str,
    slot: Slot,
    subject_at: &dyn Fn(Slot) -> Option<String>,
) -> bool {
    let mut neighbors = Vec::with_capacity(2);
    if slot.period > 0 {
        neighbors.push(Slot::new(slot.day, slot.period - 1));
    }
    neighbors.push(Slot::new(slot.day, slot.period + 1));
    neighbors
        .into_iter()
        .any(|n| subject_at(n).as_deref() == Some(subject_id))
}

/// Length of the consecutive run the subject would form if placed here.
fn run_length_with(
    subject_id: &str,
    slot: Slot,
    subject_at: &dyn Fn(Slot) -> Option<String>,
) -> u8 {
    let mut len = 1u8;
    let mut p = slot.period;
    while p > 0 && subject_at(Slot::new(slot.day, p - 1)).as_deref() == Some(subject_id) {
        len += 1;
        p -= 1;
    }
    let mut p = slot.period + 1;
    while subject_at(Slot::new(slot.day, p)).as_deref() == Some(subject_id) {
        len += 1;
        p += 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sample_class() -> Class {
        Class::new("7a").with_subject("math", 3).with_subject("arabic", 2)
    }

    fn sample_assignments() -> Vec<TeacherAssignment> {
        vec![
            TeacherAssignment::new("7a", "math", "t1"),
            TeacherAssignment::new("7a", "arabic", "t2"),
        ]
    }

    fn free_grid(shape: GridShape) -> TeacherGrid {
        TeacherGrid::from_teacher(
            &crate::models::Teacher::new("x", shape).all_free(),
        )
    }

    fn make_ctx<'a>(
        class: &'a Class,
        assignments: &'a [TeacherAssignment],
        constraints: &'a [Constraint],
        availability: &'a HashMap<String, TeacherGrid>,
    ) -> SearchContext<'a> {
        SearchContext {
            class,
            assignments,
            constraints,
            shape: GridShape::default(),
            availability,
            demands: vec![
                Demand {
                    subject_id: "math".into(),
                    teacher_id: "t1".into(),
                    hours: 3,
                },
                Demand {
                    subject_id: "arabic".into(),
                    teacher_id: "t2".into(),
                    hours: 2,
                },
            ],
        }
    }

    fn full_availability(shape: GridShape) -> HashMap<String, TeacherGrid> {
        [
            ("t1".to_string(), free_grid(shape)),
            ("t2".to_string(), free_grid(shape)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_decode_roundtrip() {
        let class = sample_class();
        let assignments = sample_assignments();
        let availability = full_availability(GridShape::default());
        let ctx = make_ctx(&class, &assignments, &[], &availability);

        let mut c = Candidate::empty(ctx.shape);
        c.set(ctx.shape, Slot::new(0, 0), Some(0));
        c.set(ctx.shape, Slot::new(1, 1), Some(1));

        let schedule = c.decode(&ctx);
        assert_eq!(schedule.len(), 2);
        assert_eq!(
            schedule.entry_at(Slot::new(0, 0)).unwrap().subject_id,
            "math"
        );
        assert_eq!(
            schedule.entry_at(Slot::new(1, 1)).unwrap().teacher_id,
            "t2"
        );
    }

    #[test]
    fn test_fitness_prefers_full_placement() {
        let class = sample_class();
        let assignments = sample_assignments();
        let availability = full_availability(GridShape::default());
        let ctx = make_ctx(&class, &assignments, &[], &availability);

        let mut partial = Candidate::empty(ctx.shape);
        partial.set(ctx.shape, Slot::new(0, 0), Some(0));

        let mut full = Candidate::empty(ctx.shape);
        full.set(ctx.shape, Slot::new(0, 0), Some(0));
        full.set(ctx.shape, Slot::new(1, 0), Some(0));
        full.set(ctx.shape, Slot::new(2, 0), Some(0));
        full.set(ctx.shape, Slot::new(3, 0), Some(1));
        full.set(ctx.shape, Slot::new(4, 0), Some(1));

        let f_partial = partial.evaluate(&ctx);
        let f_full = full.evaluate(&ctx);
        assert_eq!(f_partial.unmet_hours, 4);
        assert_eq!(f_full.unmet_hours, 0);
        assert!(f_full.cost < f_partial.cost);
        assert!(f_full.is_perfect());
    }

    #[test]
    fn test_hard_violation_dominates_cost() {
        let class = sample_class();
        let assignments = sample_assignments();
        let availability = full_availability(GridShape::default());
        let constraints = vec![Constraint::forbidden("c1", "math", Slot::new(0, 0)).hard()];
        let ctx = make_ctx(&class, &assignments, &constraints, &availability);

        let mut bad = Candidate::empty(ctx.shape);
        bad.set(ctx.shape, Slot::new(0, 0), Some(0));
        let fitness = bad.evaluate(&ctx);
        assert_eq!(fitness.blocking, 1);
        assert!(fitness.cost >= HARD_PENALTY);
    }

    #[test]
    fn test_slot_feasible_checks_teacher_and_rules() {
        let class = sample_class();
        let assignments = sample_assignments();
        let shape = GridShape::default();
        let mut availability = full_availability(shape);
        // t1 is only free on day 0.
        availability.insert(
            "t1".into(),
            TeacherGrid::from_teacher(
                &crate::models::Teacher::new("t1", shape).with_free_day(0),
            ),
        );
        let constraints = vec![Constraint::forbidden("c1", "math", Slot::new(0, 2)).hard()];
        let ctx = make_ctx(&class, &assignments, &constraints, &availability);

        let c = Candidate::empty(ctx.shape);
        assert!(c.slot_feasible(&ctx, 0, Slot::new(0, 0)));
        // Teacher not free on day 1.
        assert!(!c.slot_feasible(&ctx, 0, Slot::new(1, 0)));
        // Hard-forbidden slot.
        assert!(!c.slot_feasible(&ctx, 0, Slot::new(0, 2)));
    }

    #[test]
    fn test_no_consecutive_feasibility() {
        let class = sample_class();
        let assignments = sample_assignments();
        let availability = full_availability(GridShape::default());
        let constraints = vec![Constraint::no_consecutive("c1", "math").hard()];
        let ctx = make_ctx(&class, &assignments, &constraints, &availability);

        let mut c = Candidate::empty(ctx.shape);
        c.set(ctx.shape, Slot::new(0, 1), Some(0));
        assert!(!c.slot_feasible(&ctx, 0, Slot::new(0, 2)));
        assert!(!c.slot_feasible(&ctx, 0, Slot::new(0, 0)));
        assert!(c.slot_feasible(&ctx, 0, Slot::new(0, 3)));
        // The other subject is unaffected.
        assert!(c.slot_feasible(&ctx, 1, Slot::new(0, 2)));
    }

    #[test]
    fn test_mutation_keeps_placement_count() {
        let class = sample_class();
        let assignments = sample_assignments();
        let availability = full_availability(GridShape::default());
        let ctx = make_ctx(&class, &assignments, &[], &availability);
        let mut rng = SmallRng::seed_from_u64(7);

        let mut c = Candidate::empty(ctx.shape);
        c.set(ctx.shape, Slot::new(0, 0), Some(0));
        c.set(ctx.shape, Slot::new(2, 3), Some(1));
        for _ in 0..20 {
            c.mutate(&ctx, &mut rng);
            assert_eq!(c.placed_count(), 2);
        }
    }

    #[test]
    fn test_crossover_repairs_hour_counts() {
        let class = sample_class();
        let assignments = sample_assignments();
        let availability = full_availability(GridShape::default());
        let ctx = make_ctx(&class, &assignments, &[], &availability);
        let mut rng = SmallRng::seed_from_u64(11);

        // Two full parents with math on different days.
        let mut a = Candidate::empty(ctx.shape);
        a.set(ctx.shape, Slot::new(0, 0), Some(0));
        a.set(ctx.shape, Slot::new(1, 0), Some(0));
        a.set(ctx.shape, Slot::new(2, 0), Some(0));
        a.set(ctx.shape, Slot::new(3, 0), Some(1));
        a.set(ctx.shape, Slot::new(4, 0), Some(1));

        let mut b = Candidate::empty(ctx.shape);
        b.set(ctx.shape, Slot::new(0, 5), Some(0));
        b.set(ctx.shape, Slot::new(1, 5), Some(0));
        b.set(ctx.shape, Slot::new(2, 5), Some(0));
        b.set(ctx.shape, Slot::new(3, 5), Some(1));
        b.set(ctx.shape, Slot::new(4, 5), Some(1));

        for _ in 0..10 {
            let (c1, c2) = Candidate::crossover(&a, &b, &ctx, &mut rng);
            for child in [&c1, &c2] {
                let counts = child.demand_counts(ctx.demands.len());
                assert!(counts[0] <= 3);
                assert!(counts[1] <= 2);
            }
        }
    }

    #[test]
    fn test_repair_drops_snapshot_conflicts() {
        let class = sample_class();
        let assignments = sample_assignments();
        let shape = GridShape::default();
        let mut availability = full_availability(shape);
        // t1 has no free time at all: every math placement is infeasible.
        availability.insert(
            "t1".into(),
            TeacherGrid::from_teacher(&crate::models::Teacher::new("t1", shape)),
        );
        let ctx = make_ctx(&class, &assignments, &[], &availability);
        let mut rng = SmallRng::seed_from_u64(3);

        let mut a = Candidate::empty(ctx.shape);
        a.set(ctx.shape, Slot::new(0, 0), Some(0));
        let b = Candidate::empty(ctx.shape);

        let (c1, c2) = Candidate::crossover(&a, &b, &ctx, &mut rng);
        let counts1 = c1.demand_counts(ctx.demands.len());
        let counts2 = c2.demand_counts(ctx.demands.len());
        assert_eq!(counts1[0], 0);
        assert_eq!(counts2[0], 0);
    }
}
