//! Greedy seeding with bounded backtracking.
//!
//! Seeds construct initial candidates by placing subjects in descending
//! weekly-hour order into teacher-available, constraint-feasible slots.
//! When a placement dead-ends, recent placements are undone and retried
//! until a step budget runs out; hours that still cannot be placed are
//! left open for the evolutionary phase (and surface as unmet quota).

use std::collections::HashSet;

use log::debug;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

use crate::models::Slot;

use super::candidate::{Candidate, SearchContext};

/// Builds one greedy candidate. Different RNG states yield different
/// (but always feasible) seeds, which is how the initial population
/// gets its diversity.
pub(crate) fn greedy_seed(
    ctx: &SearchContext<'_>,
    rng: &mut SmallRng,
    backtrack_limit: u32,
) -> Candidate {
    let mut candidate = Candidate::empty(ctx.shape);

    // One position per demanded hour, heaviest subjects first.
    let mut demand_order: Vec<u16> = (0..ctx.demands.len() as u16).collect();
    demand_order.sort_by_key(|d| std::cmp::Reverse(ctx.demands[*d as usize].hours));
    let positions: Vec<u16> = demand_order
        .iter()
        .flat_map(|d| std::iter::repeat_n(*d, ctx.demands[*d as usize].hours as usize))
        .collect();

    let mut placed: Vec<Option<Slot>> = vec![None; positions.len()];
    let mut tried: Vec<HashSet<Slot>> = vec![HashSet::new(); positions.len()];
    let mut steps = 0u32;
    let mut i = 0usize;

    while i < positions.len() {
        let demand = positions[i];
        let slot = pick_slot(&candidate, ctx, demand, &tried[i], rng);

        match slot {
            Some(slot) => {
                candidate.set(ctx.shape, slot, Some(demand));
                placed[i] = Some(slot);
                i += 1;
            }
            None => {
                steps += 1;
                if steps > backtrack_limit || i == 0 || placed[i - 1].is_none() {
                    // Out of budget or nothing to undo: leave the hour
                    // open and move on.
                    debug!(
                        "seed: leaving one hour of {} unplaced",
                        ctx.demands[demand as usize].subject_id
                    );
                    tried[i].clear();
                    i += 1;
                    continue;
                }
                // Undo the previous placement and bar that slot for it.
                let prev_slot = placed[i - 1].take().expect("checked above");
                candidate.set(ctx.shape, prev_slot, None);
                tried[i].clear();
                tried[i - 1].insert(prev_slot);
                i -= 1;
            }
        }
    }

    candidate
}

/// Picks a feasible slot for a demand, preferring days where the
/// subject has the fewest periods so far (spread across the week).
fn pick_slot(
    candidate: &Candidate,
    ctx: &SearchContext<'_>,
    demand: u16,
    barred: &HashSet<Slot>,
    rng: &mut SmallRng,
) -> Option<Slot> {
    let mut options: Vec<Slot> = candidate
        .feasible_slots(ctx, demand)
        .into_iter()
        .filter(|s| !barred.contains(s))
        .collect();
    if options.is_empty() {
        return None;
    }

    // Random tiebreak under the day-load preference.
    options.shuffle(rng);
    let subject = &ctx.demands[demand as usize].subject_id;
    let day_load = |slot: &Slot| {
        ctx.shape
            .day_slots(slot.day)
            .filter(|s| {
                candidate
                    .get(ctx.shape, *s)
                    .is_some_and(|d| &ctx.demands[d as usize].subject_id == subject)
            })
            .count()
    };
    options.sort_by_key(day_load);
    options.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::TeacherGrid;
    use crate::models::{Class, Constraint, GridShape, Teacher, TeacherAssignment};
    use crate::optimizer::candidate::Demand;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn seed_ctx<'a>(
        class: &'a Class,
        assignments: &'a [TeacherAssignment],
        constraints: &'a [Constraint],
        availability: &'a HashMap<String, TeacherGrid>,
        demands: Vec<Demand>,
    ) -> SearchContext<'a> {
        SearchContext {
            class,
            assignments,
            constraints,
            shape: GridShape::default(),
            availability,
            demands,
        }
    }

    #[test]
    fn test_seed_places_all_hours_when_space_allows() {
        let class = Class::new("7a").with_subject("math", 4).with_subject("arabic", 3);
        let assignments = vec![
            TeacherAssignment::new("7a", "math", "t1"),
            TeacherAssignment::new("7a", "arabic", "t2"),
        ];
        let shape = GridShape::default();
        let availability: HashMap<String, TeacherGrid> = [
            (
                "t1".to_string(),
                TeacherGrid::from_teacher(&Teacher::new("t1", shape).all_free()),
            ),
            (
                "t2".to_string(),
                TeacherGrid::from_teacher(&Teacher::new("t2", shape).all_free()),
            ),
        ]
        .into_iter()
        .collect();
        let demands = vec![
            Demand {
                subject_id: "math".into(),
                teacher_id: "t1".into(),
                hours: 4,
            },
            Demand {
                subject_id: "arabic".into(),
                teacher_id: "t2".into(),
                hours: 3,
            },
        ];
        let ctx = seed_ctx(&class, &assignments, &[], &availability, demands);

        let mut rng = SmallRng::seed_from_u64(42);
        let candidate = greedy_seed(&ctx, &mut rng, 500);
        assert_eq!(candidate.placed_count(), 7);
        assert_eq!(candidate.demand_counts(2), vec![4, 3]);
    }

    #[test]
    fn test_seed_spreads_subject_across_days() {
        let class = Class::new("7a").with_subject("math", 4);
        let assignments = vec![TeacherAssignment::new("7a", "math", "t1")];
        let shape = GridShape::default();
        let availability: HashMap<String, TeacherGrid> = [(
            "t1".to_string(),
            TeacherGrid::from_teacher(&Teacher::new("t1", shape).all_free()),
        )]
        .into_iter()
        .collect();
        let demands = vec![Demand {
            subject_id: "math".into(),
            teacher_id: "t1".into(),
            hours: 4,
        }];
        let ctx = seed_ctx(&class, &assignments, &[], &availability, demands);

        let mut rng = SmallRng::seed_from_u64(1);
        let candidate = greedy_seed(&ctx, &mut rng, 500);
        let schedule = candidate.decode(&ctx);
        let days: std::collections::HashSet<u8> =
            schedule.entries().iter().map(|e| e.slot.day).collect();
        // 4 hours over a 5-day week land on 4 distinct days.
        assert_eq!(days.len(), 4);
    }

    #[test]
    fn test_seed_respects_tight_availability() {
        // Teacher free exactly 4 slots on 4 distinct days.
        let class = Class::new("7a").with_subject("math", 4);
        let assignments = vec![TeacherAssignment::new("7a", "math", "t1")];
        let shape = GridShape::default();
        let teacher = Teacher::new("t1", shape)
            .with_free_slot(0, 2)
            .with_free_slot(1, 4)
            .with_free_slot(3, 0)
            .with_free_slot(4, 5);
        let availability: HashMap<String, TeacherGrid> =
            [("t1".to_string(), TeacherGrid::from_teacher(&teacher))]
                .into_iter()
                .collect();
        let demands = vec![Demand {
            subject_id: "math".into(),
            teacher_id: "t1".into(),
            hours: 4,
        }];
        let ctx = seed_ctx(&class, &assignments, &[], &availability, demands);

        let mut rng = SmallRng::seed_from_u64(9);
        let candidate = greedy_seed(&ctx, &mut rng, 500);
        let schedule = candidate.decode(&ctx);
        assert_eq!(schedule.len(), 4);
        let expected = [
            Slot::new(0, 2),
            Slot::new(1, 4),
            Slot::new(3, 0),
            Slot::new(4, 5),
        ];
        for slot in expected {
            assert!(schedule.entry_at(slot).is_some());
        }
    }

    #[test]
    fn test_seed_leaves_impossible_hours_open() {
        // 3 hours demanded, teacher free only 2 slots.
        let class = Class::new("7a").with_subject("math", 3);
        let assignments = vec![TeacherAssignment::new("7a", "math", "t1")];
        let shape = GridShape::default();
        let teacher = Teacher::new("t1", shape)
            .with_free_slot(0, 0)
            .with_free_slot(2, 0);
        let availability: HashMap<String, TeacherGrid> =
            [("t1".to_string(), TeacherGrid::from_teacher(&teacher))]
                .into_iter()
                .collect();
        let demands = vec![Demand {
            subject_id: "math".into(),
            teacher_id: "t1".into(),
            hours: 3,
        }];
        let ctx = seed_ctx(&class, &assignments, &[], &availability, demands);

        let mut rng = SmallRng::seed_from_u64(5);
        let candidate = greedy_seed(&ctx, &mut rng, 500);
        assert_eq!(candidate.placed_count(), 2);
    }

    #[test]
    fn test_seed_backtracks_around_hard_constraints() {
        // NoConsecutive math with availability limited to one day's
        // periods 0..3: the seeder must land on non-adjacent periods.
        let class = Class::new("7a").with_subject("math", 2);
        let assignments = vec![TeacherAssignment::new("7a", "math", "t1")];
        let shape = GridShape::default();
        let teacher = Teacher::new("t1", shape)
            .with_free_slot(0, 0)
            .with_free_slot(0, 1)
            .with_free_slot(0, 2);
        let availability: HashMap<String, TeacherGrid> =
            [("t1".to_string(), TeacherGrid::from_teacher(&teacher))]
                .into_iter()
                .collect();
        let constraints = vec![Constraint::no_consecutive("c1", "math").hard()];
        let demands = vec![Demand {
            subject_id: "math".into(),
            teacher_id: "t1".into(),
            hours: 2,
        }];
        let ctx = seed_ctx(&class, &assignments, &constraints, &availability, demands);

        let mut rng = SmallRng::seed_from_u64(13);
        let candidate = greedy_seed(&ctx, &mut rng, 500);
        let schedule = candidate.decode(&ctx);
        assert_eq!(schedule.len(), 2);
        assert!(schedule.entry_at(Slot::new(0, 0)).is_some());
        assert!(schedule.entry_at(Slot::new(0, 2)).is_some());
    }
}
