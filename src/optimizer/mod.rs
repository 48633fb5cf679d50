//! Schedule generation: greedy seeding plus evolutionary search.
//!
//! One generation run serves a single class. The optimizer searches
//! against immutable availability snapshots and **never** writes to the
//! tracker — the winning candidate's reservations are committed later,
//! atomically, by the lifecycle layer, so an aborted or timed-out run
//! leaves the tracker untouched.
//!
//! # Search
//!
//! - Seeding: greedy placement, heaviest subjects first, bounded
//!   backtracking.
//! - Evolution: elitism, tournament selection, whole-day crossover with
//!   repair, relocate mutation with a downward-annealing rate.
//! - Termination: generation cap, wall-clock budget, or a candidate
//!   with zero hard violations and all quotas met.
//!
//! # Reference
//! Cheng et al. (1996), "A Tutorial Survey of Job-Shop Scheduling
//! Problems Using Genetic Algorithms"

mod candidate;
mod seed;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::availability::TeacherGrid;
use crate::engine;
use crate::models::{
    Class, Constraint, GridShape, Schedule, Slot, TeacherAssignment, ViolationReport,
};

use candidate::{Candidate, Demand, SearchContext};
pub(crate) use candidate::placement_allowed;

/// Tuning knobs for one generation run.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Candidates per generation.
    pub population_size: usize,
    /// Generation cap.
    pub max_generations: u32,
    /// Probability that a selected pair is crossed over.
    pub crossover_rate: f64,
    /// Initial per-child mutation probability; anneals downward to a
    /// quarter of this value by the final generation.
    pub mutation_rate: f64,
    /// Fraction of the population carried over unchanged.
    pub elite_fraction: f64,
    /// Tournament size for parent selection.
    pub tournament_size: usize,
    /// Hard wall-clock budget for the whole run.
    pub time_budget: Duration,
    /// Step budget for seed backtracking.
    pub backtrack_limit: u32,
    /// RNG seed; `None` draws one from the OS. Set it for reproducible
    /// runs and tests.
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 100,
            crossover_rate: 0.8,
            mutation_rate: 0.2,
            elite_fraction: 0.1,
            tournament_size: 3,
            time_budget: Duration::from_secs(5),
            backtrack_limit: 500,
            seed: None,
        }
    }
}

impl GenerationConfig {
    /// Sets the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the population size (minimum 2).
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(2);
        self
    }

    /// Sets the generation cap.
    pub fn with_max_generations(mut self, generations: u32) -> Self {
        self.max_generations = generations.max(1);
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }
}

/// Progress of a running generation, streamed to the caller's sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Completion estimate in percent (0..=100).
    pub percent: u8,
    /// Best fitness cost so far (lower = better).
    pub best_fitness: f64,
    /// Generations completed.
    pub generation: u32,
}

/// Progress callback. The surrounding application may forward these to
/// a UI; the optimizer calls it once per generation.
pub type ProgressFn<'a> = dyn Fn(Progress) + Send + Sync + 'a;

/// Why a subject was skipped before the search started.
///
/// Both cases are the `DataMissing` class of failure: the subject is
/// not attempted, other subjects generate independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// No teacher assignment covers the subject.
    NoTeacherAssigned,
    /// The subject's teacher is not registered with the tracker.
    TeacherUnregistered,
    /// The quota is zero periods per week.
    ZeroWeeklyHours,
}

/// A subject excluded from a run, with why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSubject {
    pub subject_id: String,
    pub reason: SkipReason,
}

/// An `InsufficientAvailability` record: the teacher's free slots
/// cannot cover the hours demanded of them. The run still proceeds
/// best-effort; the gap surfaces as unmet-quota violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub teacher_id: String,
    pub available: usize,
    pub required: usize,
}

/// How much of the demanded teaching load was placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillStats {
    /// Weekly periods demanded by attempted subjects.
    pub required_hours: u32,
    /// Periods actually placed in the winning candidate.
    pub placed_hours: u32,
}

impl FillStats {
    /// Fraction of demanded hours placed (1.0 when nothing was demanded).
    pub fn fill_ratio(&self) -> f64 {
        if self.required_hours == 0 {
            1.0
        } else {
            self.placed_hours as f64 / self.required_hours as f64
        }
    }
}

/// Everything one generation run reads. Snapshots are taken once, up
/// front; the live tracker is not consulted during the search.
#[derive(Debug, Clone)]
pub struct GenerationInput<'a> {
    pub class: &'a Class,
    pub assignments: &'a [TeacherAssignment],
    pub constraints: &'a [Constraint],
    pub shape: GridShape,
    /// Availability snapshots keyed by teacher id.
    pub availability: HashMap<String, TeacherGrid>,
}

/// Result of one generation run. Issues are collected, never dropped:
/// `skipped` holds the `DataMissing` cases, `shortfalls` the
/// `InsufficientAvailability` ones, and `report` the violations of the
/// winning candidate.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Winning candidate as a Draft schedule (reservations not yet
    /// committed).
    pub schedule: Schedule,
    /// Violations of the winning candidate.
    pub report: ViolationReport,
    /// Placement statistics.
    pub stats: FillStats,
    /// Subjects not attempted, with reasons.
    pub skipped: Vec<SkippedSubject>,
    /// Teachers whose free time cannot cover their demanded hours.
    pub shortfalls: Vec<Shortfall>,
}

/// Evolutionary schedule generator for a single class.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: GenerationConfig,
}

impl Generator {
    /// Creates a generator with the given configuration.
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    /// Runs one generation for one class.
    ///
    /// Infeasible subjects are skipped up front; everything else is
    /// placed best-effort within the time budget. The returned schedule
    /// is always a Draft and the tracker is never touched here.
    pub fn generate(
        &self,
        input: &GenerationInput<'_>,
        progress: Option<&ProgressFn<'_>>,
    ) -> GenerationOutcome {
        let started = Instant::now();
        let (demands, skipped) = triage_demands(input);
        let shortfalls = availability_shortfalls(&demands, &input.availability);

        let required_hours: u32 = demands.iter().map(|d| d.hours as u32).sum();
        let ctx = SearchContext {
            class: input.class,
            assignments: input.assignments,
            constraints: input.constraints,
            shape: input.shape,
            availability: &input.availability,
            demands,
        };

        info!(
            "generating timetable for class {}: {} subject(s), {required_hours} period(s)",
            input.class.id,
            ctx.demands.len()
        );

        let mut rng = match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        let (best, generations) = if ctx.demands.is_empty() {
            let mut empty = Candidate::empty(ctx.shape);
            empty.fitness = empty.evaluate(&ctx);
            (empty, 0)
        } else {
            self.evolve(&ctx, &mut rng, started, progress)
        };

        let mut schedule = best.decode(&ctx);
        let report = engine::evaluate(&schedule, ctx.constraints, &ctx.eval_ctx());
        schedule.meta.fitness = best.fitness.cost;
        schedule.meta.generations = generations;
        schedule.meta.unresolved = report.counts();

        let stats = FillStats {
            required_hours,
            placed_hours: best.placed_count() as u32,
        };
        info!(
            "class {}: placed {}/{} period(s), {} violation(s), {} blocking, in {:.2?}",
            input.class.id,
            stats.placed_hours,
            stats.required_hours,
            report.len(),
            report.blocking_len(),
            started.elapsed()
        );

        GenerationOutcome {
            schedule,
            report,
            stats,
            skipped,
            shortfalls,
        }
    }

    /// The evolutionary loop. Candidates are immutable once scored;
    /// each generation is evaluated in parallel.
    fn evolve(
        &self,
        ctx: &SearchContext<'_>,
        rng: &mut SmallRng,
        started: Instant,
        progress: Option<&ProgressFn<'_>>,
    ) -> (Candidate, u32) {
        let cfg = &self.config;
        let pop_size = cfg.population_size.max(2);

        let mut population: Vec<Candidate> = (0..pop_size)
            .map(|_| seed::greedy_seed(ctx, rng, cfg.backtrack_limit))
            .collect();
        evaluate_population(&mut population, ctx);
        sort_by_cost(&mut population);

        let mut best = population[0].clone();
        let elite = ((pop_size as f64 * cfg.elite_fraction).round() as usize).max(1);
        let mut generation = 0u32;

        while generation < cfg.max_generations {
            if best.fitness.is_perfect() {
                debug!("perfect candidate after {generation} generation(s)");
                break;
            }
            if started.elapsed() >= cfg.time_budget {
                warn!(
                    "time budget {:?} expired after {generation} generation(s)",
                    cfg.time_budget
                );
                break;
            }

            let mutation_rate = annealed_rate(cfg, generation);
            let mut next: Vec<Candidate> = population[..elite].to_vec();
            while next.len() < pop_size {
                let p1 = tournament(&population, cfg.tournament_size, rng);
                let p2 = tournament(&population, cfg.tournament_size, rng);
                let (mut c1, mut c2) = if rng.random_bool(cfg.crossover_rate) {
                    Candidate::crossover(p1, p2, ctx, rng)
                } else {
                    (p1.clone(), p2.clone())
                };
                if rng.random_bool(mutation_rate) {
                    c1.mutate(ctx, rng);
                }
                if rng.random_bool(mutation_rate) {
                    c2.mutate(ctx, rng);
                }
                next.push(c1);
                if next.len() < pop_size {
                    next.push(c2);
                }
            }

            population = next;
            evaluate_population(&mut population, ctx);
            sort_by_cost(&mut population);
            if population[0].fitness.cost < best.fitness.cost {
                best = population[0].clone();
            }
            generation += 1;

            if let Some(callback) = progress {
                callback(Progress {
                    percent: ((generation * 100) / cfg.max_generations).min(100) as u8,
                    best_fitness: best.fitness.cost,
                    generation,
                });
            }
        }

        (best, generation)
    }
}

/// Splits class subjects into schedulable demands and skipped subjects.
fn triage_demands(input: &GenerationInput<'_>) -> (Vec<Demand>, Vec<SkippedSubject>) {
    let mut demands = Vec::new();
    let mut skipped = Vec::new();

    for req in &input.class.subjects {
        if req.weekly_hours == 0 {
            warn!(
                "class {}: subject {} has zero weekly hours; skipped",
                input.class.id, req.subject_id
            );
            skipped.push(SkippedSubject {
                subject_id: req.subject_id.clone(),
                reason: SkipReason::ZeroWeeklyHours,
            });
            continue;
        }
        let assignment = input.assignments.iter().find(|a| {
            a.class_id == input.class.id && a.subject_id == req.subject_id
        });
        let Some(assignment) = assignment else {
            warn!(
                "class {}: no teacher assigned to subject {}; skipped",
                input.class.id, req.subject_id
            );
            skipped.push(SkippedSubject {
                subject_id: req.subject_id.clone(),
                reason: SkipReason::NoTeacherAssigned,
            });
            continue;
        };
        if !input.availability.contains_key(&assignment.teacher_id) {
            warn!(
                "class {}: teacher {} for subject {} has no availability grid; skipped",
                input.class.id, assignment.teacher_id, req.subject_id
            );
            skipped.push(SkippedSubject {
                subject_id: req.subject_id.clone(),
                reason: SkipReason::TeacherUnregistered,
            });
            continue;
        }
        demands.push(Demand {
            subject_id: req.subject_id.clone(),
            teacher_id: assignment.teacher_id.clone(),
            hours: req.weekly_hours,
        });
    }

    (demands, skipped)
}

/// Per-teacher sufficiency check: free slots vs total demanded hours.
fn availability_shortfalls(
    demands: &[Demand],
    availability: &HashMap<String, TeacherGrid>,
) -> Vec<Shortfall> {
    let mut required: HashMap<&str, usize> = HashMap::new();
    for d in demands {
        *required.entry(d.teacher_id.as_str()).or_insert(0) += d.hours as usize;
    }

    let mut shortfalls = Vec::new();
    for (teacher_id, required) in required {
        let available = availability
            .get(teacher_id)
            .map(|g| g.free_count())
            .unwrap_or(0);
        if available < required {
            warn!(
                "teacher {teacher_id} has {available} free slot(s) for {required} demanded period(s)"
            );
            shortfalls.push(Shortfall {
                teacher_id: teacher_id.to_string(),
                available,
                required,
            });
        }
    }
    shortfalls.sort_by(|a, b| a.teacher_id.cmp(&b.teacher_id));
    shortfalls
}

fn evaluate_population(population: &mut [Candidate], ctx: &SearchContext<'_>) {
    population
        .par_iter_mut()
        .for_each(|c| c.fitness = c.evaluate(ctx));
}

fn sort_by_cost(population: &mut [Candidate]) {
    population.sort_by(|a, b| {
        a.fitness
            .cost
            .partial_cmp(&b.fitness.cost)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn annealed_rate(cfg: &GenerationConfig, generation: u32) -> f64 {
    let floor = cfg.mutation_rate * 0.25;
    let span = cfg.max_generations.max(1) as f64;
    let decayed = cfg.mutation_rate * (1.0 - generation as f64 / span);
    decayed.max(floor).clamp(0.0, 1.0)
}

fn tournament<'p>(
    population: &'p [Candidate],
    size: usize,
    rng: &mut SmallRng,
) -> &'p Candidate {
    let mut winner = &population[rng.random_range(0..population.len())];
    for _ in 1..size.max(1) {
        let challenger = &population[rng.random_range(0..population.len())];
        if challenger.fitness.cost < winner.fitness.cost {
            winner = challenger;
        }
    }
    winner
}

/// Feasible relocation targets for one entry of a live schedule: empty
/// class slots where the teacher is free and no enabled hard rule is
/// broken. This is the same placement check the search itself uses; the
/// conflict resolver leans on it for `AutoRelocate`.
pub fn feasible_slots(
    schedule: &Schedule,
    class_id: &str,
    subject_id: &str,
    teacher_id: &str,
    constraints: &[Constraint],
    shape: GridShape,
    teacher_free: impl Fn(Slot) -> bool,
) -> Vec<Slot> {
    let subject_at = |slot: Slot| {
        schedule
            .entry_at(slot)
            .map(|e| e.subject_id.clone())
    };
    shape
        .slots()
        .filter(|slot| {
            schedule.entry_at(*slot).is_none()
                && teacher_free(*slot)
                && placement_allowed(
                    class_id,
                    subject_id,
                    teacher_id,
                    *slot,
                    constraints,
                    &subject_at,
                )
        })
        .collect()
}
