//! Single-employee route optimizer (TSP with time windows).
//!
//! Small routes are solved exactly with a label-setting dynamic program over
//! task subsets. Larger routes use a time-window aware nearest neighbour
//! construction followed by 2-opt and or-opt local search. Both are
//! deterministic, and the result is never worse than the current order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::PlannerError;
use crate::matrix::TravelMatrix;
use crate::model::{Employee, EmployeeId, Task, TaskStatus};
use crate::route::{Evaluation, Route, RouteProblem, EPSILON};
use crate::settings::OptimizationSettings;
use crate::traits::DistanceProvider;

/// Cooperative cancellation flag shared with a running optimization.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn check(&self) -> Result<(), PlannerError> {
        if self.is_cancelled() {
            Err(PlannerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Before/after deltas; all zero when the current order was kept.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Improvement {
    pub distance_saved_m: f64,
    pub time_saved_minutes: f64,
    pub efficiency_gain: f64,
    pub cost_saved: f64,
}

impl Improvement {
    pub fn between(current: &Route, optimized: &Route) -> Self {
        Self {
            distance_saved_m: current.metrics.total_distance_m - optimized.metrics.total_distance_m,
            time_saved_minutes: current.metrics.total_duration_minutes
                - optimized.metrics.total_duration_minutes,
            efficiency_gain: optimized.metrics.efficiency - current.metrics.efficiency,
            cost_saved: current.metrics.cost - optimized.metrics.cost,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteOptimization {
    pub current: Route,
    pub optimized: Route,
    pub improvement: Improvement,
}

/// Splits an employee's tasks into those the optimizer may resequence and
/// the intervals of those it must work around.
///
/// Only pending tasks assigned to this employee alone are routable; shared,
/// started and finished tasks stay where they are.
pub fn partition_tasks<'a>(
    employee_id: &EmployeeId,
    tasks: impl IntoIterator<Item = &'a Task>,
) -> (Vec<&'a Task>, Vec<(i32, i32)>) {
    let mut routable = Vec::new();
    let mut blocked = Vec::new();
    for task in tasks {
        if !task.is_assigned_to(employee_id) || task.status == TaskStatus::Cancelled {
            continue;
        }
        if task.status == TaskStatus::Pending && task.assigned_employees.len() == 1 {
            routable.push(task);
        } else {
            blocked.push(task.window_seconds());
        }
    }
    (routable, blocked)
}

/// Rejects tasks the employee cannot do or that are malformed.
pub fn check_assignable(employee: &Employee, tasks: &[&Task]) -> Result<(), PlannerError> {
    for task in tasks {
        task.validate()?;
        let missing = task.missing_skills(employee);
        if !missing.is_empty() {
            return Err(PlannerError::UnassignableTask {
                task_id: task.id.clone(),
                employee_id: employee.id.clone(),
                missing,
            });
        }
    }
    Ok(())
}

pub(crate) fn working_hours(employee: &Employee, settings: &OptimizationSettings) -> (i32, i32) {
    settings
        .working_hours
        .unwrap_or(employee.working_hours)
        .seconds()
}

/// Optimizes one employee's day.
///
/// `tasks` are the employee's routable tasks in their current order;
/// `blocked` are fixed intervals the route must avoid.
pub fn optimize_route<P: DistanceProvider + ?Sized>(
    employee: &Employee,
    tasks: &[&Task],
    blocked: &[(i32, i32)],
    provider: &P,
    settings: &OptimizationSettings,
    cancel: &CancelToken,
) -> Result<RouteOptimization, PlannerError> {
    check_assignable(employee, tasks)?;

    let mut locations = Vec::with_capacity(tasks.len() + 1);
    locations.push(employee.home);
    locations.extend(tasks.iter().map(|task| task.location));
    let matrix = TravelMatrix::build(provider, &locations);

    let problem = RouteProblem::new(
        employee.id.clone(),
        tasks.to_vec(),
        &matrix,
        0,
        (1..=tasks.len()).collect(),
        working_hours(employee, settings),
        blocked.to_vec(),
        settings,
    );
    let current_order: Vec<usize> = (0..tasks.len()).collect();
    optimize_problem(&problem, &current_order, settings, cancel)
}

/// Searches `problem` starting from `current_order`.
pub(crate) fn optimize_problem(
    problem: &RouteProblem<'_>,
    current_order: &[usize],
    settings: &OptimizationSettings,
    cancel: &CancelToken,
) -> Result<RouteOptimization, PlannerError> {
    let baseline = problem.evaluate(current_order);
    let best = search(problem, current_order, &baseline, settings, cancel)?;

    let current = problem.to_route(&baseline);
    let chosen = match best {
        Some(candidate) if accepts(&candidate, &baseline) => candidate,
        _ => baseline,
    };
    let optimized = problem.to_route(&chosen);
    let improvement = Improvement::between(&current, &optimized);

    debug!(
        employee = %problem.employee_id,
        tasks = problem.len(),
        cost_saved = improvement.cost_saved,
        "route optimized"
    );

    Ok(RouteOptimization {
        current,
        optimized,
        improvement,
    })
}

/// A candidate replaces the baseline only if it is strictly better and no
/// metric got worse.
fn accepts(candidate: &Evaluation, baseline: &Evaluation) -> bool {
    candidate.no_worse_than(baseline) && candidate.better_than(baseline)
}

/// Best ordering found for `problem`.
///
/// `baseline` may come from a different task set (reassignment compares
/// against the employee's original route); `seed` is an ordering of this
/// problem's tasks that local search may start from.
pub(crate) fn search(
    problem: &RouteProblem<'_>,
    seed: &[usize],
    baseline: &Evaluation,
    settings: &OptimizationSettings,
    cancel: &CancelToken,
) -> Result<Option<Evaluation>, PlannerError> {
    if problem.len() < 2 {
        return Ok(None);
    }
    if problem.len() <= settings.exact_search_limit.min(MAX_EXACT_TASKS) {
        exact_search(problem, baseline, cancel)
    } else {
        heuristic_search(problem, seed, baseline, settings, cancel).map(Some)
    }
}

// ============================================================================
// Exact search
// ============================================================================

/// Subset DP is exponential; beyond this the heuristic takes over regardless
/// of settings.
const MAX_EXACT_TASKS: usize = 16;

#[derive(Debug, Clone)]
struct Label {
    mask: u32,
    last: usize,
    end: i32,
    distance_m: f64,
    travel_s: i32,
    service_s: i32,
    violations: u32,
    parent: Option<usize>,
}

impl Label {
    /// No worse in anything a completion of either label can depend on.
    ///
    /// Cost is a positive blend of distance and time, so it is covered too.
    fn dominates(&self, other: &Label) -> bool {
        self.distance_m <= other.distance_m + EPSILON
            && self.travel_s <= other.travel_s
            && self.end <= other.end
            && self.violations <= other.violations
    }
}

/// Label-setting DP over (visited subset, last task).
///
/// A label is dropped only when another label for the same state dominates
/// it. What a route can still do after a state depends only on its finish
/// time, so the surviving labels hold the cheapest route for every subset
/// among those that pass the no-regression gate.
fn exact_search(
    problem: &RouteProblem<'_>,
    baseline: &Evaluation,
    cancel: &CancelToken,
) -> Result<Option<Evaluation>, PlannerError> {
    let n = problem.len();
    let full = 1usize << n;
    let mut arena: Vec<Label> = Vec::new();
    let mut states: Vec<Vec<usize>> = vec![Vec::new(); full * n];

    for task in 0..n {
        if let Ok(leg) = problem.step(problem.home(), problem.start_time(), task) {
            let label = Label {
                mask: 1 << task,
                last: task,
                end: leg.end,
                distance_m: leg.meters,
                travel_s: leg.seconds,
                service_s: leg.end - leg.start,
                violations: u32::from(leg.outside_window),
                parent: None,
            };
            insert_label(&mut arena, &mut states[(1 << task) * n + task], label);
        }
    }

    for mask in 1..full {
        if mask % 256 == 0 {
            cancel.check()?;
        }
        for last in 0..n {
            let state = mask * n + last;
            if states[state].is_empty() {
                continue;
            }
            let labels = states[state].clone();
            for label_id in labels {
                let (end, distance_m, travel_s, service_s, violations) = {
                    let label = &arena[label_id];
                    (
                        label.end,
                        label.distance_m,
                        label.travel_s,
                        label.service_s,
                        label.violations,
                    )
                };
                for next in 0..n {
                    if mask & (1 << next) != 0 {
                        continue;
                    }
                    let Ok(leg) = problem.step(problem.node(last), end, next) else {
                        continue;
                    };
                    let next_mask = mask | (1 << next);
                    let label = Label {
                        mask: next_mask as u32,
                        last: next,
                        end: leg.end,
                        distance_m: distance_m + leg.meters,
                        travel_s: travel_s + leg.seconds,
                        service_s: service_s + (leg.end - leg.start),
                        violations: violations + u32::from(leg.outside_window),
                        parent: Some(label_id),
                    };
                    insert_label(&mut arena, &mut states[next_mask * n + next], label);
                }
            }
        }
    }

    // Pick the best surviving label whose route does not regress.
    let mut best: Option<Evaluation> = None;
    for state in &states {
        for &label_id in state {
            let evaluation = problem.evaluate(&label_order(&arena, label_id, n));
            if !evaluation.no_worse_than(baseline) {
                continue;
            }
            if best.as_ref().is_none_or(|b| evaluation.better_than(b)) {
                best = Some(evaluation);
            }
        }
    }
    Ok(best)
}

fn insert_label(arena: &mut Vec<Label>, state: &mut Vec<usize>, label: Label) {
    if state.iter().any(|&id| arena[id].dominates(&label)) {
        return;
    }
    state.retain(|&id| !label.dominates(&arena[id]));
    state.push(arena.len());
    arena.push(label);
}

/// Visiting order of a label's path followed by the tasks it left out.
fn label_order(arena: &[Label], label_id: usize, n: usize) -> Vec<usize> {
    let mut path = Vec::new();
    let mut cursor = Some(label_id);
    while let Some(id) = cursor {
        path.push(arena[id].last);
        cursor = arena[id].parent;
    }
    path.reverse();

    let mask = arena[label_id].mask;
    path.extend((0..n).filter(|task| mask & (1 << task) == 0));
    path
}

// ============================================================================
// Heuristic search
// ============================================================================

fn heuristic_search(
    problem: &RouteProblem<'_>,
    seed: &[usize],
    baseline: &Evaluation,
    settings: &OptimizationSettings,
    cancel: &CancelToken,
) -> Result<Evaluation, PlannerError> {
    let unconstrained = |_: &Evaluation| true;
    let constructed = problem.evaluate(&nearest_neighbor_order(problem));
    let improved = local_search(
        problem,
        constructed,
        settings.local_search_iterations,
        &unconstrained,
        cancel,
    )?;
    if accepts(&improved, baseline) {
        return Ok(improved);
    }

    // The constructed route traded a metric away; improve the seed order
    // instead, never accepting a regression.
    let guarded = |candidate: &Evaluation| candidate.no_worse_than(baseline);
    local_search(
        problem,
        problem.evaluate(seed),
        settings.local_search_iterations,
        &guarded,
        cancel,
    )
}

/// Repeatedly serves the reachable task that can start soonest.
fn nearest_neighbor_order(problem: &RouteProblem<'_>) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..problem.len()).collect();
    let mut order = Vec::with_capacity(problem.len());
    let mut position = problem.home();
    let mut now = problem.start_time();

    loop {
        let next = remaining
            .iter()
            .enumerate()
            .filter_map(|(slot, &task)| {
                problem
                    .step(position, now, task)
                    .ok()
                    .map(|leg| (slot, task, leg))
            })
            .min_by_key(|(_, task, leg)| (leg.start, *task));

        let Some((slot, task, leg)) = next else {
            break;
        };
        remaining.remove(slot);
        order.push(task);
        position = problem.node(task);
        now = leg.end;
    }

    order.extend(remaining);
    order
}

fn local_search<F>(
    problem: &RouteProblem<'_>,
    start: Evaluation,
    iterations: usize,
    admissible: &F,
    cancel: &CancelToken,
) -> Result<Evaluation, PlannerError>
where
    F: Fn(&Evaluation) -> bool,
{
    let mut current = start;
    for _ in 0..iterations {
        cancel.check()?;
        let improved = two_opt_improve(problem, &mut current, admissible)
            || or_opt_improve(problem, &mut current, admissible);
        if !improved {
            break;
        }
    }
    Ok(current)
}

/// 2-opt: reverse a segment of the order. Returns true if an improvement was made.
fn two_opt_improve<F>(problem: &RouteProblem<'_>, current: &mut Evaluation, admissible: &F) -> bool
where
    F: Fn(&Evaluation) -> bool,
{
    let n = current.order.len();
    for i in 0..n.saturating_sub(1) {
        for j in i + 1..n {
            let mut candidate = current.order.clone();
            candidate[i..=j].reverse();
            let evaluation = problem.evaluate(&candidate);
            if admissible(&evaluation) && evaluation.better_than(current) {
                *current = evaluation;
                return true;
            }
        }
    }
    false
}

/// Or-opt: move a run of one to three tasks elsewhere in the order.
fn or_opt_improve<F>(problem: &RouteProblem<'_>, current: &mut Evaluation, admissible: &F) -> bool
where
    F: Fn(&Evaluation) -> bool,
{
    let n = current.order.len();
    for segment_len in 1..=3.min(n.saturating_sub(1)) {
        for from in 0..=n - segment_len {
            let mut rest = current.order.clone();
            let segment: Vec<usize> = rest.drain(from..from + segment_len).collect();
            for to in 0..=rest.len() {
                if to == from {
                    continue;
                }
                let mut candidate = rest.clone();
                for (offset, &task) in segment.iter().enumerate() {
                    candidate.insert(to + offset, task);
                }
                let evaluation = problem.evaluate(&candidate);
                if admissible(&evaluation) && evaluation.better_than(current) {
                    *current = evaluation;
                    return true;
                }
            }
        }
    }
    false
}
