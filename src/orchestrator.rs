//! Optimization orchestrator.
//!
//! Runs the route optimizer for a set of employees, keeps the resulting
//! suggestions until they are applied or rejected, and makes sure a
//! suggestion is never applied on top of a schedule it was not computed for.
//!
//! Without reassignment every employee is optimized independently and gets
//! their own suggestion. With reassignment, tasks may also move between
//! employees; all employees touched by such moves share one suggestion so
//! that the work handed over is applied together.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{NaiveDate, NaiveTime};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PlannerError;
use crate::matrix::TravelMatrix;
use crate::model::{seconds_of, time_at, Employee, EmployeeId, Task, TaskId, TaskStatus};
use crate::optimizer::{
    check_assignable, optimize_route, partition_tasks, search, working_hours, CancelToken,
    Improvement, RouteOptimization,
};
use crate::route::{Evaluation, Route, RouteProblem, EPSILON};
use crate::schedule::{DayPlan, ScheduleIndex, ScheduleSnapshot};
use crate::settings::OptimizationSettings;
use crate::traits::DistanceProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SuggestionId(pub u64);

impl fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A task taken over from another employee.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reassignment {
    pub task_id: TaskId,
    pub from: EmployeeId,
}

/// Proposed new route for one employee.
#[derive(Debug, Clone, Serialize)]
pub struct RouteChange {
    pub employee_id: EmployeeId,
    pub current: Route,
    pub proposed: Route,
    pub improvement: Improvement,
    pub reassigned: Vec<Reassignment>,
}

/// The state of one task a suggestion was computed against.
#[derive(Debug, Clone, PartialEq)]
struct TaskBasis {
    task_id: TaskId,
    start_time: NaiveTime,
    end_time: NaiveTime,
    assigned: BTreeSet<EmployeeId>,
    status: TaskStatus,
}

impl TaskBasis {
    fn of(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            start_time: task.start_time,
            end_time: task.end_time,
            assigned: task.assigned_employees.clone(),
            status: task.status,
        }
    }

    fn matches(&self, task: &Task) -> bool {
        task.start_time == self.start_time
            && task.end_time == self.end_time
            && task.assigned_employees == self.assigned
            && task.status == self.status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationSuggestion {
    pub id: SuggestionId,
    /// One entry per employee whose route changes; a single entry unless
    /// tasks move between employees.
    pub changes: Vec<RouteChange>,
    /// Summed over `changes`; never negative in distance, time or cost.
    pub improvement: Improvement,
    #[serde(skip)]
    basis: Vec<TaskBasis>,
}

impl OptimizationSuggestion {
    pub fn employee_ids(&self) -> impl Iterator<Item = &EmployeeId> {
        self.changes.iter().map(|change| &change.employee_id)
    }

    pub fn change_for(&self, employee_id: &EmployeeId) -> Option<&RouteChange> {
        self.changes
            .iter()
            .find(|change| &change.employee_id == employee_id)
    }

    pub fn reassignments(&self) -> impl Iterator<Item = &Reassignment> {
        self.changes.iter().flat_map(|change| change.reassigned.iter())
    }

    /// True while every task this suggestion relies on is unchanged and its
    /// employees have picked up no other tasks.
    fn is_current(&self, plan: &DayPlan) -> bool {
        let tasks: HashMap<&TaskId, &Task> = plan.tasks.iter().map(|t| (&t.id, t)).collect();
        let known: HashSet<&TaskId> = self.basis.iter().map(|b| &b.task_id).collect();
        let employees: HashSet<&EmployeeId> = self.employee_ids().collect();

        let unchanged = self.basis.iter().all(|basis| {
            tasks
                .get(&basis.task_id)
                .is_some_and(|task| basis.matches(task))
        });
        let nothing_new = plan
            .tasks
            .iter()
            .filter(|task| task.status != TaskStatus::Cancelled)
            .filter(|task| task.assigned_employees.iter().any(|e| employees.contains(e)))
            .all(|task| known.contains(&task.id));

        unchanged && nothing_new
    }
}

fn total_improvement<'a>(changes: impl IntoIterator<Item = &'a RouteChange>) -> Improvement {
    changes
        .into_iter()
        .fold(Improvement::default(), |mut total, change| {
            total.distance_saved_m += change.improvement.distance_saved_m;
            total.time_saved_minutes += change.improvement.time_saved_minutes;
            total.efficiency_gain += change.improvement.efficiency_gain;
            total.cost_saved += change.improvement.cost_saved;
            total
        })
}

/// Sums over a set of suggestions, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct OptimizationTotals {
    pub suggestions: usize,
    pub distance_saved_m: f64,
    pub time_saved_minutes: f64,
    pub efficiency_gain: f64,
    pub cost_saved: f64,
}

impl OptimizationTotals {
    pub fn of<'a>(suggestions: impl IntoIterator<Item = &'a OptimizationSuggestion>) -> Self {
        suggestions
            .into_iter()
            .fold(Self::default(), |mut totals, suggestion| {
                totals.suggestions += 1;
                totals.distance_saved_m += suggestion.improvement.distance_saved_m;
                totals.time_saved_minutes += suggestion.improvement.time_saved_minutes;
                totals.efficiency_gain += suggestion.improvement.efficiency_gain;
                totals.cost_saved += suggestion.improvement.cost_saved;
                totals
            })
    }
}

#[derive(Debug, Clone)]
pub struct EmployeeFailure {
    pub employee_id: EmployeeId,
    pub error: PlannerError,
}

/// Result of one optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationRun {
    pub suggestions: Vec<OptimizationSuggestion>,
    /// Every optimized employee's route, including those without a
    /// worthwhile suggestion.
    pub routes: Vec<RouteChange>,
    pub failures: Vec<EmployeeFailure>,
    pub totals: OptimizationTotals,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    pub applied: SuggestionId,
    pub version: u64,
    /// Pending suggestions dropped because the apply made them stale.
    pub dropped: Vec<SuggestionId>,
}

/// An employee's routable tasks and fixed blocks for one run.
struct Job<'a> {
    employee: &'a Employee,
    tasks: Vec<&'a Task>,
    blocked: Vec<(i32, i32)>,
}

/// Route changes that must be suggested together.
type Group = Vec<RouteChange>;

#[derive(Debug, Default)]
pub struct Orchestrator {
    pending: Mutex<Vec<OptimizationSuggestion>>,
    next_id: AtomicU64,
    active_run: Mutex<Option<CancelToken>>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the run in flight, if any.
    pub fn cancel(&self) {
        if let Some(token) = self
            .active_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            token.cancel();
        }
    }

    pub fn pending(&self) -> Vec<OptimizationSuggestion> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn pending_totals(&self) -> OptimizationTotals {
        OptimizationTotals::of(
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter(),
        )
    }

    /// Optimizes the given employees, or every active employee with at least
    /// two routable tasks (any active employee when reassignment is allowed),
    /// and replaces the pending suggestions.
    ///
    /// Starting a run cancels the previous one. A cancelled run leaves the
    /// pending list untouched.
    pub fn run<P: DistanceProvider + ?Sized>(
        &self,
        snapshot: &ScheduleSnapshot,
        date: NaiveDate,
        employee_ids: Option<&[EmployeeId]>,
        provider: &P,
        settings: &OptimizationSettings,
    ) -> Result<OptimizationRun, PlannerError> {
        if date != snapshot.date() {
            return Err(PlannerError::DateMismatch {
                requested: date,
                planned: snapshot.date(),
            });
        }

        let token = CancelToken::new();
        if let Some(previous) = self
            .active_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone())
        {
            previous.cancel();
        }

        let jobs = select_jobs(snapshot, employee_ids, settings.allow_reassignment)?;
        info!(
            employees = jobs.len(),
            reassignment = settings.allow_reassignment,
            "optimization run started"
        );

        let (groups, failures) = if settings.allow_reassignment {
            reassign(&jobs, provider, settings, &token)?
        } else {
            reorder(&jobs, provider, settings, &token)?
        };
        token.check()?;

        let mut suggestions = Vec::new();
        for group in &groups {
            if !worth_suggesting(group, settings) {
                continue;
            }
            let id = SuggestionId(self.next_id.fetch_add(1, Ordering::Relaxed));
            suggestions.push(make_suggestion(id, snapshot, group.clone()));
        }

        self.publish(&token, &suggestions)?;

        let totals = OptimizationTotals::of(&suggestions);
        info!(
            suggestions = totals.suggestions,
            failures = failures.len(),
            distance_saved_m = totals.distance_saved_m,
            time_saved_minutes = totals.time_saved_minutes,
            "optimization run finished"
        );

        Ok(OptimizationRun {
            suggestions,
            routes: groups.into_iter().flatten().collect(),
            failures,
            totals,
        })
    }

    /// Replaces the pending list unless `token` was cancelled by a newer run.
    fn publish(
        &self,
        token: &CancelToken,
        suggestions: &[OptimizationSuggestion],
    ) -> Result<(), PlannerError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        // Checked under the lock so a superseded run cannot overwrite a newer list.
        token.check()?;
        *pending = suggestions.to_vec();
        Ok(())
    }

    /// Commits a pending suggestion's order, timing and handovers, all or
    /// nothing.
    ///
    /// A suggestion computed against a schedule that has since changed is
    /// dropped with `StaleSuggestion`. After a successful apply any other
    /// pending suggestion invalidated by it is dropped too.
    pub fn apply(
        &self,
        index: &ScheduleIndex,
        id: SuggestionId,
    ) -> Result<ApplyOutcome, PlannerError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let position = pending
            .iter()
            .position(|suggestion| suggestion.id == id)
            .ok_or(PlannerError::UnknownSuggestion(id))?;

        let suggestion = &pending[position];
        let result = index.update(|plan| {
            if !suggestion.is_current(plan) {
                return Err(PlannerError::StaleSuggestion(id));
            }
            commit_changes(plan, &suggestion.changes)
        });

        let removed = pending.remove(position);
        let (_, snapshot) = match result {
            Ok(value) => value,
            Err(err) => {
                if matches!(err, PlannerError::StaleSuggestion(_)) {
                    warn!(suggestion = %id, "dropping stale suggestion");
                } else {
                    // Not applied and not stale; keep it for another attempt.
                    pending.insert(position, removed);
                }
                return Err(err);
            }
        };

        let mut dropped = Vec::new();
        pending.retain(|other| {
            let keep = other.is_current(snapshot.plan());
            if !keep {
                dropped.push(other.id);
            }
            keep
        });
        if !dropped.is_empty() {
            warn!(dropped = dropped.len(), "apply invalidated pending suggestions");
        }

        info!(
            suggestion = %id,
            employees = removed.changes.len(),
            version = snapshot.version(),
            "suggestion applied"
        );
        Ok(ApplyOutcome {
            applied: id,
            version: snapshot.version(),
            dropped,
        })
    }

    /// Discards a pending suggestion without touching the schedule.
    pub fn reject(&self, id: SuggestionId) -> Result<OptimizationSuggestion, PlannerError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let position = pending
            .iter()
            .position(|suggestion| suggestion.id == id)
            .ok_or(PlannerError::UnknownSuggestion(id))?;
        debug!(suggestion = %id, "suggestion rejected");
        Ok(pending.remove(position))
    }
}

/// Writes the proposed timing into the plan and hands over reassigned tasks.
///
/// Each task keeps its window length; the window now opens at the planned
/// service start. Unscheduled tasks are left as they are.
fn commit_changes(plan: &mut DayPlan, changes: &[RouteChange]) -> Result<(), PlannerError> {
    for change in changes {
        for reassignment in &change.reassigned {
            let task = plan.task_mut(&reassignment.task_id)?;
            task.assigned_employees.remove(&reassignment.from);
            task.assigned_employees.insert(change.employee_id.clone());
        }
    }
    for stop in changes.iter().flat_map(|change| change.proposed.stops.iter()) {
        let task = plan.task_mut(&stop.task_id)?;
        let (start, end) = task.window_seconds();
        task.start_time = stop.start;
        task.end_time = time_at(seconds_of(stop.start) + end - start);
    }
    Ok(())
}

fn select_jobs<'a>(
    snapshot: &'a ScheduleSnapshot,
    employee_ids: Option<&[EmployeeId]>,
    reassignment: bool,
) -> Result<Vec<Job<'a>>, PlannerError> {
    let employees: Vec<&Employee> = match employee_ids {
        Some(ids) => {
            let mut selected = Vec::with_capacity(ids.len());
            for id in ids {
                let employee = snapshot
                    .employee(id)
                    .ok_or_else(|| PlannerError::UnknownEmployee(id.clone()))?;
                if employee.active {
                    selected.push(employee);
                } else {
                    debug!(employee = %id, "skipping inactive employee");
                }
            }
            selected
        }
        None => snapshot.employees().iter().filter(|e| e.active).collect(),
    };

    let mut jobs: Vec<Job<'a>> = employees
        .into_iter()
        .map(|employee| {
            let (tasks, blocked) = partition_tasks(&employee.id, snapshot.tasks_for(&employee.id));
            Job {
                employee,
                tasks,
                blocked,
            }
        })
        .collect();

    if employee_ids.is_none() && !reassignment {
        // A single task cannot be reordered.
        jobs.retain(|job| job.tasks.len() >= 2);
    }
    jobs.sort_by(|a, b| a.employee.id.cmp(&b.employee.id));
    jobs.dedup_by(|a, b| a.employee.id == b.employee.id);
    Ok(jobs)
}

fn worth_suggesting(group: &[RouteChange], settings: &OptimizationSettings) -> bool {
    let before: u32 = group.iter().map(|c| c.current.metrics.unscheduled_weight).sum();
    let after: u32 = group.iter().map(|c| c.proposed.metrics.unscheduled_weight).sum();
    total_improvement(group).cost_saved > settings.noise_threshold
        || after < before
        || group.iter().any(|change| !change.reassigned.is_empty())
}

fn make_suggestion(id: SuggestionId, snapshot: &ScheduleSnapshot, changes: Group) -> OptimizationSuggestion {
    let mut seen = HashSet::new();
    let basis = changes
        .iter()
        .flat_map(|change| snapshot.tasks_for(&change.employee_id))
        .filter(|task| seen.insert(task.id.clone()))
        .map(TaskBasis::of)
        .collect();

    OptimizationSuggestion {
        id,
        improvement: total_improvement(&changes),
        changes,
        basis,
    }
}

fn change_from(employee_id: EmployeeId, optimization: RouteOptimization) -> RouteChange {
    RouteChange {
        employee_id,
        current: optimization.current,
        proposed: optimization.optimized,
        improvement: optimization.improvement,
        reassigned: Vec::new(),
    }
}

type RunParts = (Vec<Group>, Vec<EmployeeFailure>);

/// Independent per-employee reordering, in parallel.
fn reorder<P: DistanceProvider + ?Sized>(
    jobs: &[Job<'_>],
    provider: &P,
    settings: &OptimizationSettings,
    token: &CancelToken,
) -> Result<RunParts, PlannerError> {
    let results: Vec<(EmployeeId, Result<RouteOptimization, PlannerError>)> = jobs
        .par_iter()
        .map(|job| {
            let result = optimize_route(
                job.employee,
                &job.tasks,
                &job.blocked,
                provider,
                settings,
                token,
            );
            (job.employee.id.clone(), result)
        })
        .collect();

    let mut groups = Vec::new();
    let mut failures = Vec::new();
    for (employee_id, result) in results {
        match result {
            Ok(optimization) => groups.push(vec![change_from(employee_id, optimization)]),
            Err(PlannerError::Cancelled) => return Err(PlannerError::Cancelled),
            Err(error) => {
                warn!(employee = %employee_id, error = %error, "employee not optimized");
                failures.push(EmployeeFailure { employee_id, error });
            }
        }
    }
    Ok((groups, failures))
}

// ============================================================================
// Reassignment
// ============================================================================

/// One employee's evolving route during the reassignment search.
struct Lane<'a> {
    employee: &'a Employee,
    original: Vec<&'a Task>,
    tasks: Vec<&'a Task>,
    blocked: Vec<(i32, i32)>,
    hours: (i32, i32),
    /// Evaluation of the original tasks in their current order.
    baseline: Evaluation,
    /// Best order of `tasks` found so far.
    best: Evaluation,
    /// Gave away or received a task.
    touched: bool,
}

/// Shared travel matrix over every home and task location in the run.
struct Network<'a> {
    matrix: TravelMatrix,
    homes: HashMap<&'a EmployeeId, usize>,
    tasks: HashMap<&'a TaskId, usize>,
}

impl<'a> Network<'a> {
    fn build<P: DistanceProvider + ?Sized>(jobs: &[&Job<'a>], provider: &P) -> Self {
        let mut locations = Vec::new();
        let mut homes = HashMap::new();
        let mut tasks = HashMap::new();
        for job in jobs {
            homes.insert(&job.employee.id, locations.len());
            locations.push(job.employee.home);
            for task in &job.tasks {
                tasks.insert(&task.id, locations.len());
                locations.push(task.location);
            }
        }
        Self {
            matrix: TravelMatrix::build(provider, &locations),
            homes,
            tasks,
        }
    }

    fn problem<'n>(
        &'n self,
        employee: &'n Employee,
        tasks: Vec<&'n Task>,
        blocked: &[(i32, i32)],
        hours: (i32, i32),
        settings: &OptimizationSettings,
    ) -> RouteProblem<'n> {
        let nodes = tasks.iter().map(|task| self.tasks[&task.id]).collect();
        RouteProblem::new(
            employee.id.clone(),
            tasks,
            &self.matrix,
            self.homes[&employee.id],
            nodes,
            hours,
            blocked.to_vec(),
            settings,
        )
    }
}

/// Best ordering of `problem` that is no worse than `seed` in any metric.
fn improve_from(
    problem: &RouteProblem<'_>,
    seed: &[usize],
    settings: &OptimizationSettings,
    token: &CancelToken,
) -> Result<Evaluation, PlannerError> {
    let seeded = problem.evaluate(seed);
    match search(problem, seed, &seeded, settings, token)? {
        Some(found) if found.no_worse_than(&seeded) && found.better_than(&seeded) => Ok(found),
        _ => Ok(seeded),
    }
}

/// Sums of the metrics the acceptance gate compares.
#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    weight: u32,
    violations: u32,
    distance_m: f64,
    duration_s: i32,
    cost: f64,
}

impl Totals {
    fn add(mut self, evaluation: &Evaluation) -> Self {
        self.weight += evaluation.unscheduled_weight;
        self.violations += evaluation.window_violations;
        self.distance_m += evaluation.distance_m;
        self.duration_s += evaluation.duration_s();
        self.cost += evaluation.cost;
        self
    }

    fn no_worse_than(&self, baseline: &Totals) -> bool {
        self.weight <= baseline.weight
            && self.violations <= baseline.violations
            && self.distance_m <= baseline.distance_m + EPSILON
            && self.duration_s <= baseline.duration_s
    }

    fn better_than(&self, other: &Totals) -> bool {
        self.weight < other.weight || (self.weight == other.weight && self.cost < other.cost - EPSILON)
    }
}

/// Multi-employee search: optimize each route, then relocate tasks between
/// employees while the touched routes together improve and are no worse
/// than they were originally.
fn reassign<P: DistanceProvider + ?Sized>(
    jobs: &[Job<'_>],
    provider: &P,
    settings: &OptimizationSettings,
    token: &CancelToken,
) -> Result<RunParts, PlannerError> {
    let mut failures = Vec::new();
    let mut eligible = Vec::new();
    for job in jobs {
        match check_assignable(job.employee, &job.tasks) {
            Ok(()) => eligible.push(job),
            Err(error) => {
                warn!(employee = %job.employee.id, error = %error, "employee not optimized");
                failures.push(EmployeeFailure {
                    employee_id: job.employee.id.clone(),
                    error,
                });
            }
        }
    }

    let network = Network::build(&eligible, provider);

    let lanes: Vec<Result<Lane<'_>, PlannerError>> = eligible
        .par_iter()
        .map(|job| {
            let hours = working_hours(job.employee, settings);
            let problem = network.problem(job.employee, job.tasks.clone(), &job.blocked, hours, settings);
            let current: Vec<usize> = (0..problem.len()).collect();
            let baseline = problem.evaluate(&current);
            let best = improve_from(&problem, &current, settings, token)?;
            Ok(Lane {
                employee: job.employee,
                original: job.tasks.clone(),
                tasks: job.tasks.clone(),
                blocked: job.blocked.clone(),
                hours,
                baseline,
                best,
                touched: false,
            })
        })
        .collect();
    let mut lanes = lanes.into_iter().collect::<Result<Vec<_>, _>>()?;

    for _ in 0..settings.local_search_iterations {
        token.check()?;
        if !relocate_improve(&network, &mut lanes, settings, token)? {
            break;
        }
    }

    let owners: HashMap<&TaskId, &EmployeeId> = lanes
        .iter()
        .flat_map(|lane| lane.original.iter().map(move |task| (&task.id, &lane.employee.id)))
        .collect();

    let mut shared = Vec::new();
    let mut groups = Vec::new();
    for lane in &lanes {
        let original = network.problem(lane.employee, lane.original.clone(), &lane.blocked, lane.hours, settings);
        let current = original.to_route(&lane.baseline);
        let problem = network.problem(lane.employee, lane.tasks.clone(), &lane.blocked, lane.hours, settings);
        let proposed = problem.to_route(&lane.best);

        let reassigned = lane
            .tasks
            .iter()
            .filter_map(|task| {
                let owner = owners.get(&task.id)?;
                (*owner != &lane.employee.id).then(|| Reassignment {
                    task_id: task.id.clone(),
                    from: (*owner).clone(),
                })
            })
            .collect();

        let change = RouteChange {
            employee_id: lane.employee.id.clone(),
            improvement: Improvement::between(&current, &proposed),
            current,
            proposed,
            reassigned,
        };
        if lane.touched {
            shared.push(change);
        } else {
            groups.push(vec![change]);
        }
    }

    debug!(lanes = lanes.len(), handovers = shared.len(), "reassignment search finished");
    if !shared.is_empty() {
        groups.push(shared);
    }
    Ok((groups, failures))
}

/// Moves one task to another employee if that improves the touched routes
/// without making them worse than their originals. Returns true if a move
/// was made.
fn relocate_improve(
    network: &Network<'_>,
    lanes: &mut [Lane<'_>],
    settings: &OptimizationSettings,
    token: &CancelToken,
) -> Result<bool, PlannerError> {
    for from in 0..lanes.len() {
        for position in 0..lanes[from].tasks.len() {
            let task = lanes[from].tasks[position];

            for to in 0..lanes.len() {
                if to == from || !task.missing_skills(lanes[to].employee).is_empty() {
                    continue;
                }
                token.check()?;

                let mut donor_tasks = lanes[from].tasks.clone();
                donor_tasks.remove(position);
                let donor_seed: Vec<usize> = lanes[from]
                    .best
                    .order
                    .iter()
                    .filter(|&&i| i != position)
                    .map(|&i| if i > position { i - 1 } else { i })
                    .collect();
                let donor_problem = network.problem(
                    lanes[from].employee,
                    donor_tasks.clone(),
                    &lanes[from].blocked,
                    lanes[from].hours,
                    settings,
                );
                let donor_best = improve_from(&donor_problem, &donor_seed, settings, token)?;

                let mut receiver_tasks = lanes[to].tasks.clone();
                receiver_tasks.push(task);
                let mut receiver_seed = lanes[to].best.order.clone();
                receiver_seed.push(receiver_tasks.len() - 1);
                let receiver_problem = network.problem(
                    lanes[to].employee,
                    receiver_tasks.clone(),
                    &lanes[to].blocked,
                    lanes[to].hours,
                    settings,
                );
                let receiver_best = improve_from(&receiver_problem, &receiver_seed, settings, token)?;

                // Gate over every lane that would be part of the handover.
                let mut baseline = Totals::default();
                let mut before = Totals::default();
                let mut after = Totals::default();
                for (i, lane) in lanes.iter().enumerate() {
                    if !(lane.touched || i == from || i == to) {
                        continue;
                    }
                    baseline = baseline.add(&lane.baseline);
                    before = before.add(&lane.best);
                    after = after.add(if i == from {
                        &donor_best
                    } else if i == to {
                        &receiver_best
                    } else {
                        &lane.best
                    });
                }
                if !(after.no_worse_than(&baseline) && after.better_than(&before)) {
                    continue;
                }

                debug!(
                    task = %task.id,
                    from = %lanes[from].employee.id,
                    to = %lanes[to].employee.id,
                    "relocating task"
                );
                lanes[from].tasks = donor_tasks;
                lanes[from].best = donor_best;
                lanes[from].touched = true;
                lanes[to].tasks = receiver_tasks;
                lanes[to].best = receiver_best;
                lanes[to].touched = true;
                return Ok(true);
            }
        }
    }
    Ok(false)
}
