//! Route evaluation.
//!
//! A route is evaluated by walking its tasks in order from the employee's
//! start location: travel, wait for the window to open, skip past fixed
//! appointments, serve. Tasks that cannot be placed are skipped and reported
//! as unscheduled; the employee stays where they were.
//!
//! With soft windows a task may still start after its window closes. The
//! stop is kept and flagged `outside_window`.

use serde::Serialize;

use crate::matrix::TravelMatrix;
use crate::model::{time_at, EmployeeId, Task, TaskId};
use crate::settings::{CostWeights, OptimizationSettings};

pub(crate) const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteStop {
    pub task_id: TaskId,
    pub arrival: chrono::NaiveTime,
    pub start: chrono::NaiveTime,
    pub end: chrono::NaiveTime,
    /// Leg from the previous stop (or the start location).
    pub travel_meters: f64,
    pub travel_seconds: i32,
    /// Service starts outside the task's window (soft windows only).
    pub outside_window: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnscheduledReason {
    /// The employee cannot arrive before the window closes.
    WindowClosed,
    /// Service would end after working hours.
    OutsideWorkingHours,
    /// The leg exceeds the configured per-leg travel cap.
    LegTooLong,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnscheduledTask {
    pub task_id: TaskId,
    pub reason: UnscheduledReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RouteMetrics {
    pub total_distance_m: f64,
    pub travel_minutes: f64,
    pub service_minutes: f64,
    /// Travel plus service.
    pub total_duration_minutes: f64,
    /// From leaving the start location to finishing the last stop.
    pub elapsed_minutes: f64,
    /// `100 * service / elapsed`, capped at 100.
    pub efficiency: f64,
    pub cost: f64,
    /// Sum of priority weights of unscheduled tasks.
    pub unscheduled_weight: u32,
    /// Stops served outside their window.
    pub window_violations: u32,
}

/// One employee's ordered tasks for the day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub employee_id: EmployeeId,
    pub stops: Vec<RouteStop>,
    pub unscheduled: Vec<UnscheduledTask>,
    pub metrics: RouteMetrics,
}

impl Route {
    pub fn task_ids(&self) -> Vec<&TaskId> {
        self.stops.iter().map(|stop| &stop.task_id).collect()
    }

    /// Tasks planned outside their window.
    pub fn window_violations(&self) -> Vec<&TaskId> {
        self.stops
            .iter()
            .filter(|stop| stop.outside_window)
            .map(|stop| &stop.task_id)
            .collect()
    }
}

/// Planned service for one task, in seconds from midnight.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Leg {
    pub arrival: i32,
    pub start: i32,
    pub end: i32,
    pub meters: f64,
    pub seconds: i32,
    pub outside_window: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Evaluation {
    pub order: Vec<usize>,
    pub stops: Vec<(usize, Leg)>,
    pub unscheduled: Vec<(usize, UnscheduledReason)>,
    pub distance_m: f64,
    pub travel_s: i32,
    pub service_s: i32,
    pub begin: Option<i32>,
    pub end: i32,
    pub unscheduled_weight: u32,
    pub window_violations: u32,
    pub cost: f64,
}

impl Evaluation {
    pub fn duration_s(&self) -> i32 {
        self.travel_s + self.service_s
    }

    /// Lexicographic: fewer unscheduled priority points, then lower cost.
    pub fn better_than(&self, other: &Evaluation) -> bool {
        self.unscheduled_weight < other.unscheduled_weight
            || (self.unscheduled_weight == other.unscheduled_weight
                && self.cost < other.cost - EPSILON)
    }

    /// No metric is worse than the baseline's.
    pub fn no_worse_than(&self, baseline: &Evaluation) -> bool {
        self.unscheduled_weight <= baseline.unscheduled_weight
            && self.window_violations <= baseline.window_violations
            && self.distance_m <= baseline.distance_m + EPSILON
            && self.duration_s() <= baseline.duration_s()
    }
}

/// Everything needed to evaluate orderings of one employee's tasks.
///
/// Task `i` lives at matrix node `task_nodes[i]`; the start location at `home`.
#[derive(Debug)]
pub(crate) struct RouteProblem<'a> {
    pub employee_id: EmployeeId,
    pub tasks: Vec<&'a Task>,
    matrix: &'a TravelMatrix,
    home: usize,
    task_nodes: Vec<usize>,
    hours: (i32, i32),
    /// Fixed appointments, sorted by start.
    blocked: Vec<(i32, i32)>,
    respect_windows: bool,
    max_leg: Option<i32>,
    weights: CostWeights,
}

impl<'a> RouteProblem<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        employee_id: EmployeeId,
        tasks: Vec<&'a Task>,
        matrix: &'a TravelMatrix,
        home: usize,
        task_nodes: Vec<usize>,
        hours: (i32, i32),
        mut blocked: Vec<(i32, i32)>,
        settings: &OptimizationSettings,
    ) -> Self {
        blocked.sort_unstable();
        Self {
            employee_id,
            tasks,
            matrix,
            home,
            task_nodes,
            hours,
            blocked,
            respect_windows: settings.respect_time_windows,
            max_leg: settings.max_leg_seconds(),
            weights: settings.weights(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn start_time(&self) -> i32 {
        self.hours.0
    }

    pub fn home(&self) -> usize {
        self.home
    }

    pub fn node(&self, task: usize) -> usize {
        self.task_nodes[task]
    }

    pub fn weight(&self, task: usize) -> u32 {
        self.tasks[task].priority.weight()
    }

    pub fn cost(&self, distance_m: f64, duration_s: i32) -> f64 {
        self.weights.distance_per_km * distance_m / 1000.0
            + self.weights.time_per_minute * duration_s as f64 / 60.0
    }

    /// Tries to serve `task` after being at node `from` at time `now`.
    pub fn step(&self, from: usize, now: i32, task: usize) -> Result<Leg, UnscheduledReason> {
        let leg = self.matrix.get(from, self.task_nodes[task]);
        if self.max_leg.is_some_and(|max| leg.seconds > max) {
            return Err(UnscheduledReason::LegTooLong);
        }

        let t = self.tasks[task];
        let (window_start, window_end) = t.window_seconds();
        let duration = t.duration_seconds();
        let arrival = now + leg.seconds;

        // The window opening is a target even when windows are soft.
        let start = self.after_blocked(arrival.max(window_start), duration);

        let outside_window = start >= window_end;
        if self.respect_windows && outside_window {
            return Err(UnscheduledReason::WindowClosed);
        }
        let end = start.saturating_add(duration);
        if end > self.hours.1 {
            return Err(UnscheduledReason::OutsideWorkingHours);
        }

        Ok(Leg {
            arrival,
            start,
            end,
            meters: leg.meters,
            seconds: leg.seconds,
            outside_window,
        })
    }

    /// Earliest start at or after `start` that does not overlap a fixed block.
    fn after_blocked(&self, mut start: i32, duration: i32) -> i32 {
        for &(block_start, block_end) in &self.blocked {
            if start < block_end && block_start < start + duration {
                start = block_end;
            }
        }
        start
    }

    pub fn evaluate(&self, order: &[usize]) -> Evaluation {
        let mut position = self.home;
        let mut now = self.hours.0;
        let mut stops = Vec::with_capacity(order.len());
        let mut unscheduled = Vec::new();
        let mut distance_m = 0.0;
        let mut travel_s = 0;
        let mut service_s = 0;
        let mut unscheduled_weight = 0;
        let mut window_violations = 0;

        for &task in order {
            match self.step(position, now, task) {
                Ok(leg) => {
                    distance_m += leg.meters;
                    travel_s += leg.seconds;
                    service_s += leg.end - leg.start;
                    now = leg.end;
                    position = self.task_nodes[task];
                    window_violations += u32::from(leg.outside_window);
                    stops.push((task, leg));
                }
                Err(reason) => {
                    unscheduled_weight += self.weight(task);
                    unscheduled.push((task, reason));
                }
            }
        }

        let begin = stops
            .first()
            .map(|(_, leg)| (leg.start - leg.seconds).max(self.hours.0));

        Evaluation {
            order: order.to_vec(),
            stops,
            unscheduled,
            distance_m,
            travel_s,
            service_s,
            begin,
            end: now,
            unscheduled_weight,
            window_violations,
            cost: self.cost(distance_m, travel_s + service_s),
        }
    }

    pub fn to_route(&self, evaluation: &Evaluation) -> Route {
        let stops = evaluation
            .stops
            .iter()
            .map(|(task, leg)| RouteStop {
                task_id: self.tasks[*task].id.clone(),
                arrival: time_at(leg.arrival),
                start: time_at(leg.start),
                end: time_at(leg.end),
                travel_meters: leg.meters,
                travel_seconds: leg.seconds,
                outside_window: leg.outside_window,
            })
            .collect();

        let unscheduled = evaluation
            .unscheduled
            .iter()
            .map(|(task, reason)| UnscheduledTask {
                task_id: self.tasks[*task].id.clone(),
                reason: *reason,
            })
            .collect();

        let elapsed_s = evaluation.begin.map_or(0, |begin| evaluation.end - begin);
        let efficiency = if elapsed_s > 0 {
            (100.0 * evaluation.service_s as f64 / elapsed_s as f64).min(100.0)
        } else {
            0.0
        };

        Route {
            employee_id: self.employee_id.clone(),
            stops,
            unscheduled,
            metrics: RouteMetrics {
                total_distance_m: evaluation.distance_m,
                travel_minutes: evaluation.travel_s as f64 / 60.0,
                service_minutes: evaluation.service_s as f64 / 60.0,
                total_duration_minutes: evaluation.duration_s() as f64 / 60.0,
                elapsed_minutes: elapsed_s as f64 / 60.0,
                efficiency,
                cost: evaluation.cost,
                unscheduled_weight: evaluation.unscheduled_weight,
                window_violations: evaluation.window_violations,
            },
        }
    }
}
