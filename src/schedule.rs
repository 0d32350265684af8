//! Schedule index: the authoritative assignment state for one planning day.
//!
//! Tasks are projected onto a fixed grid of 15 minute slots so conflict
//! queries are a lookup. Every change rebuilds an immutable
//! [`ScheduleSnapshot`] and swaps it in, so readers holding an older
//! snapshot never observe a partial update.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PlannerError;
use crate::haversine::haversine_km;
use crate::model::{seconds_of, time_at, Coordinate, Employee, EmployeeId, Task, TaskId, TaskStatus};

pub const SLOT_MINUTES: i32 = 15;
const GRID_START_SECONDS: i32 = 8 * 3600;
const GRID_END_SECONDS: i32 = 18 * 3600;

/// Discretization of the planning day into fixed-width slots.
///
/// Slot `i` covers `[start + i * width, start + (i + 1) * width)`. The
/// default grid runs 08:00 to 18:00 inclusive of the boundary: 41 slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrid {
    start_seconds: i32,
    slot_seconds: i32,
    count: usize,
}

impl Default for SlotGrid {
    fn default() -> Self {
        let slot_seconds = SLOT_MINUTES * 60;
        Self {
            start_seconds: GRID_START_SECONDS,
            slot_seconds,
            count: ((GRID_END_SECONDS - GRID_START_SECONDS) / slot_seconds + 1) as usize,
        }
    }
}

impl SlotGrid {
    pub fn slot_count(&self) -> usize {
        self.count
    }

    pub fn slot_start(&self, slot: usize) -> NaiveTime {
        time_at(self.start_seconds + slot as i32 * self.slot_seconds)
    }

    /// Slot containing the given time, if it falls on the grid.
    pub fn slot_of(&self, time: NaiveTime) -> Option<usize> {
        let offset = seconds_of(time) - self.start_seconds;
        if offset < 0 {
            return None;
        }
        let slot = (offset / self.slot_seconds) as usize;
        (slot < self.count).then_some(slot)
    }

    /// Slots whose interval intersects `[start, end)` (seconds from midnight).
    pub fn slots_overlapping(&self, start: i32, end: i32) -> Range<usize> {
        if end <= start {
            return 0..0;
        }
        let first = (start - self.start_seconds).div_euclid(self.slot_seconds).max(0);
        let last = (end - self.start_seconds + self.slot_seconds - 1)
            .div_euclid(self.slot_seconds)
            .min(self.count as i32);
        if first >= last {
            return 0..0;
        }
        first as usize..last as usize
    }
}

/// The authoritative input for one day: who works and what needs doing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub employees: Vec<Employee>,
    pub tasks: Vec<Task>,
}

impl DayPlan {
    pub fn new(date: NaiveDate, employees: Vec<Employee>, tasks: Vec<Task>) -> Self {
        Self {
            date,
            employees,
            tasks,
        }
    }

    pub fn task_mut(&mut self, task_id: &TaskId) -> Result<&mut Task, PlannerError> {
        self.tasks
            .iter_mut()
            .find(|task| &task.id == task_id)
            .ok_or_else(|| PlannerError::UnknownTask(task_id.clone()))
    }
}

/// Aggregate load for one employee on the planning day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Workload {
    /// Sum of estimated durations; overlapping tasks count twice.
    pub total_minutes: i32,
    pub percent_of_workday: f64,
    pub is_overloaded: bool,
    pub capped_efficiency: f64,
}

impl Workload {
    pub fn compute(total_minutes: i32, workday_minutes: i32) -> Self {
        let percent_of_workday = if workday_minutes > 0 {
            total_minutes as f64 / workday_minutes as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_minutes,
            percent_of_workday,
            is_overloaded: total_minutes > workday_minutes,
            capped_efficiency: percent_of_workday.min(100.0),
        }
    }
}

/// Immutable view of the day with slot and employee lookups.
#[derive(Debug)]
pub struct ScheduleSnapshot {
    version: u64,
    plan: DayPlan,
    grid: SlotGrid,
    employee_index: HashMap<EmployeeId, usize>,
    task_index: HashMap<TaskId, usize>,
    /// Non-cancelled task indices per employee, sorted by start time then id.
    by_employee: Vec<Vec<usize>>,
    /// `[employee][slot]` -> task indices.
    slots: Vec<Vec<Vec<usize>>>,
}

impl ScheduleSnapshot {
    /// Validates the plan and projects it onto the slot grid. O(tasks).
    pub fn build(plan: DayPlan, version: u64) -> Result<Self, PlannerError> {
        let grid = SlotGrid::default();

        let mut employee_index = HashMap::with_capacity(plan.employees.len());
        for (i, employee) in plan.employees.iter().enumerate() {
            employee.validate()?;
            if employee_index.insert(employee.id.clone(), i).is_some() {
                return Err(PlannerError::InvalidEmployee {
                    employee_id: employee.id.clone(),
                    reason: "duplicate id".to_string(),
                });
            }
        }

        let mut task_index = HashMap::with_capacity(plan.tasks.len());
        let mut by_employee = vec![Vec::new(); plan.employees.len()];
        let mut slots = vec![vec![Vec::new(); grid.slot_count()]; plan.employees.len()];

        for (t, task) in plan.tasks.iter().enumerate() {
            task.validate()?;
            if task_index.insert(task.id.clone(), t).is_some() {
                return Err(PlannerError::invalid_task(&task.id, "duplicate id"));
            }
            if task.status == TaskStatus::Cancelled {
                continue;
            }
            let (start, end) = task.window_seconds();
            for employee_id in &task.assigned_employees {
                let e = *employee_index
                    .get(employee_id)
                    .ok_or_else(|| PlannerError::UnknownEmployee(employee_id.clone()))?;
                by_employee[e].push(t);
                for slot in grid.slots_overlapping(start, end) {
                    slots[e][slot].push(t);
                }
            }
        }

        for tasks in &mut by_employee {
            tasks.sort_by(|a, b| {
                let (a, b) = (&plan.tasks[*a], &plan.tasks[*b]);
                a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id))
            });
        }

        Ok(Self {
            version,
            plan,
            grid,
            employee_index,
            task_index,
            by_employee,
            slots,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn date(&self) -> NaiveDate {
        self.plan.date
    }

    pub fn grid(&self) -> &SlotGrid {
        &self.grid
    }

    pub fn plan(&self) -> &DayPlan {
        &self.plan
    }

    pub fn employees(&self) -> &[Employee] {
        &self.plan.employees
    }

    pub fn employee(&self, employee_id: &EmployeeId) -> Option<&Employee> {
        self.employee_index
            .get(employee_id)
            .map(|&e| &self.plan.employees[e])
    }

    pub fn task(&self, task_id: &TaskId) -> Option<&Task> {
        self.task_index.get(task_id).map(|&t| &self.plan.tasks[t])
    }

    fn employee_slot(&self, employee_id: &EmployeeId) -> Result<usize, PlannerError> {
        self.employee_index
            .get(employee_id)
            .copied()
            .ok_or_else(|| PlannerError::UnknownEmployee(employee_id.clone()))
    }

    /// Non-cancelled tasks for the employee, ordered by start time.
    pub fn tasks_for(&self, employee_id: &EmployeeId) -> Vec<&Task> {
        self.employee_index
            .get(employee_id)
            .map(|&e| {
                self.by_employee[e]
                    .iter()
                    .map(|&t| &self.plan.tasks[t])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tasks of the employee whose interval intersects the slot.
    pub fn tasks_at(&self, employee_id: &EmployeeId, slot: usize) -> Vec<&Task> {
        let Some(&e) = self.employee_index.get(employee_id) else {
            return Vec::new();
        };
        self.slots[e]
            .get(slot)
            .map(|tasks| tasks.iter().map(|&t| &self.plan.tasks[t]).collect())
            .unwrap_or_default()
    }

    pub fn has_conflict(&self, employee_id: &EmployeeId, slot: usize) -> bool {
        self.employee_index
            .get(employee_id)
            .and_then(|&e| self.slots[e].get(slot))
            .is_some_and(|tasks| tasks.len() > 1)
    }

    pub fn conflict_slots(&self, employee_id: &EmployeeId) -> Vec<usize> {
        (0..self.grid.slot_count())
            .filter(|&slot| self.has_conflict(employee_id, slot))
            .collect()
    }

    /// Tasks of the employee overlapping `[start, end)` exactly, excluding one task.
    pub fn overlapping(
        &self,
        employee_id: &EmployeeId,
        start: i32,
        end: i32,
        exclude: &TaskId,
    ) -> Vec<&Task> {
        self.tasks_for(employee_id)
            .into_iter()
            .filter(|task| &task.id != exclude)
            .filter(|task| {
                let (s, e) = task.window_seconds();
                s < end && start < e
            })
            .collect()
    }

    pub fn workload(&self, employee_id: &EmployeeId) -> Result<Workload, PlannerError> {
        let e = self.employee_slot(employee_id)?;
        let total_minutes = self.by_employee[e]
            .iter()
            .map(|&t| self.plan.tasks[t].estimated_duration_minutes)
            .fold(0i32, i32::saturating_add);
        Ok(Workload::compute(
            total_minutes,
            self.plan.employees[e].workday_minutes(),
        ))
    }

    /// Active employees ranked by straight-line distance from a point.
    pub fn nearest_employees(&self, point: Coordinate, limit: usize) -> Vec<(&Employee, f64)> {
        let mut ranked: Vec<(&Employee, f64)> = self
            .plan
            .employees
            .iter()
            .filter(|employee| employee.active)
            .map(|employee| (employee, haversine_km(employee.current_location(), point)))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.id.cmp(&b.0.id)));
        ranked.truncate(limit);
        ranked
    }
}

/// Shared handle to the day's schedule.
///
/// Reads clone the current snapshot `Arc`. Writes are serialized, build a
/// complete new snapshot off-lock and swap it in.
#[derive(Debug)]
pub struct ScheduleIndex {
    current: RwLock<Arc<ScheduleSnapshot>>,
    writer: Mutex<()>,
}

impl ScheduleIndex {
    pub fn new(plan: DayPlan) -> Result<Self, PlannerError> {
        let snapshot = ScheduleSnapshot::build(plan, 0)?;
        Ok(Self {
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        })
    }

    pub fn snapshot(&self) -> Arc<ScheduleSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the whole day.
    pub fn replace(&self, plan: DayPlan) -> Result<Arc<ScheduleSnapshot>, PlannerError> {
        self.update(move |current| {
            *current = plan;
            Ok(())
        })
        .map(|(_, snapshot)| snapshot)
    }

    /// Applies a mutation to a copy of the plan and swaps the rebuilt snapshot in.
    ///
    /// If the closure or the rebuild fails nothing is published.
    pub fn update<T, F>(&self, mutate: F) -> Result<(T, Arc<ScheduleSnapshot>), PlannerError>
    where
        F: FnOnce(&mut DayPlan) -> Result<T, PlannerError>,
    {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let base = self.snapshot();
        let mut plan = base.plan.clone();
        let value = mutate(&mut plan)?;
        let next = Arc::new(ScheduleSnapshot::build(plan, base.version + 1)?);

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        debug!(version = next.version, "schedule snapshot swapped");
        Ok((value, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> i32 {
        (h * 3600 + m * 60) as i32
    }

    #[test]
    fn test_default_grid_has_41_slots() {
        let grid = SlotGrid::default();
        assert_eq!(grid.slot_count(), 41);
        assert_eq!(grid.slot_start(0), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(grid.slot_start(40), NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn test_slot_of_boundaries() {
        let grid = SlotGrid::default();
        assert_eq!(grid.slot_of(NaiveTime::from_hms_opt(7, 59, 0).unwrap()), None);
        assert_eq!(grid.slot_of(NaiveTime::from_hms_opt(9, 45, 0).unwrap()), Some(7));
        assert_eq!(grid.slot_of(NaiveTime::from_hms_opt(18, 14, 0).unwrap()), Some(40));
        assert_eq!(grid.slot_of(NaiveTime::from_hms_opt(18, 15, 0).unwrap()), None);
    }

    #[test]
    fn test_slots_overlapping_half_open() {
        let grid = SlotGrid::default();
        // [09:00, 10:00) covers 09:00, 09:15, 09:30, 09:45
        assert_eq!(grid.slots_overlapping(hm(9, 0), hm(10, 0)), 4..8);
        // [09:10, 09:20) touches two slots
        assert_eq!(grid.slots_overlapping(hm(9, 10), hm(9, 20)), 4..6);
        // partially before the grid
        assert_eq!(grid.slots_overlapping(hm(7, 0), hm(8, 30)), 0..2);
        // entirely after the grid
        assert_eq!(grid.slots_overlapping(hm(19, 0), hm(20, 0)), 0..0);
        assert_eq!(grid.slots_overlapping(hm(10, 0), hm(10, 0)), 0..0);
    }

    #[test]
    fn test_workload_caps_efficiency() {
        let load = Workload::compute(600, 480);
        assert!(load.is_overloaded);
        assert_eq!(load.percent_of_workday, 125.0);
        assert_eq!(load.capped_efficiency, 100.0);

        let exact = Workload::compute(480, 480);
        assert!(!exact.is_overloaded);
    }
}
