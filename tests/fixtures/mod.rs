//! Test fixtures for crew-planner.
//!
//! Builders for employees, tasks and day plans, plus deterministic distance
//! providers. Coordinates are on a small grid near (0, 0): 0.01 degrees is
//! one kilometre and one minute of travel.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveTime};

use crew_planner::error::ProviderError;
use crew_planner::model::{Coordinate, Employee, Priority, Task, TaskStatus, WorkingHours};
use crew_planner::schedule::DayPlan;
use crew_planner::traits::{DistanceProvider, TravelEstimate};

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
}

pub fn plan(employees: Vec<Employee>, tasks: Vec<Task>) -> DayPlan {
    DayPlan::new(day(), employees, tasks)
}

// ============================================================================
// Builders
// ============================================================================

/// Builder for test employees with sensible defaults.
#[derive(Clone, Debug)]
pub struct TestEmployee {
    id: String,
    home: (f64, f64),
    hours: (NaiveTime, NaiveTime),
    skills: Vec<String>,
    active: bool,
}

impl TestEmployee {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            home: (0.0, 0.0),
            hours: (hm(8, 0), hm(17, 0)),
            skills: Vec::new(),
            active: true,
        }
    }

    pub fn home(mut self, lat: f64, lng: f64) -> Self {
        self.home = (lat, lng);
        self
    }

    pub fn hours(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.hours = (start, end);
        self
    }

    pub fn skill(mut self, skill: &str) -> Self {
        self.skills.push(skill.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn build(self) -> Employee {
        let mut employee = Employee::new(
            self.id,
            Coordinate::from(self.home),
            WorkingHours::new(self.hours.0, self.hours.1),
        );
        for skill in self.skills {
            employee = employee.with_skill(skill);
        }
        employee.active = self.active;
        employee
    }
}

/// Builder for test tasks with sensible defaults.
#[derive(Clone, Debug)]
pub struct TestTask {
    id: String,
    location: (f64, f64),
    window: (NaiveTime, NaiveTime),
    duration_min: i32,
    skills: Vec<String>,
    assigned: Vec<String>,
    priority: Priority,
    status: TaskStatus,
}

impl TestTask {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            location: (0.0, 0.0),
            window: (hm(8, 0), hm(17, 0)),
            duration_min: 30,
            skills: Vec::new(),
            assigned: Vec::new(),
            priority: Priority::Medium,
            status: TaskStatus::Pending,
        }
    }

    pub fn location(mut self, lat: f64, lng: f64) -> Self {
        self.location = (lat, lng);
        self
    }

    pub fn window(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.window = (start, end);
        self
    }

    pub fn duration(mut self, minutes: i32) -> Self {
        self.duration_min = minutes;
        self
    }

    pub fn requires(mut self, skill: &str) -> Self {
        self.skills.push(skill.to_string());
        self
    }

    pub fn assigned_to(mut self, employee_id: &str) -> Self {
        self.assigned.push(employee_id.to_string());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Task {
        let mut task = Task::new(
            self.id,
            Coordinate::from(self.location),
            self.window.0,
            self.window.1,
            self.duration_min,
        );
        for skill in self.skills {
            task = task.with_skill(skill);
        }
        for employee_id in self.assigned {
            task = task.assigned_to(employee_id);
        }
        task.priority = self.priority;
        task.status = self.status;
        task
    }
}

// ============================================================================
// Distance providers
// ============================================================================

/// Manhattan metric: 0.01 degrees = 1 km = 1 minute of travel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManhattanProvider;

impl DistanceProvider for ManhattanProvider {
    fn distance(&self, from: Coordinate, to: Coordinate) -> Result<TravelEstimate, ProviderError> {
        let degrees = (from.lat - to.lat).abs() + (from.lng - to.lng).abs();
        let km = (degrees * 100.0 * 1000.0).round() / 1000.0;
        Ok(TravelEstimate {
            meters: km * 1000.0,
            seconds: (km * 60.0).round() as i32,
        })
    }
}

/// Always unavailable; the planner must fall back to straight-line estimates.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingProvider;

impl DistanceProvider for FailingProvider {
    fn distance(&self, _from: Coordinate, _to: Coordinate) -> Result<TravelEstimate, ProviderError> {
        Err(ProviderError::Unavailable("routing service down".to_string()))
    }
}

/// Fixed, possibly asymmetric table. Location `i` is the coordinate
/// `(0, i / 100)`; anything else is unavailable.
#[derive(Debug, Clone)]
pub struct TableProvider {
    legs: Vec<Vec<TravelEstimate>>,
}

impl TableProvider {
    pub fn new(legs: Vec<Vec<TravelEstimate>>) -> Self {
        Self { legs }
    }

    pub fn location(index: usize) -> (f64, f64) {
        (0.0, index as f64 / 100.0)
    }

    fn index(&self, point: Coordinate) -> Result<usize, ProviderError> {
        let index = (point.lng * 100.0).round() as usize;
        if point.lat != 0.0 || index >= self.legs.len() {
            return Err(ProviderError::Unavailable(format!("no row for {point:?}")));
        }
        Ok(index)
    }
}

impl DistanceProvider for TableProvider {
    fn distance(&self, from: Coordinate, to: Coordinate) -> Result<TravelEstimate, ProviderError> {
        Ok(self.legs[self.index(from)?][self.index(to)?])
    }
}
