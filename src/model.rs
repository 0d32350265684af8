//! Domain model: employees, tasks and the time-of-day helpers they share.
//!
//! Everything here is plain data with `serde` derives; the storage and UI
//! layers serialize these types however they like.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl From<&str> for EmployeeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// A daily availability interval, start inclusive, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn minutes(&self) -> i32 {
        (seconds_of(self.end) - seconds_of(self.start)) / 60
    }

    pub(crate) fn seconds(&self) -> (i32, i32) {
        (seconds_of(self.start), seconds_of(self.end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Penalty for leaving a task of this priority unscheduled.
    pub fn weight(self) -> u32 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 4,
            Priority::Urgent => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub skills: BTreeSet<String>,
    pub home: Coordinate,
    pub working_hours: WorkingHours,
    pub live_location: Option<Coordinate>,
    pub active: bool,
}

impl Employee {
    pub fn new(id: impl Into<String>, home: Coordinate, working_hours: WorkingHours) -> Self {
        Self {
            id: EmployeeId(id.into()),
            skills: BTreeSet::new(),
            home,
            working_hours,
            live_location: None,
            active: true,
        }
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.insert(skill.into());
        self
    }

    pub fn workday_minutes(&self) -> i32 {
        self.working_hours.minutes()
    }

    /// Live position when known, otherwise home.
    pub fn current_location(&self) -> Coordinate {
        self.live_location.unwrap_or(self.home)
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.working_hours.start >= self.working_hours.end {
            return Err(PlannerError::InvalidEmployee {
                employee_id: self.id.clone(),
                reason: format!(
                    "working hours start {} is not before end {}",
                    self.working_hours.start, self.working_hours.end
                ),
            });
        }
        if !self.home.is_valid() {
            return Err(PlannerError::InvalidEmployee {
                employee_id: self.id.clone(),
                reason: "home coordinate out of range".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub required_skills: BTreeSet<String>,
    pub location: Coordinate,
    pub address: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub estimated_duration_minutes: i32,
    pub priority: Priority,
    pub assigned_employees: BTreeSet<EmployeeId>,
    pub status: TaskStatus,
    pub documentation_required: bool,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        location: Coordinate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        estimated_duration_minutes: i32,
    ) -> Self {
        Self {
            id: TaskId(id.into()),
            required_skills: BTreeSet::new(),
            location,
            address: String::new(),
            start_time,
            end_time,
            estimated_duration_minutes,
            priority: Priority::Medium,
            assigned_employees: BTreeSet::new(),
            status: TaskStatus::Pending,
            documentation_required: false,
        }
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.required_skills.insert(skill.into());
        self
    }

    pub fn assigned_to(mut self, employee_id: impl Into<String>) -> Self {
        self.assigned_employees.insert(EmployeeId(employee_id.into()));
        self
    }

    pub fn is_assigned_to(&self, employee_id: &EmployeeId) -> bool {
        self.assigned_employees.contains(employee_id)
    }

    /// Skills the task needs that the employee does not have, in tag order.
    pub fn missing_skills(&self, employee: &Employee) -> Vec<String> {
        self.required_skills
            .difference(&employee.skills)
            .cloned()
            .collect()
    }

    pub(crate) fn window_seconds(&self) -> (i32, i32) {
        (seconds_of(self.start_time), seconds_of(self.end_time))
    }

    pub(crate) fn duration_seconds(&self) -> i32 {
        self.estimated_duration_minutes.saturating_mul(60)
    }

    /// Window length in minutes; never negative.
    pub fn window_minutes(&self) -> i32 {
        let (start, end) = self.window_seconds();
        ((end - start) / 60).max(0)
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.end_time <= self.start_time {
            return Err(PlannerError::invalid_task(
                &self.id,
                format!(
                    "end time {} is not after start time {}",
                    self.end_time, self.start_time
                ),
            ));
        }
        if self.estimated_duration_minutes <= 0 {
            return Err(PlannerError::invalid_task(
                &self.id,
                format!(
                    "estimated duration must be positive, got {}",
                    self.estimated_duration_minutes
                ),
            ));
        }
        if self.estimated_duration_minutes > MAX_TASK_MINUTES {
            return Err(PlannerError::invalid_task(
                &self.id,
                format!(
                    "estimated duration of {} minutes is longer than a day",
                    self.estimated_duration_minutes
                ),
            ));
        }
        if !self.location.is_valid() {
            return Err(PlannerError::invalid_task(
                &self.id,
                "location coordinate out of range",
            ));
        }
        Ok(())
    }
}

/// Longest accepted task duration.
pub const MAX_TASK_MINUTES: i32 = 24 * 60;

pub(crate) fn seconds_of(time: NaiveTime) -> i32 {
    time.num_seconds_from_midnight() as i32
}

/// Converts seconds from midnight back to a time of day, clamped to the day.
pub(crate) fn time_at(seconds: i32) -> NaiveTime {
    let clamped = seconds.clamp(0, 86_399) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(clamped, 0).unwrap_or_default()
}
