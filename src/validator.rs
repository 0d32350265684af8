//! Assignment validation.
//!
//! [`validate_move`] is a pure decision over a schedule snapshot. Hard
//! constraints reject a move; soft constraints only attach warnings, and the
//! caller decides whether to confirm them.

use chrono::NaiveTime;
use serde::Serialize;

use crate::error::PlannerError;
use crate::model::{seconds_of, Employee, EmployeeId, Task, TaskId, TaskStatus};
use crate::schedule::{ScheduleSnapshot, Workload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarningKind {
    TimeConflict,
    Overload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Warning {
    /// The target employee already has these tasks in the new interval.
    TimeConflict { conflicting: Vec<TaskId> },
    /// The target employee's workload after the move.
    Overload { percent_of_workday: f64 },
}

impl Warning {
    pub fn kind(&self) -> WarningKind {
        match self {
            Warning::TimeConflict { .. } => WarningKind::TimeConflict,
            Warning::Overload { .. } => WarningKind::Overload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RejectKind {
    MissingSkills { missing: Vec<String> },
    InactiveEmployee,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Decision {
    Allowed,
    AllowedWithWarning(Vec<Warning>),
    Rejected(RejectKind),
}

impl Decision {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Decision::Rejected(_))
    }

    pub fn warnings(&self) -> &[Warning] {
        match self {
            Decision::AllowedWithWarning(warnings) => warnings,
            _ => &[],
        }
    }

    pub fn has_warning(&self, kind: WarningKind) -> bool {
        self.warnings().iter().any(|warning| warning.kind() == kind)
    }
}

/// Decides whether `task` may move from `from` to `to`, starting at `new_start`.
///
/// Rules, in order: missing skills reject; an inactive target rejects; an
/// overlapping task on the target warns; a resulting overload warns. The
/// moved task keeps its window length.
pub fn validate_move(
    snapshot: &ScheduleSnapshot,
    task: &Task,
    from: Option<&EmployeeId>,
    to: &Employee,
    new_start: NaiveTime,
) -> Result<Decision, PlannerError> {
    task.validate()?;

    let missing = task.missing_skills(to);
    if !missing.is_empty() {
        return Ok(Decision::Rejected(RejectKind::MissingSkills { missing }));
    }
    if !to.active {
        return Ok(Decision::Rejected(RejectKind::InactiveEmployee));
    }

    let current = snapshot.workload(&to.id)?;
    let mut warnings = Vec::new();

    let grid = snapshot.grid();
    let same_place = from == Some(&to.id) && grid.slot_of(new_start) == grid.slot_of(task.start_time);
    if !same_place {
        let start = seconds_of(new_start);
        let end = start + task.window_minutes() * 60;
        let conflicting: Vec<TaskId> = snapshot
            .overlapping(&to.id, start, end, &task.id)
            .into_iter()
            .map(|other| other.id.clone())
            .collect();
        if !conflicting.is_empty() {
            warnings.push(Warning::TimeConflict { conflicting });
        }
    }

    let already_counted = task.is_assigned_to(&to.id) && task.status != TaskStatus::Cancelled;
    let added = if already_counted {
        0
    } else {
        task.estimated_duration_minutes
    };
    let after = Workload::compute(current.total_minutes.saturating_add(added), to.workday_minutes());
    if after.is_overloaded {
        warnings.push(Warning::Overload {
            percent_of_workday: after.percent_of_workday,
        });
    }

    if warnings.is_empty() {
        Ok(Decision::Allowed)
    } else {
        Ok(Decision::AllowedWithWarning(warnings))
    }
}
