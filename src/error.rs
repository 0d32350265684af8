//! Error types for the planner core.

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{EmployeeId, TaskId};
use crate::orchestrator::SuggestionId;

/// Errors surfaced by planner operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    #[error("task {task_id} is invalid: {reason}")]
    InvalidTask { task_id: TaskId, reason: String },

    #[error("employee {employee_id} is invalid: {reason}")]
    InvalidEmployee { employee_id: EmployeeId, reason: String },

    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    #[error("unknown employee {0}")]
    UnknownEmployee(EmployeeId),

    #[error("employee {employee_id} lacks skills {missing:?}")]
    MissingSkills {
        employee_id: EmployeeId,
        missing: Vec<String>,
    },

    #[error("task {task_id} cannot be routed for {employee_id}: missing skills {missing:?}")]
    UnassignableTask {
        task_id: TaskId,
        employee_id: EmployeeId,
        missing: Vec<String>,
    },

    #[error("employee {0} is not active")]
    InactiveEmployee(EmployeeId),

    #[error("move of task {0} has warnings that were not confirmed")]
    ConfirmationRequired(TaskId),

    #[error("suggestion {0} no longer matches the schedule")]
    StaleSuggestion(SuggestionId),

    #[error("unknown suggestion {0}")]
    UnknownSuggestion(SuggestionId),

    #[error("requested date {requested} but the schedule holds {planned}")]
    DateMismatch {
        requested: NaiveDate,
        planned: NaiveDate,
    },

    #[error("optimization was cancelled")]
    Cancelled,
}

impl PlannerError {
    pub(crate) fn invalid_task(task_id: &TaskId, reason: impl Into<String>) -> Self {
        PlannerError::InvalidTask {
            task_id: task_id.clone(),
            reason: reason.into(),
        }
    }
}

/// Failure talking to a distance provider.
///
/// Never surfaced to callers of the planner: the travel matrix falls back
/// to haversine estimates when a provider returns one of these.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned a malformed response: {0}")]
    Malformed(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}
