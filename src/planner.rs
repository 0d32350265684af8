//! Caller-facing surface: moves, optimization runs and suggestions over one
//! planning day.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info};

use crate::error::PlannerError;
use crate::model::{seconds_of, time_at, EmployeeId, TaskId};
use crate::orchestrator::{ApplyOutcome, OptimizationRun, OptimizationSuggestion, Orchestrator, SuggestionId};
use crate::schedule::{DayPlan, ScheduleIndex, ScheduleSnapshot};
use crate::settings::OptimizationSettings;
use crate::traits::DistanceProvider;
use crate::validator::{validate_move, Decision, RejectKind};

/// A validated, not yet committed move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveProposal {
    pub task_id: TaskId,
    pub from: Option<EmployeeId>,
    pub to: EmployeeId,
    pub new_start: NaiveTime,
    pub decision: Decision,
    /// Snapshot version the decision was made against.
    pub version: u64,
}

pub struct Planner<P> {
    index: ScheduleIndex,
    orchestrator: Orchestrator,
    provider: P,
}

impl<P: DistanceProvider> Planner<P> {
    pub fn new(plan: DayPlan, provider: P) -> Result<Self, PlannerError> {
        Ok(Self {
            index: ScheduleIndex::new(plan)?,
            orchestrator: Orchestrator::new(),
            provider,
        })
    }

    pub fn snapshot(&self) -> Arc<ScheduleSnapshot> {
        self.index.snapshot()
    }

    pub fn index(&self) -> &ScheduleIndex {
        &self.index
    }

    /// Replaces the day wholesale. Pending suggestions become stale.
    pub fn replace_plan(&self, plan: DayPlan) -> Result<Arc<ScheduleSnapshot>, PlannerError> {
        self.index.replace(plan)
    }

    /// Validates moving a task to `to` at `new_start` without committing.
    ///
    /// The source is the target itself when it already holds the task,
    /// otherwise the task's only assignee, if it has exactly one.
    pub fn propose_move(
        &self,
        task_id: &TaskId,
        to: &EmployeeId,
        new_start: NaiveTime,
    ) -> Result<MoveProposal, PlannerError> {
        let snapshot = self.index.snapshot();
        propose(&snapshot, task_id, to, new_start)
    }

    /// Commits a proposal. Warnings must be confirmed; a proposal made
    /// against an older snapshot is validated again first.
    pub fn commit_move(
        &self,
        proposal: &MoveProposal,
        confirm_warnings: bool,
    ) -> Result<Arc<ScheduleSnapshot>, PlannerError> {
        let (_, snapshot) = self.index.update(|plan| {
            // Writers are serialized, so this is the snapshot `plan` was cloned from.
            let current = self.index.snapshot();
            let fresh = if current.version() == proposal.version {
                proposal.clone()
            } else {
                debug!(task = %proposal.task_id, "schedule changed since proposal, revalidating");
                propose(&current, &proposal.task_id, &proposal.to, proposal.new_start)?
            };

            match fresh.decision {
                Decision::Rejected(RejectKind::MissingSkills { missing }) => {
                    return Err(PlannerError::MissingSkills {
                        employee_id: proposal.to.clone(),
                        missing,
                    });
                }
                Decision::Rejected(RejectKind::InactiveEmployee) => {
                    return Err(PlannerError::InactiveEmployee(proposal.to.clone()));
                }
                Decision::AllowedWithWarning(_) if !confirm_warnings => {
                    return Err(PlannerError::ConfirmationRequired(proposal.task_id.clone()));
                }
                _ => {}
            }

            let task = plan.task_mut(&proposal.task_id)?;
            if let Some(from) = &fresh.from {
                task.assigned_employees.remove(from);
            }
            task.assigned_employees.insert(proposal.to.clone());

            let (start, end) = task.window_seconds();
            task.start_time = proposal.new_start;
            task.end_time = time_at(seconds_of(proposal.new_start) + end - start);
            Ok(())
        })?;

        info!(
            task = %proposal.task_id,
            to = %proposal.to,
            start = %proposal.new_start,
            version = snapshot.version(),
            "move committed"
        );
        Ok(snapshot)
    }

    pub fn run_optimization(
        &self,
        employee_ids: Option<&[EmployeeId]>,
        date: NaiveDate,
        settings: &OptimizationSettings,
    ) -> Result<OptimizationRun, PlannerError> {
        let snapshot = self.index.snapshot();
        self.orchestrator
            .run(&snapshot, date, employee_ids, &self.provider, settings)
    }

    pub fn apply_suggestion(&self, id: SuggestionId) -> Result<ApplyOutcome, PlannerError> {
        self.orchestrator.apply(&self.index, id)
    }

    pub fn reject_suggestion(&self, id: SuggestionId) -> Result<OptimizationSuggestion, PlannerError> {
        self.orchestrator.reject(id)
    }

    pub fn cancel_optimization(&self) {
        self.orchestrator.cancel();
    }

    pub fn pending_suggestions(&self) -> Vec<OptimizationSuggestion> {
        self.orchestrator.pending()
    }
}

fn propose(
    snapshot: &ScheduleSnapshot,
    task_id: &TaskId,
    to: &EmployeeId,
    new_start: NaiveTime,
) -> Result<MoveProposal, PlannerError> {
    let task = snapshot
        .task(task_id)
        .ok_or_else(|| PlannerError::UnknownTask(task_id.clone()))?;
    let target = snapshot
        .employee(to)
        .ok_or_else(|| PlannerError::UnknownEmployee(to.clone()))?;

    let from = if task.is_assigned_to(to) {
        Some(to.clone())
    } else if task.assigned_employees.len() == 1 {
        task.assigned_employees.iter().next().cloned()
    } else {
        None
    };

    let decision = validate_move(snapshot, task, from.as_ref(), target, new_start)?;
    Ok(MoveProposal {
        task_id: task_id.clone(),
        from,
        to: to.clone(),
        new_start,
        decision,
        version: snapshot.version(),
    })
}
