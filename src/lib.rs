//! crew-planner core
//!
//! Day-level workforce scheduling: a slot-indexed schedule, move validation,
//! per-employee route optimization with time windows, and an orchestrator
//! holding optimization suggestions until they are applied or rejected.

pub mod error;
pub mod model;
pub mod traits;
pub mod haversine;
pub mod osrm;
pub mod matrix;
pub mod schedule;
pub mod settings;
pub mod validator;
pub mod route;
pub mod optimizer;
pub mod orchestrator;
pub mod planner;

pub use error::{PlannerError, ProviderError};
pub use model::{Coordinate, Employee, EmployeeId, Priority, Task, TaskId, TaskStatus, WorkingHours};
pub use orchestrator::{OptimizationSuggestion, Orchestrator, SuggestionId};
pub use planner::{MoveProposal, Planner};
pub use schedule::{DayPlan, ScheduleIndex, ScheduleSnapshot};
pub use settings::OptimizationSettings;
pub use traits::{DistanceProvider, TravelEstimate};
pub use validator::{validate_move, Decision};
