#![warn(missing_docs)]

//! AppDom rollout subsystem: rollout plans, per-group failure tolerance, rollback decisions

pub mod coordinator;
pub mod plan;

pub use coordinator::{judge_set, GroupResult, PlanOutcome, RolloutCoordinator, ServerOutcome};
pub use plan::{PlanError, RolloutGroup, RolloutPlan, RolloutSet};
