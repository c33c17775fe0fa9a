//! Rollout plan structure and wire form.
//!
//! A plan orders server groups into sets executed in series; each set holds
//! one group or several groups executed concurrently. Wire form (carried in
//! the `rollout-plan` operation header):
//!
//! ```text
//! {
//!   "in-series": [
//!     {"server-group": {"main": {"max-failed-servers": 1}}},
//!     {"concurrent-groups": {"a": {}, "b": {"rollback-across-groups" ...}}}
//!   ],
//!   "rollback-across-groups": true
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use appdom_model::ModelValue;

/// Errors raised while parsing or validating a rollout plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("rollout plan must be an object with an in-series list")]
    MalformedPlan,

    #[error("malformed in-series entry: {0}")]
    MalformedEntry(String),

    #[error("server group {0} appears more than once in the plan")]
    DuplicateGroup(String),

    #[error("rollout plan names no server groups")]
    EmptyPlan,
}

/// One server group entry in a rollout plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutGroup {
    /// Server group name.
    pub name: String,
    /// Number of failing servers the group tolerates before the group
    /// itself counts as failed.
    pub max_failed_servers: u32,
    /// Alternative percentage-based tolerance, when set.
    pub rollback_failure_percentage: Option<u8>,
}

impl RolloutGroup {
    /// Creates a zero-tolerance entry for `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            max_failed_servers: 0,
            rollback_failure_percentage: None,
        }
    }

    /// Sets the failed-server tolerance.
    pub fn with_max_failed(mut self, max: u32) -> Self {
        self.max_failed_servers = max;
        self
    }

    /// Sets the percentage tolerance.
    pub fn with_failure_percentage(mut self, pct: u8) -> Self {
        self.rollback_failure_percentage = Some(pct);
        self
    }

    fn from_value(name: &str, value: &ModelValue) -> Self {
        Self {
            name: name.to_string(),
            max_failed_servers: value
                .get("max-failed-servers")
                .and_then(ModelValue::as_i64)
                .unwrap_or(0) as u32,
            rollback_failure_percentage: value
                .get("rolling-to-servers-failure-percentage")
                .and_then(ModelValue::as_i64)
                .map(|p| p as u8),
        }
    }

    fn to_value(&self) -> ModelValue {
        let mut obj = ModelValue::object();
        if self.max_failed_servers > 0 {
            obj.set("max-failed-servers", ModelValue::Int(self.max_failed_servers as i64))
                .unwrap();
        }
        if let Some(pct) = self.rollback_failure_percentage {
            obj.set("rolling-to-servers-failure-percentage", ModelValue::Int(pct as i64))
                .unwrap();
        }
        obj
    }
}

/// One in-series step: a single group or a concurrent set of groups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RolloutSet {
    /// One server group.
    Single(RolloutGroup),
    /// Server groups rolled out concurrently.
    Concurrent(Vec<RolloutGroup>),
}

impl RolloutSet {
    /// Returns the groups of this set in plan order.
    pub fn groups(&self) -> Vec<&RolloutGroup> {
        match self {
            RolloutSet::Single(g) => vec![g],
            RolloutSet::Concurrent(gs) => gs.iter().collect(),
        }
    }
}

/// A rollout plan: sets executed in series, with a cross-group rollback
/// policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutPlan {
    /// Sets in execution order.
    pub in_series: Vec<RolloutSet>,
    /// When false, groups already committed stay committed even if a later
    /// group fails.
    pub rollback_across_groups: bool,
}

impl RolloutPlan {
    /// Creates a plan from ordered sets.
    pub fn new(in_series: Vec<RolloutSet>) -> Self {
        Self {
            in_series,
            rollback_across_groups: true,
        }
    }

    /// Disables cross-group rollback.
    pub fn without_cross_group_rollback(mut self) -> Self {
        self.rollback_across_groups = false;
        self
    }

    /// The implicit plan used when the caller supplies none: every affected
    /// group concurrently, zero failure tolerance.
    pub fn implicit(groups: &[String]) -> Self {
        Self::new(vec![RolloutSet::Concurrent(
            groups.iter().map(|g| RolloutGroup::new(g)).collect(),
        )])
    }

    /// Returns every group of the plan in execution order.
    pub fn all_groups(&self) -> Vec<&RolloutGroup> {
        self.in_series.iter().flat_map(RolloutSet::groups).collect()
    }

    /// Validates group uniqueness and non-emptiness.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut seen = BTreeSet::new();
        let groups = self.all_groups();
        if groups.is_empty() {
            return Err(PlanError::EmptyPlan);
        }
        for group in groups {
            if !seen.insert(group.name.clone()) {
                return Err(PlanError::DuplicateGroup(group.name.clone()));
            }
        }
        Ok(())
    }

    /// Parses the wire form carried in the `rollout-plan` header.
    pub fn from_value(value: &ModelValue) -> Result<Self, PlanError> {
        let series = value
            .get("in-series")
            .and_then(ModelValue::as_list)
            .ok_or(PlanError::MalformedPlan)?;
        let mut in_series = Vec::new();
        for entry in series {
            let obj = entry
                .as_object()
                .ok_or_else(|| PlanError::MalformedEntry(entry.to_string()))?;
            if let Some(single) = obj.get("server-group") {
                let map = single
                    .as_object()
                    .filter(|m| m.len() == 1)
                    .ok_or_else(|| PlanError::MalformedEntry(entry.to_string()))?;
                let (name, config) = map.iter().next().unwrap();
                in_series.push(RolloutSet::Single(RolloutGroup::from_value(name, config)));
            } else if let Some(concurrent) = obj.get("concurrent-groups") {
                let map = concurrent
                    .as_object()
                    .ok_or_else(|| PlanError::MalformedEntry(entry.to_string()))?;
                let groups = map
                    .iter()
                    .map(|(name, config)| RolloutGroup::from_value(name, config))
                    .collect();
                in_series.push(RolloutSet::Concurrent(groups));
            } else {
                return Err(PlanError::MalformedEntry(entry.to_string()));
            }
        }
        let plan = Self {
            in_series,
            rollback_across_groups: value
                .get("rollback-across-groups")
                .and_then(ModelValue::as_bool)
                .unwrap_or(true),
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Renders the wire form of this plan.
    pub fn to_value(&self) -> ModelValue {
        let mut series = ModelValue::list();
        for set in &self.in_series {
            let mut entry = ModelValue::object();
            match set {
                RolloutSet::Single(group) => {
                    let mut node = ModelValue::object();
                    node.set(&group.name, group.to_value()).unwrap();
                    entry.set("server-group", node).unwrap();
                }
                RolloutSet::Concurrent(groups) => {
                    let mut node = ModelValue::object();
                    for group in groups {
                        node.set(&group.name, group.to_value()).unwrap();
                    }
                    entry.set("concurrent-groups", node).unwrap();
                }
            }
            series.push(entry).unwrap();
        }
        let mut obj = ModelValue::object();
        obj.set("in-series", series).unwrap();
        if !self.rollback_across_groups {
            obj.set("rollback-across-groups", false.into()).unwrap();
        }
        obj
    }
}
