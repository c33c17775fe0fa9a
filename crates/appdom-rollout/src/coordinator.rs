//! The rollout decision engine.
//!
//! The coordinator never talks to processes itself; the router executes a
//! set at a time and feeds per-server outcomes back in. The coordinator
//! decides whether each group tolerated its failures, whether execution
//! continues to the next set, and which groups roll back.

use std::collections::BTreeMap;

use crate::plan::{RolloutGroup, RolloutPlan, RolloutSet};

/// Result of the operation on one server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerOutcome {
    /// Host the server runs on.
    pub host: String,
    /// Server name.
    pub server: String,
    /// Whether the operation succeeded on that server.
    pub success: bool,
}

impl ServerOutcome {
    /// Creates a per-server outcome.
    pub fn new(host: &str, server: &str, success: bool) -> Self {
        Self {
            host: host.to_string(),
            server: server.to_string(),
            success,
        }
    }
}

/// Verdict for one server group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupResult {
    /// Server group name.
    pub group: String,
    /// Per-server outcomes observed.
    pub servers: Vec<ServerOutcome>,
    /// Number of failing servers.
    pub failed_count: usize,
    /// True when the failures stayed within the group tolerance.
    pub tolerated: bool,
    /// True when this group's changes must be compensated.
    pub rolled_back: bool,
}

/// Overall decision for a plan execution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlanOutcome {
    /// True when every executed group tolerated its failures.
    pub success: bool,
    /// Per-group verdicts in execution order.
    pub groups: Vec<GroupResult>,
    /// Index of the in-series set execution halted after, when it did.
    pub halted_at_set: Option<usize>,
}

impl PlanOutcome {
    /// Returns the names of groups that must roll back.
    pub fn rollback_groups(&self) -> Vec<String> {
        self.groups
            .iter()
            .filter(|g| g.rolled_back)
            .map(|g| g.group.clone())
            .collect()
    }
}

/// Stateless rollout decision logic.
pub struct RolloutCoordinator;

impl RolloutCoordinator {
    /// Judges one group's outcomes against its tolerance: the group holds
    /// iff the failing-server count is within `max_failed_servers`, or
    /// within the failure percentage when one is configured.
    pub fn judge_group(group: &RolloutGroup, servers: &[ServerOutcome]) -> GroupResult {
        let failed_count = servers.iter().filter(|s| !s.success).count();
        let tolerated = match group.rollback_failure_percentage {
            Some(pct) => {
                if servers.is_empty() {
                    true
                } else {
                    failed_count * 100 <= pct as usize * servers.len()
                }
            }
            None => failed_count <= group.max_failed_servers as usize,
        };
        GroupResult {
            group: group.name.clone(),
            servers: servers.to_vec(),
            failed_count,
            tolerated,
            rolled_back: false,
        }
    }

    /// Evaluates a full plan against per-group server outcomes.
    ///
    /// `results` holds outcomes for every group that actually ran; sets
    /// after the first intolerable set must not have run and their groups
    /// are absent. The decision:
    /// - every executed group tolerated ⇒ success;
    /// - an intolerable group with `rollback_across_groups` ⇒ every
    ///   executed group rolls back;
    /// - an intolerable group without it ⇒ only intolerable groups roll
    ///   back, committed groups stay committed.
    pub fn evaluate(
        plan: &RolloutPlan,
        results: &BTreeMap<String, Vec<ServerOutcome>>,
    ) -> PlanOutcome {
        let mut groups: Vec<GroupResult> = Vec::new();
        let mut halted_at_set = None;

        'sets: for (set_index, set) in plan.in_series.iter().enumerate() {
            let mut set_failed = false;
            for group in set.groups() {
                let Some(servers) = results.get(&group.name) else {
                    // The set never ran.
                    halted_at_set = Some(set_index.saturating_sub(1));
                    break 'sets;
                };
                let verdict = Self::judge_group(group, servers);
                set_failed |= !verdict.tolerated;
                groups.push(verdict);
            }
            if set_failed {
                halted_at_set = Some(set_index);
                break;
            }
        }

        let success = groups.iter().all(|g| g.tolerated);
        if !success {
            if plan.rollback_across_groups {
                for group in &mut groups {
                    group.rolled_back = true;
                }
            } else {
                for group in &mut groups {
                    group.rolled_back = !group.tolerated;
                }
            }
        }
        if !success {
            tracing::debug!(
                rollback = ?groups.iter().filter(|g| g.rolled_back).map(|g| g.group.as_str()).collect::<Vec<_>>(),
                "rollout failed"
            );
        }

        PlanOutcome {
            success,
            groups,
            halted_at_set: if success { None } else { halted_at_set },
        }
    }

    /// Returns the sets whose groups should execute, given which set (if
    /// any) already failed. Used by the router to short-circuit in-series
    /// execution.
    pub fn continue_after(plan: &RolloutPlan, set_index: usize, set_tolerated: bool) -> bool {
        set_tolerated && set_index + 1 < plan.in_series.len()
    }
}

/// Judges one in-series set: tolerated iff every group in it tolerated.
pub fn judge_set(set: &RolloutSet, results: &BTreeMap<String, Vec<ServerOutcome>>) -> bool {
    set.groups().iter().all(|group| {
        results
            .get(&group.name)
            .map(|servers| RolloutCoordinator::judge_group(group, servers).tolerated)
            .unwrap_or(false)
    })
}
