//! Run and cleanup reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ResourceKind;
use crate::error::LifecycleError;
use crate::planner::{NodeError, NodeState, Plan};

/// Stage of a run in which the first failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    /// Adapter construction or session establishment.
    Connect,
    /// Forward provisioning.
    Provision,
    /// Post-provision verification.
    Verify,
    /// Applying updates.
    Update,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connect => "connect",
            Self::Provision => "provision",
            Self::Verify => "verify",
            Self::Update => "update",
        };
        write!(f, "{s}")
    }
}

/// The failure that stopped forward progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    /// Stage in which it happened.
    pub stage: RunStage,
    /// Node involved, if any.
    pub node: Option<String>,
    /// The error.
    pub error: NodeError,
}

impl RunFailure {
    pub(crate) fn new(stage: RunStage, node: Option<String>, error: &LifecycleError) -> Self {
        Self {
            stage,
            node,
            error: NodeError::from(error),
        }
    }
}

/// A delete that failed during cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    /// Node name.
    pub name: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// The error.
    pub error: NodeError,
}

/// How a cleanup pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// Nothing had been created, so nothing was deleted.
    NothingToClean,
    /// Every node that needed deleting is gone.
    Clean,
    /// At least one delete failed.
    Failed,
}

/// Result of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Nodes that needed a delete when cleanup started.
    pub attempted: usize,
    /// Nodes deleted by an explicit call.
    pub deleted: Vec<String>,
    /// Nodes that were already gone.
    pub already_deleted: Vec<String>,
    /// Nodes removed by an ancestor's cascading delete.
    pub cascaded: Vec<String>,
    /// Deletes that failed.
    pub errors: Vec<CleanupFailure>,
}

impl CleanupReport {
    /// Returns true if nothing needed deleting.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.attempted == 0
    }

    /// Returns true if no delete failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Nodes confirmed gone, by any route.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.deleted.len() + self.already_deleted.len() + self.cascaded.len()
    }

    /// Classifies the pass.
    #[must_use]
    pub fn outcome(&self) -> CleanupOutcome {
        if !self.errors.is_empty() {
            CleanupOutcome::Failed
        } else if self.is_noop() {
            CleanupOutcome::NothingToClean
        } else {
            CleanupOutcome::Clean
        }
    }
}

/// Final view of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    /// Node name.
    pub name: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Final state.
    pub state: NodeState,
    /// Whether the node ever reached `Created`.
    pub was_created: bool,
    /// Updates that changed the node.
    pub updates_applied: u32,
    /// Last error recorded for the node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<NodeError>,
}

/// Result of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: String,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub finished_at: DateTime<Utc>,
    /// First failure, if forward progress stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
    /// Per-node summaries in creation order.
    pub nodes: Vec<NodeSummary>,
    /// Cleanup outcome.
    pub cleanup: CleanupReport,
    /// Nodes verification could not find.
    pub missing: Vec<String>,
}

impl RunReport {
    /// Report for a run that failed before any provider call was made.
    ///
    /// Nothing can have been created, so the cleanup pass is empty.
    #[must_use]
    pub fn unstarted(plan: &Plan, stage: RunStage, error: &LifecycleError) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: now,
            finished_at: now,
            failure: Some(RunFailure::new(stage, None, error)),
            nodes: Self::summarize(plan),
            cleanup: CleanupReport::default(),
            missing: Vec::new(),
        }
    }

    /// Builds summaries for every node in the plan.
    pub(crate) fn summarize(plan: &Plan) -> Vec<NodeSummary> {
        plan.nodes()
            .iter()
            .map(|node| NodeSummary {
                name: node.name.clone(),
                kind: node.kind,
                state: node.state(),
                was_created: node.was_created(),
                updates_applied: node.updates_applied(),
                error: node.last_error().cloned(),
            })
            .collect()
    }

    /// Returns true if every node was created and then deleted.
    #[must_use]
    pub fn success(&self) -> bool {
        self.failure.is_none()
            && self.missing.is_empty()
            && self.cleanup.is_clean()
            && self
                .nodes
                .iter()
                .all(|n| n.was_created && n.state == NodeState::Deleted)
    }

    /// Nodes left behind after cleanup.
    #[must_use]
    pub fn leaked(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| {
                n.state == NodeState::Created
                    || self.cleanup.errors.iter().any(|e| e.name == n.name)
            })
            .map(|n| n.name.as_str())
            .collect()
    }

    /// Nodes that never reached `Created`.
    #[must_use]
    pub fn never_created(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| !n.was_created)
            .map(|n| n.name.as_str())
            .collect()
    }

    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn failure(name: &str) -> CleanupFailure {
        CleanupFailure {
            name: name.to_string(),
            kind: ResourceKind::Queue,
            error: NodeError {
                kind: ErrorKind::TransientProvider,
                message: String::from("timeout"),
            },
        }
    }

    #[test]
    fn test_cleanup_outcome_distinguishes_noop_from_failure() {
        let noop = CleanupReport::default();
        assert_eq!(noop.outcome(), CleanupOutcome::NothingToClean);

        let clean = CleanupReport {
            attempted: 1,
            deleted: vec![String::from("rg")],
            ..CleanupReport::default()
        };
        assert_eq!(clean.outcome(), CleanupOutcome::Clean);

        let failed = CleanupReport {
            attempted: 1,
            errors: vec![failure("rg")],
            ..CleanupReport::default()
        };
        assert_eq!(failed.outcome(), CleanupOutcome::Failed);
    }

    #[test]
    fn test_removed_counts_every_route() {
        let report = CleanupReport {
            attempted: 3,
            deleted: vec![String::from("rg")],
            already_deleted: vec![String::from("rule")],
            cascaded: vec![String::from("queue-a")],
            errors: vec![],
        };
        assert_eq!(report.removed(), 3);
        assert!(report.is_clean());
    }

    #[test]
    fn test_unstarted_run_is_a_failed_noop() {
        let plan = Plan::new(vec![crate::planner::ResourceNode::new(
            "rg",
            ResourceKind::ResourceGroup,
            None,
            crate::config::OptionMap::new(),
        )])
        .unwrap();
        let error = LifecycleError::internal("no credentials");

        let report = RunReport::unstarted(&plan, RunStage::Connect, &error);
        assert!(!report.success());
        assert_eq!(report.cleanup.outcome(), CleanupOutcome::NothingToClean);
        assert_eq!(report.never_created(), ["rg"]);
        assert!(report.leaked().is_empty());
    }
}
