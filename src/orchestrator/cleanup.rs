//! Best-effort teardown of a plan.
//!
//! Cleanup never stops early: each failed delete is recorded and the pass
//! moves on to the next node. A resource that is already gone counts as
//! deleted.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::CleanupStrategy;
use crate::error::ErrorKind;
use crate::planner::{NodeError, Plan};

use super::engine::Orchestrator;
use super::events::LifecycleEvent;
use super::report::{CleanupFailure, CleanupReport};

impl Orchestrator<'_> {
    /// Deletes every node that was created, or may have been.
    ///
    /// With [`CleanupStrategy::Reverse`] nodes are deleted children first.
    /// With [`CleanupStrategy::Cascade`] parents go first and descendants of
    /// a successfully deleted cascading parent are not deleted explicitly.
    /// Cancellation is not checked here.
    pub async fn cleanup(&self, plan: &mut Plan) -> CleanupReport {
        let pending = plan.needing_cleanup().len();
        let mut report = CleanupReport {
            attempted: pending,
            ..CleanupReport::default()
        };

        info!("Cleaning up {pending} resources ({} strategy)", self.strategy);
        self.sink.emit(LifecycleEvent::CleanupStarted { pending });

        match self.strategy {
            CleanupStrategy::Reverse => {
                for position in (0..plan.len()).rev() {
                    self.delete_at(plan, position, &mut report).await;
                }
            }
            CleanupStrategy::Cascade => self.cleanup_cascading(plan, &mut report).await,
        }

        if report.is_noop() {
            debug!("Nothing to clean up");
        } else if report.is_clean() {
            info!("Cleanup removed {} resources", report.removed());
        } else {
            warn!(
                "Cleanup left {} resources behind: {}",
                report.errors.len(),
                report
                    .errors
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        self.sink.emit(LifecycleEvent::CleanupFinished {
            deleted: report.removed(),
            failed: report.errors.len(),
        });

        report
    }

    async fn cleanup_cascading(&self, plan: &mut Plan, report: &mut CleanupReport) {
        // Cascading nodes confirmed gone; their descendants went with them.
        let mut removed: HashSet<String> = HashSet::new();

        for position in 0..plan.len() {
            let node = &plan.nodes()[position];
            if !node.needs_cleanup() {
                continue;
            }

            let ancestor = plan
                .ancestors(&node.name)
                .into_iter()
                .find(|a| removed.contains(&a.name))
                .map(|a| a.name.clone());

            if let Some(ancestor) = ancestor {
                let (name, kind) = (node.name.clone(), node.kind);
                debug!("{kind} {name} went with {ancestor}");
                plan.node_at_mut(position).mark_deleted();
                self.sink.emit(LifecycleEvent::NodeCascadeDeleted {
                    name: name.clone(),
                    kind,
                    ancestor,
                });
                report.cascaded.push(name);
                continue;
            }

            let cascades = node.kind.cascades_delete();
            let name = node.name.clone();
            if self.delete_at(plan, position, report).await && cascades {
                removed.insert(name);
            }
        }
    }

    /// Deletes the node at `position` if it needs it.
    ///
    /// Returns true if the resource is gone afterwards.
    async fn delete_at(&self, plan: &mut Plan, position: usize, report: &mut CleanupReport) -> bool {
        let node = &plan.nodes()[position];
        if !node.needs_cleanup() {
            return false;
        }
        let (name, kind) = (node.name.clone(), node.kind);

        info!("Deleting {kind} {name}");
        match self.provider.delete(kind, &name).await {
            Ok(()) => {
                plan.node_at_mut(position).mark_deleted();
                self.sink.emit(LifecycleEvent::NodeDeleted {
                    name: name.clone(),
                    kind,
                });
                report.deleted.push(name);
                true
            }
            Err(e) if e.kind() == ErrorKind::AlreadyDeleted => {
                debug!("{kind} {name} was already deleted");
                plan.node_at_mut(position).mark_deleted();
                self.sink.emit(LifecycleEvent::NodeAlreadyDeleted {
                    name: name.clone(),
                    kind,
                });
                report.already_deleted.push(name);
                true
            }
            Err(e) => {
                warn!("Failed to delete {kind} {name}: {e}");
                let error = NodeError::from(&e);
                plan.node_at_mut(position).record_error(error.clone());
                self.sink.emit(LifecycleEvent::NodeDeleteFailed {
                    name: name.clone(),
                    kind,
                    error_kind: error.kind,
                    message: error.message.clone(),
                });
                report.errors.push(CleanupFailure { name, kind, error });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{CleanupStrategy, FaultConfig, FaultError, FaultOperation, OptionMap, ResourceKind};
    use crate::orchestrator::events::{ChannelSink, LifecycleEvent};
    use crate::orchestrator::fixtures::{drain, scenario_plan, scenario_plan_with_rule};
    use crate::orchestrator::report::CleanupOutcome;
    use crate::orchestrator::Orchestrator;
    use crate::planner::{NodeState, Plan, ResourceNode};
    use crate::provider::{CallKind, MemoryProvider, ProviderAdapter};
    use tokio_test::assert_ok;

    async fn deletes(provider: &MemoryProvider) -> Vec<String> {
        provider
            .calls()
            .await
            .into_iter()
            .filter(|c| c.operation == CallKind::Delete)
            .map(|c| c.name)
            .collect()
    }

    #[tokio::test]
    async fn test_cleanup_of_untouched_plan_is_noop() {
        let provider = MemoryProvider::new();
        let (sink, mut events) = ChannelSink::new();
        let mut plan = scenario_plan();

        let report = Orchestrator::new(&provider, &sink).cleanup(&mut plan).await;

        assert_eq!(report.outcome(), CleanupOutcome::NothingToClean);
        assert!(deletes(&provider).await.is_empty());
        let events = drain(&mut events);
        assert_eq!(events.first(), Some(&LifecycleEvent::CleanupStarted { pending: 0 }));
    }

    #[tokio::test]
    async fn test_reverse_cleanup_deletes_children_first() {
        let provider = MemoryProvider::new();
        let (sink, _events) = ChannelSink::new();
        let orchestrator = Orchestrator::new(&provider, &sink);
        let mut plan = scenario_plan_with_rule();
        assert_ok!(orchestrator.provision(&mut plan).await);

        let report = orchestrator.cleanup(&mut plan).await;

        assert_eq!(report.outcome(), CleanupOutcome::Clean);
        assert_eq!(
            deletes(&provider).await,
            ["queue-a-sender", "queue-b", "queue-a", "namespace", "group"]
        );
        assert_eq!(plan.count_in(NodeState::Deleted), plan.len());
    }

    #[tokio::test]
    async fn test_already_removed_rule_is_success() {
        let provider = MemoryProvider::new();
        let (sink, mut events) = ChannelSink::new();
        let orchestrator = Orchestrator::new(&provider, &sink);
        let mut plan = scenario_plan_with_rule();
        assert_ok!(orchestrator.provision(&mut plan).await);

        provider.evict("queue-a-sender").await;
        let report = orchestrator.cleanup(&mut plan).await;

        assert!(report.is_clean());
        assert_eq!(report.already_deleted, ["queue-a-sender"]);
        assert_eq!(plan.node("queue-a-sender").unwrap().state(), NodeState::Deleted);
        assert!(
            drain(&mut events)
                .iter()
                .any(|e| matches!(e, LifecycleEvent::NodeAlreadyDeleted { name, .. } if name == "queue-a-sender"))
        );
    }

    #[tokio::test]
    async fn test_failed_delete_does_not_stop_cleanup() {
        let provider = MemoryProvider::new().with_fault(FaultConfig {
            resource: String::from("queue-a"),
            operation: FaultOperation::Delete,
            error: FaultError::Transient,
            times: None,
        });
        let (sink, _events) = ChannelSink::new();
        let orchestrator = Orchestrator::new(&provider, &sink);
        let mut plan = scenario_plan();
        assert_ok!(orchestrator.provision(&mut plan).await);

        let report = orchestrator.cleanup(&mut plan).await;

        assert_eq!(report.outcome(), CleanupOutcome::Failed);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].name, "queue-a");
        assert_eq!(deletes(&provider).await, ["queue-b", "queue-a", "namespace", "group"]);
        assert_eq!(plan.node("queue-a").unwrap().state(), NodeState::Created);
        assert_eq!(plan.node("group").unwrap().state(), NodeState::Deleted);
    }

    #[tokio::test]
    async fn test_cascade_skips_children_of_deleted_parent() {
        let provider = MemoryProvider::new();
        let (sink, _events) = ChannelSink::new();
        let orchestrator =
            Orchestrator::new(&provider, &sink).with_cleanup_strategy(CleanupStrategy::Cascade);
        let mut plan = scenario_plan();
        assert_ok!(orchestrator.provision(&mut plan).await);

        let report = orchestrator.cleanup(&mut plan).await;

        assert!(report.is_clean());
        assert_eq!(deletes(&provider).await, ["group"]);
        assert_eq!(report.cascaded, ["namespace", "queue-a", "queue-b"]);
        assert_eq!(provider.resource_count().await, 0);
    }

    #[tokio::test]
    async fn test_cascade_still_deletes_children_when_parent_fails() {
        let provider = MemoryProvider::new().with_fault(FaultConfig {
            resource: String::from("group"),
            operation: FaultOperation::Delete,
            error: FaultError::Transient,
            times: None,
        });
        let (sink, _events) = ChannelSink::new();
        let orchestrator =
            Orchestrator::new(&provider, &sink).with_cleanup_strategy(CleanupStrategy::Cascade);
        let mut plan = scenario_plan();
        assert_ok!(orchestrator.provision(&mut plan).await);

        let report = orchestrator.cleanup(&mut plan).await;

        assert_eq!(deletes(&provider).await, ["group", "namespace"]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.cascaded, ["queue-a", "queue-b"]);
        assert_eq!(plan.node("group").unwrap().state(), NodeState::Created);
    }

    #[tokio::test]
    async fn test_partially_created_node_is_deleted() {
        let provider = MemoryProvider::new().with_fault(FaultConfig {
            resource: String::from("orphan"),
            operation: FaultOperation::Create,
            error: FaultError::Timeout,
            times: None,
        });
        let (sink, _events) = ChannelSink::new();
        let orchestrator = Orchestrator::new(&provider, &sink);
        let mut plan = Plan::new(vec![ResourceNode::new(
            "orphan",
            ResourceKind::ResourceGroup,
            None,
            OptionMap::new(),
        )])
        .unwrap();

        assert!(orchestrator.provision(&mut plan).await.is_err());
        assert!(plan.node("orphan").unwrap().needs_cleanup());

        let report = orchestrator.cleanup(&mut plan).await;
        assert_eq!(report.deleted, ["orphan"]);
        assert!(provider.list(ResourceKind::ResourceGroup, None).await.unwrap().is_empty());
    }
}
