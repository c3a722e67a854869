//! Forward provisioning, updates, and the end-to-end run.
//!
//! The [`Orchestrator`] walks a [`Plan`] one node at a time against a
//! [`ProviderAdapter`]. It holds no state between runs; everything it learns
//! is recorded on the plan's nodes and reported through an [`EventSink`].

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{CleanupStrategy, ConfigHasher, OptionMap, UpdateConfig};
use crate::error::{ConfigError, LifecycleError, PlanError, Result};
use crate::planner::{NodeError, NodeState, Plan};
use crate::provider::ProviderAdapter;

use super::events::{EventSink, LifecycleEvent};
use super::report::{RunFailure, RunReport, RunStage};

/// Drives one plan through provision, update, and cleanup.
pub struct Orchestrator<'a> {
    /// Management-plane adapter.
    pub(super) provider: &'a dyn ProviderAdapter,
    /// Event receiver.
    pub(super) sink: &'a dyn EventSink,
    /// Configuration hasher.
    hasher: ConfigHasher,
    /// How cleanup walks the plan.
    pub(super) strategy: CleanupStrategy,
    /// Whether to list resources after provisioning.
    verify: bool,
    /// Checked between node operations.
    cancel: CancellationToken,
}

impl<'a> Orchestrator<'a> {
    /// Creates a new orchestrator.
    #[must_use]
    pub fn new(provider: &'a dyn ProviderAdapter, sink: &'a dyn EventSink) -> Self {
        Self {
            provider,
            sink,
            hasher: ConfigHasher::new(),
            strategy: CleanupStrategy::default(),
            verify: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the cleanup strategy.
    #[must_use]
    pub const fn with_cleanup_strategy(mut self, strategy: CleanupStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enables listing created resources after provisioning.
    #[must_use]
    pub const fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Sets the token checked at each node boundary.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Creates every pending node in dependency order.
    ///
    /// Stops at the first failure. Nodes after the failing one stay
    /// `Pending` and are reported as skipped.
    ///
    /// # Errors
    ///
    /// Returns the first provider error, an invalid-state error if a node's
    /// parent was never created, or a cancellation error.
    pub async fn provision(&self, plan: &mut Plan) -> Result<()> {
        info!("Provisioning {} resources", plan.len());

        for position in 0..plan.len() {
            let node = &plan.nodes()[position];
            if node.state() != NodeState::Pending {
                debug!("Skipping {} ({})", node.name, node.state());
                continue;
            }

            if self.cancel.is_cancelled() {
                let next = node.name.clone();
                warn!("Run cancelled before {next}");
                self.sink.emit(LifecycleEvent::RunCancelled { next: next.clone() });
                self.skip_from(plan, position);
                return Err(LifecycleError::Cancelled { next });
            }

            if let Some(parent) = plan.parent_of(&node.name)
                && parent.state() != NodeState::Created
            {
                let err = LifecycleError::invalid_state(
                    node.name.clone(),
                    format!("waiting on {} parent '{}'", parent.state(), parent.name),
                    "create",
                );
                let (name, kind) = (node.name.clone(), node.kind);
                error!("{err}");
                plan.node_at_mut(position).fail_with(NodeError::from(&err));
                self.sink.emit(LifecycleEvent::NodeCreateFailed {
                    name,
                    kind,
                    error_kind: err.kind(),
                    message: err.to_string(),
                });
                self.skip_from(plan, position + 1);
                return Err(err);
            }

            let (name, kind) = (node.name.clone(), node.kind);
            let parent = node.parent.clone();
            let config = node.config.clone();

            info!("Creating {kind} {name}");
            match self
                .provider
                .create_or_update(kind, &name, parent.as_deref(), &config)
                .await
            {
                Ok(snapshot) => {
                    plan.node_at_mut(position).mark_created(snapshot);
                    self.sink.emit(LifecycleEvent::NodeCreated { name, kind });
                }
                Err(e) => {
                    error!("Failed to create {kind} {name}: {e}");
                    plan.node_at_mut(position).mark_failed(&e);
                    self.sink.emit(LifecycleEvent::NodeCreateFailed {
                        name,
                        kind,
                        error_kind: e.kind(),
                        message: e.to_string(),
                    });
                    self.skip_from(plan, position + 1);
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    /// Reports every still-pending node from `position` on as skipped.
    fn skip_from(&self, plan: &Plan, position: usize) {
        for node in plan.nodes()[position..]
            .iter()
            .filter(|n| n.state() == NodeState::Pending)
        {
            self.sink.emit(LifecycleEvent::NodeSkipped {
                name: node.name.clone(),
                kind: node.kind,
            });
        }
    }

    /// Applies a partial configuration change to a created node.
    ///
    /// Returns `false` without calling the provider when the patch does not
    /// change the node's configuration, so repeating a patch is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is unknown or not `Created`, if the patch
    /// names an unknown option or changes an immutable one, or if the
    /// provider call fails.
    pub async fn update(&self, plan: &mut Plan, name: &str, patch: &OptionMap) -> Result<bool> {
        let result = self.apply_patch(plan, name, patch).await;

        if let Err(e) = &result {
            warn!("Update of {name} failed: {e}");
            if let Some(node) = plan.node_mut(name) {
                node.record_error(NodeError::from(e));
            }
            self.sink.emit(LifecycleEvent::NodeUpdateFailed {
                name: name.to_string(),
                error_kind: e.kind(),
                message: e.to_string(),
            });
        }

        result
    }

    async fn apply_patch(&self, plan: &mut Plan, name: &str, patch: &OptionMap) -> Result<bool> {
        let node = plan.node(name).ok_or_else(|| PlanError::UnknownNode {
            name: name.to_string(),
        })?;

        if node.state() != NodeState::Created {
            return Err(LifecycleError::invalid_state(name, node.state(), "update"));
        }

        for (option, value) in patch {
            let Some(spec) = node.kind.option(option) else {
                return Err(ConfigError::validation(
                    format!("{} has no option '{option}'", node.kind),
                    format!("updates.{name}.{option}"),
                )
                .into());
            };

            if spec.immutable && node.config.get(option) != Some(value) {
                return Err(ConfigError::ImmutableOption {
                    resource: name.to_string(),
                    option: option.clone(),
                }
                .into());
            }
        }

        let mut merged = node.config.clone();
        merged.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));

        let kind = node.kind;
        if self.hasher.hash_options(kind, &merged) == self.hasher.hash_options(kind, &node.config) {
            debug!("Update of {name} is a no-op");
            self.sink.emit(LifecycleEvent::NodeUpdated {
                name: name.to_string(),
                kind,
                changed: false,
            });
            return Ok(false);
        }

        let parent = node.parent.clone();
        info!("Updating {kind} {name}");
        let snapshot = self
            .provider
            .create_or_update(kind, name, parent.as_deref(), &merged)
            .await?;

        if let Some(node) = plan.node_mut(name) {
            node.apply_update(merged, snapshot);
        }
        self.sink.emit(LifecycleEvent::NodeUpdated {
            name: name.to_string(),
            kind,
            changed: true,
        });

        Ok(true)
    }

    /// Lists every created node through the provider.
    ///
    /// Returns the names of nodes the provider no longer reports.
    ///
    /// # Errors
    ///
    /// Returns an error if a list call fails.
    pub async fn verify(&self, plan: &Plan) -> Result<Vec<String>> {
        let mut missing = Vec::new();

        for node in plan
            .creation_order()
            .filter(|n| n.state() == NodeState::Created)
        {
            let listed = self.provider.list(node.kind, node.parent.as_deref()).await?;
            if !listed.iter().any(|r| r.name == node.name) {
                warn!("{} {} was not found by the provider", node.kind, node.name);
                self.sink.emit(LifecycleEvent::NodeMissing {
                    name: node.name.clone(),
                    kind: node.kind,
                });
                missing.push(node.name.clone());
            }
        }

        Ok(missing)
    }

    /// Runs the plan end to end.
    ///
    /// Connects, provisions, optionally verifies, and applies `updates` in
    /// order. Whatever happens, cleanup runs exactly once before returning.
    pub async fn run(&self, plan: &mut Plan, updates: &[UpdateConfig]) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        info!("Starting run {run_id} with {} resources", plan.len());
        self.sink.emit(LifecycleEvent::RunStarted {
            run_id: run_id.clone(),
            nodes: plan.len(),
        });

        let mut missing = Vec::new();
        let failure = self.execute(plan, updates, &mut missing).await.err();

        if let Some(failure) = &failure {
            error!(
                "Run stopped during {}: {}",
                failure.stage, failure.error.message
            );
        }

        let cleanup = self.cleanup(plan).await;

        let report = RunReport {
            run_id: run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            failure,
            nodes: RunReport::summarize(plan),
            cleanup,
            missing,
        };

        let success = report.success();
        info!("Run {run_id} finished (success: {success})");
        self.sink.emit(LifecycleEvent::RunFinished { run_id, success });

        report
    }

    async fn execute(
        &self,
        plan: &mut Plan,
        updates: &[UpdateConfig],
        missing: &mut Vec<String>,
    ) -> std::result::Result<(), RunFailure> {
        self.provider
            .connect()
            .await
            .map_err(|e| RunFailure::new(RunStage::Connect, None, &e.into()))?;
        debug!("Connected to {} provider", self.provider.backend_type());

        if let Err(e) = self.provision(plan).await {
            let node = match &e {
                LifecycleError::Cancelled { next } => Some(next.clone()),
                _ => plan
                    .nodes()
                    .iter()
                    .find(|n| n.state() == NodeState::Failed)
                    .map(|n| n.name.clone()),
            };
            return Err(RunFailure::new(RunStage::Provision, node, &e));
        }

        if self.verify {
            *missing = self
                .verify(plan)
                .await
                .map_err(|e| RunFailure::new(RunStage::Verify, None, &e))?;
        }

        for update in updates {
            if self.cancel.is_cancelled() {
                warn!("Run cancelled before updating {}", update.resource);
                self.sink.emit(LifecycleEvent::RunCancelled {
                    next: update.resource.clone(),
                });
                let err = LifecycleError::Cancelled {
                    next: update.resource.clone(),
                };
                return Err(RunFailure::new(RunStage::Update, Some(update.resource.clone()), &err));
            }

            self.update(plan, &update.resource, &update.patch)
                .await
                .map_err(|e| RunFailure::new(RunStage::Update, Some(update.resource.clone()), &e))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FaultConfig, FaultError, FaultOperation};
    use crate::error::{ErrorKind, ProviderError};
    use crate::orchestrator::events::ChannelSink;
    use crate::orchestrator::fixtures::{drain, queue_b_patch, scenario_plan};
    use crate::provider::{CallKind, MemoryProvider, MockProviderAdapter};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn create_order(calls: &[crate::provider::ProviderCall]) -> Vec<&str> {
        calls
            .iter()
            .filter(|c| c.operation == CallKind::Create && c.succeeded)
            .map(|c| c.name.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_provision_creates_in_dependency_order() {
        let provider = MemoryProvider::new();
        let (sink, _events) = ChannelSink::new();
        let mut plan = scenario_plan();

        assert_ok!(Orchestrator::new(&provider, &sink).provision(&mut plan).await);

        assert_eq!(plan.count_in(NodeState::Created), plan.len());
        let calls = provider.calls().await;
        assert_eq!(create_order(&calls), ["group", "namespace", "queue-a", "queue-b"]);
    }

    #[tokio::test]
    async fn test_provision_stops_at_first_failure() {
        let provider = MemoryProvider::new().with_fault(FaultConfig {
            resource: String::from("queue-a"),
            operation: FaultOperation::Create,
            error: FaultError::Transient,
            times: None,
        });
        let (sink, mut events) = ChannelSink::new();
        let mut plan = scenario_plan();

        let err = assert_err!(Orchestrator::new(&provider, &sink).provision(&mut plan).await);
        assert_eq!(err.kind(), ErrorKind::TransientProvider);

        assert_eq!(plan.node("namespace").unwrap().state(), NodeState::Created);
        assert_eq!(plan.node("queue-a").unwrap().state(), NodeState::Failed);
        assert_eq!(plan.node("queue-b").unwrap().state(), NodeState::Pending);

        let calls = provider.calls().await;
        assert!(calls.iter().all(|c| c.name != "queue-b"));

        let skipped: Vec<String> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                LifecycleEvent::NodeSkipped { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(skipped, ["queue-b"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_node() {
        let provider = MemoryProvider::new();
        let (sink, _events) = ChannelSink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut plan = scenario_plan();

        let err = assert_err!(
            Orchestrator::new(&provider, &sink)
                .with_cancellation(cancel)
                .provision(&mut plan)
                .await
        );
        assert!(matches!(err, LifecycleError::Cancelled { ref next } if next == "group"));
        assert!(provider.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let provider = MemoryProvider::new();
        let (sink, _events) = ChannelSink::new();
        let orchestrator = Orchestrator::new(&provider, &sink);
        let mut plan = scenario_plan();
        assert_ok!(orchestrator.provision(&mut plan).await);

        let patch = queue_b_patch();
        assert!(orchestrator.update(&mut plan, "queue-b", &patch).await.unwrap());
        let after_first = plan.node("queue-b").unwrap().config.clone();

        assert!(!orchestrator.update(&mut plan, "queue-b", &patch).await.unwrap());
        let node = plan.node("queue-b").unwrap();
        assert_eq!(node.config, after_first);
        assert_eq!(node.config["auto_delete_on_idle"], json!("5m"));
        assert_eq!(node.updates_applied(), 1);

        let remote = provider.get("queue-b").await.unwrap();
        assert_eq!(remote.config, after_first);
    }

    #[tokio::test]
    async fn test_update_requires_created_node() {
        let provider = MemoryProvider::new();
        let (sink, mut events) = ChannelSink::new();
        let mut plan = scenario_plan();

        let err = assert_err!(
            Orchestrator::new(&provider, &sink)
                .update(&mut plan, "queue-b", &queue_b_patch())
                .await
        );
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(
            drain(&mut events)
                .iter()
                .any(|e| matches!(e, LifecycleEvent::NodeUpdateFailed { .. }))
        );
    }

    #[tokio::test]
    async fn test_update_rejects_immutable_change() {
        let provider = MemoryProvider::new();
        let (sink, _events) = ChannelSink::new();
        let orchestrator = Orchestrator::new(&provider, &sink);
        let mut plan = scenario_plan();
        assert_ok!(orchestrator.provision(&mut plan).await);

        let mut patch = OptionMap::new();
        patch.insert(String::from("requires_session"), json!(false));
        let err = assert_err!(orchestrator.update(&mut plan, "queue-a", &patch).await);
        assert!(matches!(
            err,
            LifecycleError::Config(ConfigError::ImmutableOption { .. })
        ));

        // Repeating the value it was created with is not a change.
        patch.insert(String::from("requires_session"), json!(true));
        assert!(!orchestrator.update(&mut plan, "queue-a", &patch).await.unwrap());
    }

    #[tokio::test]
    async fn test_run_success_deletes_everything() {
        let provider = MemoryProvider::new();
        let (sink, _events) = ChannelSink::new();
        let mut plan = scenario_plan();
        let updates = [UpdateConfig {
            resource: String::from("queue-b"),
            patch: queue_b_patch(),
        }];

        let report = Orchestrator::new(&provider, &sink)
            .with_verification(true)
            .run(&mut plan, &updates)
            .await;

        assert!(report.success());
        assert_eq!(plan.count_in(NodeState::Deleted), plan.len());
        assert_eq!(provider.resource_count().await, 0);
        assert!(report.missing.is_empty());
    }

    #[tokio::test]
    async fn test_run_failure_cleans_up_in_reverse() {
        let provider = MemoryProvider::new().with_fault(FaultConfig {
            resource: String::from("queue-b"),
            operation: FaultOperation::Create,
            error: FaultError::Transient,
            times: None,
        });
        let (sink, mut events) = ChannelSink::new();
        let mut plan = scenario_plan();

        let report = Orchestrator::new(&provider, &sink).run(&mut plan, &[]).await;

        assert!(!report.success());
        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.stage, RunStage::Provision);
        assert_eq!(failure.node.as_deref(), Some("queue-b"));
        assert_eq!(failure.error.kind, ErrorKind::TransientProvider);

        let deletes: Vec<String> = provider
            .calls()
            .await
            .into_iter()
            .filter(|c| c.operation == CallKind::Delete)
            .map(|c| c.name)
            .collect();
        assert_eq!(deletes, ["queue-a", "namespace", "group"]);
        assert_eq!(plan.node("queue-b").unwrap().state(), NodeState::Failed);
        assert_eq!(report.never_created(), ["queue-b"]);

        let cleanups = drain(&mut events)
            .iter()
            .filter(|e| matches!(e, LifecycleEvent::CleanupStarted { .. }))
            .count();
        assert_eq!(cleanups, 1);
    }

    #[tokio::test]
    async fn test_cleanup_runs_once_when_update_fails() {
        let provider = MemoryProvider::new();
        let (sink, mut events) = ChannelSink::new();
        let mut plan = scenario_plan();
        let updates = [UpdateConfig {
            resource: String::from("missing"),
            patch: OptionMap::new(),
        }];

        let report = Orchestrator::new(&provider, &sink).run(&mut plan, &updates).await;

        assert_eq!(report.failure.as_ref().unwrap().stage, RunStage::Update);
        assert!(report.cleanup.is_clean());
        assert_eq!(provider.resource_count().await, 0);
        let cleanups = drain(&mut events)
            .iter()
            .filter(|e| matches!(e, LifecycleEvent::CleanupStarted { .. }))
            .count();
        assert_eq!(cleanups, 1);
    }

    /// Cancels the run as soon as the named node is created.
    struct CancelAfterCreate {
        name: &'static str,
        token: CancellationToken,
        inner: ChannelSink,
    }

    impl EventSink for CancelAfterCreate {
        fn emit(&self, event: LifecycleEvent) {
            if let LifecycleEvent::NodeCreated { name, .. } = &event
                && name == self.name
            {
                self.token.cancel();
            }
            self.inner.emit(event);
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_provision_cleans_up_created_nodes() {
        let provider = MemoryProvider::new();
        let token = CancellationToken::new();
        let (inner, mut events) = ChannelSink::new();
        let sink = CancelAfterCreate {
            name: "namespace",
            token: token.clone(),
            inner,
        };
        let mut plan = scenario_plan();

        let report = Orchestrator::new(&provider, &sink)
            .with_cancellation(token)
            .run(&mut plan, &[])
            .await;

        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.stage, RunStage::Provision);
        assert_eq!(failure.node.as_deref(), Some("queue-a"));
        assert_eq!(failure.error.kind, ErrorKind::Cancelled);
        assert_eq!(report.never_created(), ["queue-a", "queue-b"]);

        let events = drain(&mut events);
        let skipped: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::NodeSkipped { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(skipped, ["queue-a", "queue-b"]);
        let cleanups = events
            .iter()
            .filter(|e| matches!(e, LifecycleEvent::CleanupStarted { .. }))
            .count();
        assert_eq!(cleanups, 1);

        let deletes: Vec<String> = provider
            .calls()
            .await
            .into_iter()
            .filter(|c| c.operation == CallKind::Delete)
            .map(|c| c.name)
            .collect();
        assert_eq!(deletes, ["namespace", "group"]);
        assert!(report.cleanup.is_clean());
        assert_eq!(provider.resource_count().await, 0);
    }

    #[tokio::test]
    async fn test_connect_failure_is_a_noop_cleanup() {
        let mut provider = MockProviderAdapter::new();
        provider
            .expect_connect()
            .times(1)
            .returning(|| Err(ProviderError::AuthenticationFailed {
                message: String::from("expired"),
            }));
        provider.expect_create_or_update().never();
        provider.expect_delete().never();
        provider.expect_backend_type().return_const("mock");
        let (sink, _events) = ChannelSink::new();
        let mut plan = scenario_plan();

        let report = Orchestrator::new(&provider, &sink).run(&mut plan, &[]).await;

        assert_eq!(report.failure.as_ref().unwrap().stage, RunStage::Connect);
        assert!(report.cleanup.is_noop());
        assert!(report.cleanup.is_clean());
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_verify_reports_missing_nodes() {
        let provider = MemoryProvider::new();
        let (sink, _events) = ChannelSink::new();
        let orchestrator = Orchestrator::new(&provider, &sink);
        let mut plan = scenario_plan();
        assert_ok!(orchestrator.provision(&mut plan).await);

        provider.evict("queue-a").await;
        let missing = orchestrator.verify(&plan).await.unwrap();
        assert_eq!(missing, ["queue-a"]);
    }
}
