//! In-process simulated management plane.
//!
//! `MemoryProvider` behaves like a small cloud control plane: children need an
//! existing parent, immutable options are enforced, deletes cascade to
//! descendants, and every call is written to a journal. Faults and latency can
//! be injected to exercise failure paths.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{
    FaultConfig, FaultError, FaultOperation, OptionMap, ResourceKind, SimulationConfig,
};
use crate::error::ProviderError;

use super::adapter::ProviderAdapter;
use super::types::{OperationResult, ProvisioningStatus, ResourceSnapshot};

/// A call observed by the simulated provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    /// Operation performed.
    pub operation: CallKind,
    /// Resource kind, if the call targeted one.
    pub kind: Option<ResourceKind>,
    /// Resource name (or parent filter for `List`).
    pub name: String,
    /// Whether the call succeeded.
    pub succeeded: bool,
}

/// Operation recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Session establishment.
    Connect,
    /// First creation of a resource.
    Create,
    /// Create-or-update of an existing resource.
    Update,
    /// Deletion.
    Delete,
    /// Listing.
    List,
}

/// Fault with its remaining firing budget.
#[derive(Debug, Clone)]
struct ActiveFault {
    config: FaultConfig,
    remaining: Option<u32>,
}

#[derive(Debug, Default)]
struct MemoryState {
    resources: BTreeMap<String, ResourceSnapshot>,
    faults: Vec<ActiveFault>,
    journal: Vec<ProviderCall>,
}

/// Simulated provider backed by an in-memory resource table.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    state: Mutex<MemoryState>,
    latency: Duration,
}

impl MemoryProvider {
    /// Creates an empty provider with no latency and no faults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider from scenario simulation settings.
    #[must_use]
    pub fn from_simulation(simulation: &SimulationConfig) -> Self {
        let faults = simulation
            .faults
            .iter()
            .cloned()
            .map(|config| ActiveFault {
                remaining: config.times,
                config,
            })
            .collect();

        Self {
            state: Mutex::new(MemoryState {
                faults,
                ..MemoryState::default()
            }),
            latency: Duration::from_millis(simulation.latency_ms),
        }
    }

    /// Adds a fault.
    #[must_use]
    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.state.get_mut().faults.push(ActiveFault {
            remaining: config.times,
            config,
        });
        self
    }

    /// Sets the simulated latency per operation.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Returns a copy of the call journal.
    pub async fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().await.journal.clone()
    }

    /// Returns a snapshot of a resource, if it exists.
    pub async fn get(&self, name: &str) -> Option<ResourceSnapshot> {
        self.state.lock().await.resources.get(name).cloned()
    }

    /// Number of resources currently held.
    pub async fn resource_count(&self) -> usize {
        self.state.lock().await.resources.len()
    }

    /// Removes a resource behind the orchestrator's back.
    pub async fn evict(&self, name: &str) -> Option<ResourceSnapshot> {
        let removed = self.state.lock().await.resources.remove(name);
        if removed.is_some() {
            debug!("Evicted {name} from simulated provider");
        }
        removed
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl MemoryState {
    /// Consumes a matching fault, if any.
    fn take_fault(&mut self, operation: FaultOperation, name: &str) -> Option<FaultError> {
        let fault = self.faults.iter_mut().find(|f| {
            f.config.operation == operation
                && (operation == FaultOperation::Connect || f.config.resource == name)
                && f.remaining.is_none_or(|n| n > 0)
        })?;

        if let Some(n) = fault.remaining.as_mut() {
            *n -= 1;
        }
        Some(fault.config.error)
    }

    fn record(&mut self, operation: CallKind, kind: Option<ResourceKind>, name: &str, succeeded: bool) {
        self.journal.push(ProviderCall {
            operation,
            kind,
            name: name.to_string(),
            succeeded,
        });
    }

    /// Names of all descendants of `name`.
    fn descendants(&self, name: &str) -> Vec<String> {
        let mut found = Vec::new();
        let mut frontier = vec![name.to_string()];

        while let Some(current) = frontier.pop() {
            for child in self
                .resources
                .values()
                .filter(|r| r.parent.as_deref() == Some(current.as_str()))
            {
                found.push(child.name.clone());
                frontier.push(child.name.clone());
            }
        }

        found
    }
}

fn fault_error(error: FaultError, kind: ResourceKind, name: &str) -> ProviderError {
    match error {
        FaultError::Transient => ProviderError::network(format!("simulated network failure for {name}")),
        FaultError::Configuration => ProviderError::Rejected {
            kind: kind.to_string(),
            name: name.to_string(),
            message: String::from("simulated invalid request"),
        },
        FaultError::NotFound => ProviderError::not_found(kind, name),
        FaultError::Timeout => ProviderError::Timeout {
            kind: kind.to_string(),
            name: name.to_string(),
        },
    }
}

#[async_trait]
impl ProviderAdapter for MemoryProvider {
    async fn connect(&self) -> Result<(), ProviderError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        if let Some(error) = state.take_fault(FaultOperation::Connect, "") {
            state.record(CallKind::Connect, None, "", false);
            warn!("Simulated connect failure: {error:?}");
            return Err(match error {
                FaultError::Transient | FaultError::Timeout => {
                    ProviderError::network("simulated connect failure")
                }
                FaultError::Configuration | FaultError::NotFound => {
                    ProviderError::AuthenticationFailed {
                        message: String::from("simulated credential rejection"),
                    }
                }
            });
        }

        state.record(CallKind::Connect, None, "", true);
        Ok(())
    }

    async fn create_or_update<'p>(
        &self,
        kind: ResourceKind,
        name: &str,
        parent: Option<&'p str>,
        config: &OptionMap,
    ) -> OperationResult {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        let existing = state.resources.get(name).cloned();
        let (operation, call) = if existing.is_some() {
            (FaultOperation::Update, CallKind::Update)
        } else {
            (FaultOperation::Create, CallKind::Create)
        };

        if let Some(error) = state.take_fault(operation, name) {
            if error == FaultError::Timeout && existing.is_none() {
                // Accepted but never confirmed: the resource stays behind.
                state.resources.insert(
                    name.to_string(),
                    ResourceSnapshot {
                        status: ProvisioningStatus::Provisioning,
                        ..ResourceSnapshot::succeeded(kind, name, parent.map(String::from), config.clone())
                    },
                );
            }
            state.record(call, Some(kind), name, false);
            return Err(fault_error(error, kind, name));
        }

        if let Some(parent) = parent
            && !state.resources.contains_key(parent)
        {
            state.record(call, Some(kind), name, false);
            return Err(ProviderError::Rejected {
                kind: kind.to_string(),
                name: name.to_string(),
                message: format!("parent '{parent}' does not exist"),
            });
        }

        let snapshot = match existing {
            Some(current) if current.kind != kind => {
                state.record(call, Some(kind), name, false);
                return Err(ProviderError::Rejected {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    message: format!("name already used by a {}", current.kind),
                });
            }
            Some(current) => {
                if let Some(option) = config
                    .iter()
                    .find(|(k, v)| kind.is_immutable(k) && current.config.get(*k) != Some(*v))
                    .map(|(k, _)| k.clone())
                {
                    state.record(call, Some(kind), name, false);
                    return Err(ProviderError::Rejected {
                        kind: kind.to_string(),
                        name: name.to_string(),
                        message: format!("option '{option}' is immutable"),
                    });
                }

                if current.config == *config && current.status == ProvisioningStatus::Succeeded {
                    current
                } else {
                    ResourceSnapshot {
                        config: config.clone(),
                        status: ProvisioningStatus::Succeeded,
                        revision: current.revision + 1,
                        updated_at: Utc::now(),
                        ..current
                    }
                }
            }
            None => ResourceSnapshot::succeeded(kind, name, parent.map(String::from), config.clone()),
        };

        state.resources.insert(name.to_string(), snapshot.clone());
        state.record(call, Some(kind), name, true);
        debug!("Simulated {call:?} of {kind} {name} (revision {})", snapshot.revision);

        Ok(snapshot)
    }

    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), ProviderError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        if let Some(error) = state.take_fault(FaultOperation::Delete, name) {
            state.record(CallKind::Delete, Some(kind), name, false);
            return Err(fault_error(error, kind, name));
        }

        if !state.resources.contains_key(name) {
            state.record(CallKind::Delete, Some(kind), name, false);
            return Err(ProviderError::not_found(kind, name));
        }

        if kind.cascades_delete() {
            for descendant in state.descendants(name) {
                state.resources.remove(&descendant);
                debug!("Cascade removed {descendant} with {name}");
            }
        }

        state.resources.remove(name);
        state.record(CallKind::Delete, Some(kind), name, true);
        info!("Simulated delete of {kind} {name}");
        Ok(())
    }

    async fn list<'p>(
        &self,
        kind: ResourceKind,
        parent: Option<&'p str>,
    ) -> Result<Vec<ResourceSnapshot>, ProviderError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        let found: Vec<ResourceSnapshot> = state
            .resources
            .values()
            .filter(|r| r.kind == kind && (parent.is_none() || r.parent.as_deref() == parent))
            .cloned()
            .collect();

        state.record(CallKind::List, Some(kind), parent.unwrap_or_default(), true);
        Ok(found)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn options(pairs: &[(&str, serde_json::Value)]) -> OptionMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    async fn seeded() -> MemoryProvider {
        let provider = MemoryProvider::new();
        assert_ok!(
            provider
                .create_or_update(ResourceKind::ResourceGroup, "rg", None, &OptionMap::new())
                .await
        );
        assert_ok!(
            provider
                .create_or_update(ResourceKind::Namespace, "ns", Some("rg"), &OptionMap::new())
                .await
        );
        provider
    }

    #[tokio::test]
    async fn test_child_requires_parent() {
        let provider = MemoryProvider::new();
        let result = provider
            .create_or_update(ResourceKind::Queue, "queue-a", Some("ns"), &OptionMap::new())
            .await;
        assert!(matches!(result, Err(ProviderError::Rejected { .. })));
    }

    #[tokio::test]
    async fn test_repeat_create_or_update_is_idempotent() {
        let provider = seeded().await;
        let config = options(&[("max_delivery_count", json!(40))]);

        let first = provider
            .create_or_update(ResourceKind::Queue, "queue-a", Some("ns"), &config)
            .await
            .unwrap();
        let second = provider
            .create_or_update(ResourceKind::Queue, "queue-a", Some("ns"), &config)
            .await
            .unwrap();

        assert_eq!(first.revision, second.revision);
        assert_eq!(first.config, second.config);
    }

    #[tokio::test]
    async fn test_immutable_option_rejected() {
        let provider = seeded().await;
        let session = options(&[("requires_session", json!(true))]);
        assert_ok!(
            provider
                .create_or_update(ResourceKind::Queue, "queue-a", Some("ns"), &session)
                .await
        );

        let flipped = options(&[("requires_session", json!(false))]);
        assert_err!(
            provider
                .create_or_update(ResourceKind::Queue, "queue-a", Some("ns"), &flipped)
                .await
        );
    }

    #[tokio::test]
    async fn test_delete_cascades_and_missing_is_not_found() {
        let provider = seeded().await;
        assert_ok!(
            provider
                .create_or_update(ResourceKind::Queue, "queue-a", Some("ns"), &OptionMap::new())
                .await
        );

        assert_ok!(provider.delete(ResourceKind::ResourceGroup, "rg").await);
        assert_eq!(provider.resource_count().await, 0);

        let again = provider.delete(ResourceKind::Queue, "queue-a").await;
        assert!(matches!(again, Err(ProviderError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_fault_fires_limited_times() {
        let provider = MemoryProvider::new().with_fault(FaultConfig {
            resource: String::from("rg"),
            operation: FaultOperation::Create,
            error: FaultError::Transient,
            times: Some(1),
        });

        assert_err!(
            provider
                .create_or_update(ResourceKind::ResourceGroup, "rg", None, &OptionMap::new())
                .await
        );
        assert_ok!(
            provider
                .create_or_update(ResourceKind::ResourceGroup, "rg", None, &OptionMap::new())
                .await
        );

        let calls = provider.calls().await;
        assert_eq!(calls.len(), 2);
        assert!(!calls[0].succeeded);
        assert!(calls[1].succeeded);
    }

    #[tokio::test]
    async fn test_timeout_fault_leaves_resource_behind() {
        let provider = MemoryProvider::new().with_fault(FaultConfig {
            resource: String::from("rg"),
            operation: FaultOperation::Create,
            error: FaultError::Timeout,
            times: None,
        });

        let result = provider
            .create_or_update(ResourceKind::ResourceGroup, "rg", None, &OptionMap::new())
            .await;
        assert!(matches!(result, Err(ProviderError::Timeout { .. })));
        assert!(provider.get("rg").await.is_some());
    }

    #[tokio::test]
    async fn test_list_filters_by_parent() {
        let provider = seeded().await;
        for name in ["queue-a", "queue-b"] {
            assert_ok!(
                provider
                    .create_or_update(ResourceKind::Queue, name, Some("ns"), &OptionMap::new())
                    .await
            );
        }

        let queues = provider.list(ResourceKind::Queue, Some("ns")).await.unwrap();
        assert_eq!(queues.len(), 2);
        let none = provider.list(ResourceKind::Queue, Some("rg")).await.unwrap();
        assert!(none.is_empty());
    }
}
