//! Scenario specification types.
//!
//! This module defines the structs that map to the `lifecycle.yaml` file.
//! A scenario declares the resources to provision, the updates to apply once
//! they exist, and how the run talks to its provider and cleans up.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::kind::ResourceKind;

/// Option name to value mapping for a resource.
pub type OptionMap = BTreeMap<String, serde_json::Value>;

/// The root configuration structure for a lifecycle scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,
    /// Provider adapter configuration.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Cleanup behaviour.
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// List children after provisioning and report missing resources.
    #[serde(default)]
    pub verify: bool,
    /// Resources to provision.
    pub resources: Vec<ResourceConfig>,
    /// Updates applied after provisioning, in order.
    #[serde(default)]
    pub updates: Vec<UpdateConfig>,
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Name of the scenario.
    pub name: String,
    /// Environment (e.g., "dev", "staging", "prod").
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Provider adapter types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// In-process simulated management plane.
    #[default]
    Memory,
    /// REST management API.
    Http,
}

/// Provider adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Adapter type.
    #[serde(rename = "type", default)]
    pub provider_type: ProviderType,
    /// Base URL of the management API (required for `http`).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for transient failures inside the adapter.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Interval between completion polls in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum time to wait for a long-running operation in seconds.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
    /// Simulation settings for the `memory` provider.
    #[serde(default)]
    pub simulate: SimulationConfig,
}

/// Simulation settings for the in-memory provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Artificial latency per operation in milliseconds.
    #[serde(default)]
    pub latency_ms: u64,
    /// Injected failures.
    #[serde(default)]
    pub faults: Vec<FaultConfig>,
}

/// A failure injected into the simulated provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FaultConfig {
    /// Resource name the fault applies to (ignored for `connect`).
    #[serde(default)]
    pub resource: String,
    /// Operation that fails.
    pub operation: FaultOperation,
    /// Error returned.
    pub error: FaultError,
    /// How many times the fault fires (unbounded when absent).
    #[serde(default)]
    pub times: Option<u32>,
}

/// Operations a fault can target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FaultOperation {
    /// Initial client construction / credential check.
    Connect,
    /// First creation of a resource.
    Create,
    /// Create-or-update of an existing resource.
    Update,
    /// Deletion.
    Delete,
}

/// Errors a fault can produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FaultError {
    /// Network-level failure.
    Transient,
    /// Request rejected as invalid.
    Configuration,
    /// Resource not found.
    NotFound,
    /// Operation accepted but never completed; the resource is left behind.
    Timeout,
}

/// Cleanup strategies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CleanupStrategy {
    /// Delete every node explicitly, children before parents.
    #[default]
    Reverse,
    /// Delete roots first and rely on provider-side cascades for children.
    Cascade,
}

/// Cleanup configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanupConfig {
    /// Deletion strategy.
    #[serde(default)]
    pub strategy: CleanupStrategy,
}

/// A single resource declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceConfig {
    /// Unique name within the scenario.
    pub name: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Name of the resource this one lives under.
    #[serde(default)]
    pub parent: Option<String>,
    /// Desired options.
    #[serde(default)]
    pub config: OptionMap,
}

/// A partial configuration change applied after provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateConfig {
    /// Target resource name.
    pub resource: String,
    /// Options to change.
    pub patch: OptionMap,
}

// Default value functions

fn default_environment() -> String {
    String::from("dev")
}

fn default_token_env() -> String {
    String::from("LIFECYCLE_API_TOKEN")
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_poll_interval_ms() -> u64 {
    500
}

const fn default_operation_timeout_secs() -> u64 {
    300
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::default(),
            endpoint: None,
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            poll_interval_ms: default_poll_interval_ms(),
            operation_timeout_secs: default_operation_timeout_secs(),
            simulate: SimulationConfig::default(),
        }
    }
}

impl ScenarioConfig {
    /// Returns the fully qualified scenario name including environment.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}-{}", self.project.name, self.project.environment)
    }

    /// Returns resource names in declaration order.
    #[must_use]
    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name.as_str()).collect()
    }

    /// Looks up a resource declaration by name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.name == name)
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Http => write!(f, "http"),
        }
    }
}

impl std::fmt::Display for CleanupStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reverse => write!(f, "reverse"),
            Self::Cascade => write!(f, "cascade"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_defaults() {
        let provider = ProviderConfig::default();
        assert_eq!(provider.provider_type, ProviderType::Memory);
        assert_eq!(provider.token_env, "LIFECYCLE_API_TOKEN");
        assert_eq!(provider.max_retries, 3);
        assert!(provider.simulate.faults.is_empty());
    }

    #[test]
    fn test_fault_deserialize() {
        let yaml = "resource: queue-b\noperation: create\nerror: transient\n";
        let fault: FaultConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(fault.operation, FaultOperation::Create);
        assert_eq!(fault.error, FaultError::Transient);
        assert_eq!(fault.times, None);
    }
}
