//! Types exchanged with provider adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{OptionMap, ResourceKind};
use crate::error::ProviderError;

/// Outcome of a single create-or-update call.
pub type OperationResult = std::result::Result<ResourceSnapshot, ProviderError>;

/// Provisioning status reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningStatus {
    /// The long-running operation is still in progress.
    Provisioning,
    /// The resource is ready.
    #[default]
    Succeeded,
    /// The provider gave up on the operation.
    Failed,
    /// The resource is being removed.
    Deleting,
}

/// Point-in-time view of a resource as the provider sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSnapshot {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource name.
    pub name: String,
    /// Parent resource name.
    #[serde(default)]
    pub parent: Option<String>,
    /// Effective configuration.
    #[serde(default)]
    pub config: OptionMap,
    /// Provisioning status.
    #[serde(default)]
    pub status: ProvisioningStatus,
    /// Monotonic revision, bumped on every change.
    #[serde(default)]
    pub revision: u64,
    /// When the provider last changed the resource.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ResourceSnapshot {
    /// Creates a snapshot of a ready resource.
    #[must_use]
    pub fn succeeded(
        kind: ResourceKind,
        name: impl Into<String>,
        parent: Option<String>,
        config: OptionMap,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            parent,
            config,
            status: ProvisioningStatus::Succeeded,
            revision: 1,
            updated_at: Utc::now(),
        }
    }

    /// Returns true once the provider reports the operation finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ProvisioningStatus::Succeeded | ProvisioningStatus::Failed
        )
    }
}

impl std::fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Provisioning => "provisioning",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Deleting => "deleting",
        };
        write!(f, "{s}")
    }
}
