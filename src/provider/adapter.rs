//! Provider adapter trait definition.
//!
//! This module defines the narrow contract the orchestrator relies on. An
//! adapter owns retries and completion waits; the orchestrator only sees the
//! final outcome of each call.

use async_trait::async_trait;

use crate::config::{OptionMap, ResourceKind};
use crate::error::ProviderError;

use super::types::{OperationResult, ResourceSnapshot};

/// Trait for management-plane adapters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Establishes the client session and checks credentials.
    async fn connect(&self) -> Result<(), ProviderError>;

    /// Creates the resource, or brings an existing one to `config`.
    ///
    /// Returns once the provider reports the operation complete.
    async fn create_or_update<'p>(
        &self,
        kind: ResourceKind,
        name: &str,
        parent: Option<&'p str>,
        config: &OptionMap,
    ) -> OperationResult;

    /// Deletes the resource.
    ///
    /// Returns `ProviderError::NotFound` if it does not exist.
    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), ProviderError>;

    /// Lists resources of a kind, optionally restricted to one parent.
    async fn list<'p>(
        &self,
        kind: ResourceKind,
        parent: Option<&'p str>,
    ) -> Result<Vec<ResourceSnapshot>, ProviderError>;

    /// Gets the adapter type name.
    fn backend_type(&self) -> &'static str;
}
