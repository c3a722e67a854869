//! Provider adapters for the resource management plane.
//!
//! This module provides:
//! - The [`ProviderAdapter`] contract the orchestrator depends on
//! - An in-memory simulated provider for local runs and tests
//! - A REST adapter with retries and completion polling

mod adapter;
mod http;
mod memory;
mod types;

pub use adapter::ProviderAdapter;
#[cfg(test)]
pub(crate) use adapter::MockProviderAdapter;
pub use http::HttpProvider;
pub use memory::{CallKind, MemoryProvider, ProviderCall};
pub use types::{OperationResult, ProvisioningStatus, ResourceSnapshot};

use crate::config::{ProviderConfig, ProviderType};
use crate::error::Result;

/// Builds the adapter selected by the scenario's provider settings.
///
/// # Errors
///
/// Returns an error if the adapter cannot be constructed.
pub fn build_provider(config: &ProviderConfig) -> Result<Box<dyn ProviderAdapter>> {
    Ok(match config.provider_type {
        ProviderType::Memory => Box::new(MemoryProvider::from_simulation(&config.simulate)),
        ProviderType::Http => Box::new(HttpProvider::from_config(config)?),
    })
}
