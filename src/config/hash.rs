//! Configuration hashing for change detection.
//!
//! Hashes are deterministic over option names and values so that an update
//! which leaves a resource's configuration unchanged can be recognised without
//! calling the provider.

use sha2::{Digest, Sha256};

use super::kind::ResourceKind;
use super::spec::{OptionMap, ScenarioConfig};

/// Hasher for computing configuration hashes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the entire scenario.
    #[must_use]
    pub fn hash_scenario(&self, config: &ScenarioConfig) -> String {
        let mut hasher = Sha256::new();

        hasher.update(config.project.name.as_bytes());
        hasher.update(config.project.environment.as_bytes());

        for resource in &config.resources {
            hasher.update(resource.name.as_bytes());
            if let Some(parent) = &resource.parent {
                hasher.update(parent.as_bytes());
            }
            hasher.update(self.hash_options(resource.kind, &resource.config).as_bytes());
        }

        for update in &config.updates {
            hasher.update(update.resource.as_bytes());
            Self::feed_options(&mut hasher, &update.patch);
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a hash for one resource's options.
    #[must_use]
    pub fn hash_options(&self, kind: ResourceKind, options: &OptionMap) -> String {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_str().as_bytes());
        Self::feed_options(&mut hasher, options);
        hex::encode(hasher.finalize())
    }

    /// Feeds options in key order; `OptionMap` iterates sorted.
    fn feed_options(hasher: &mut Sha256, options: &OptionMap) {
        for (key, value) in options {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.to_string().as_bytes());
            hasher.update([0u8]);
        }
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(pairs: &[(&str, serde_json::Value)]) -> OptionMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_hash_is_insertion_order_independent() {
        let hasher = ConfigHasher::new();
        let a = options(&[("max_delivery_count", json!(40)), ("requires_session", json!(true))]);
        let b = options(&[("requires_session", json!(true)), ("max_delivery_count", json!(40))]);

        assert_eq!(
            hasher.hash_options(ResourceKind::Queue, &a),
            hasher.hash_options(ResourceKind::Queue, &b)
        );
    }

    #[test]
    fn test_different_values_different_hash() {
        let hasher = ConfigHasher::new();
        let a = options(&[("auto_delete_on_idle", json!("10m"))]);
        let b = options(&[("auto_delete_on_idle", json!("5m"))]);

        assert_ne!(
            hasher.hash_options(ResourceKind::Queue, &a),
            hasher.hash_options(ResourceKind::Queue, &b)
        );
    }

    #[test]
    fn test_kind_is_part_of_hash() {
        let hasher = ConfigHasher::new();
        let empty = OptionMap::new();

        assert_ne!(
            hasher.hash_options(ResourceKind::Queue, &empty),
            hasher.hash_options(ResourceKind::Namespace, &empty)
        );
    }

    #[test]
    fn test_short_hash() {
        let hasher = ConfigHasher::new();
        let short = hasher.short_hash("abcdef1234567890abcdef1234567890");
        assert_eq!(short, "abcdef12");
    }
}
