//! Resource nodes and their lifecycle states.

use serde::Serialize;

use crate::config::{OptionMap, ResourceConfig, ResourceKind};
use crate::error::{ErrorKind, LifecycleError, ProviderError};
use crate::provider::ResourceSnapshot;

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Not yet created.
    Pending,
    /// Created on the provider.
    Created,
    /// Creation failed.
    Failed,
    /// Deleted during cleanup.
    Deleted,
}

/// An error recorded against a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeError {
    /// Classification of the error.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

/// One provisionable resource and its run-time state.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceNode {
    /// Unique name.
    pub name: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Name of the parent node, if any.
    pub parent: Option<String>,
    /// Desired configuration.
    pub config: OptionMap,
    state: NodeState,
    snapshot: Option<ResourceSnapshot>,
    last_error: Option<NodeError>,
    partially_created: bool,
    updates_applied: u32,
}

impl ResourceNode {
    /// Creates a pending node.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: ResourceKind,
        parent: Option<String>,
        config: OptionMap,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            parent,
            config,
            state: NodeState::Pending,
            snapshot: None,
            last_error: None,
            partially_created: false,
            updates_applied: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> NodeState {
        self.state
    }

    /// Last snapshot returned by the provider.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&ResourceSnapshot> {
        self.snapshot.as_ref()
    }

    /// Last error recorded for this node.
    #[must_use]
    pub const fn last_error(&self) -> Option<&NodeError> {
        self.last_error.as_ref()
    }

    /// Whether a failed create may have left the resource behind.
    #[must_use]
    pub const fn partially_created(&self) -> bool {
        self.partially_created
    }

    /// Number of updates that changed this node.
    #[must_use]
    pub const fn updates_applied(&self) -> u32 {
        self.updates_applied
    }

    /// Returns true if the node reached `Created` at some point.
    #[must_use]
    pub const fn was_created(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Returns true if cleanup must issue a delete for this node.
    #[must_use]
    pub const fn needs_cleanup(&self) -> bool {
        match self.state {
            NodeState::Created => true,
            NodeState::Failed => self.partially_created,
            NodeState::Pending | NodeState::Deleted => false,
        }
    }

    pub(crate) fn mark_created(&mut self, snapshot: ResourceSnapshot) {
        self.state = NodeState::Created;
        self.snapshot = Some(snapshot);
        self.last_error = None;
    }

    pub(crate) fn mark_failed(&mut self, error: &ProviderError) {
        self.state = NodeState::Failed;
        self.partially_created = error.may_have_created();
        self.last_error = Some(NodeError::from(error));
    }

    pub(crate) fn fail_with(&mut self, error: NodeError) {
        self.state = NodeState::Failed;
        self.partially_created = false;
        self.last_error = Some(error);
    }

    pub(crate) fn apply_update(&mut self, config: OptionMap, snapshot: ResourceSnapshot) {
        self.config = config;
        self.snapshot = Some(snapshot);
        self.updates_applied += 1;
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.state = NodeState::Deleted;
        self.partially_created = false;
    }

    pub(crate) fn record_error(&mut self, error: NodeError) {
        self.last_error = Some(error);
    }
}

impl From<&ResourceConfig> for ResourceNode {
    fn from(resource: &ResourceConfig) -> Self {
        Self::new(
            resource.name.clone(),
            resource.kind,
            resource.parent.clone(),
            resource.config.clone(),
        )
    }
}

impl From<&ProviderError> for NodeError {
    fn from(error: &ProviderError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<&LifecycleError> for NodeError {
    fn from(error: &LifecycleError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Created => "created",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> ResourceNode {
        ResourceNode::new("queue-a", ResourceKind::Queue, Some(String::from("ns")), OptionMap::new())
    }

    #[test]
    fn test_new_node_is_pending() {
        let node = queue();
        assert_eq!(node.state(), NodeState::Pending);
        assert!(!node.needs_cleanup());
    }

    #[test]
    fn test_failed_node_cleanup_depends_on_partial_creation() {
        let mut node = queue();
        node.mark_failed(&ProviderError::network("reset"));
        assert_eq!(node.state(), NodeState::Failed);
        assert!(!node.needs_cleanup());

        let mut node = queue();
        node.mark_failed(&ProviderError::Timeout {
            kind: String::from("queue"),
            name: String::from("queue-a"),
        });
        assert!(node.partially_created());
        assert!(node.needs_cleanup());

        node.mark_deleted();
        assert!(!node.needs_cleanup());
    }

    #[test]
    fn test_created_node_needs_cleanup() {
        let mut node = queue();
        node.mark_created(ResourceSnapshot::succeeded(
            ResourceKind::Queue,
            "queue-a",
            Some(String::from("ns")),
            OptionMap::new(),
        ));
        assert_eq!(node.state(), NodeState::Created);
        assert!(node.needs_cleanup());
        assert!(node.snapshot().is_some());
    }
}
