//! Structured lifecycle events.
//!
//! Every node transition and every cleanup outcome is reported as a
//! [`LifecycleEvent`] through an [`EventSink`].

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::ResourceKind;
use crate::error::ErrorKind;

/// An observable step of an orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A run has started.
    RunStarted {
        /// Run identifier.
        run_id: String,
        /// Number of nodes in the plan.
        nodes: usize,
    },
    /// A node was created.
    NodeCreated {
        /// Node name.
        name: String,
        /// Resource kind.
        kind: ResourceKind,
    },
    /// A node could not be created.
    NodeCreateFailed {
        /// Node name.
        name: String,
        /// Resource kind.
        kind: ResourceKind,
        /// Error classification.
        error_kind: ErrorKind,
        /// Error message.
        message: String,
    },
    /// A node was not attempted because provisioning stopped early.
    NodeSkipped {
        /// Node name.
        name: String,
        /// Resource kind.
        kind: ResourceKind,
    },
    /// An update was applied to a node.
    NodeUpdated {
        /// Node name.
        name: String,
        /// Resource kind.
        kind: ResourceKind,
        /// False if the patch matched the current configuration.
        changed: bool,
    },
    /// An update to a node failed.
    NodeUpdateFailed {
        /// Node name.
        name: String,
        /// Error classification.
        error_kind: ErrorKind,
        /// Error message.
        message: String,
    },
    /// Verification did not find a node the plan created.
    NodeMissing {
        /// Node name.
        name: String,
        /// Resource kind.
        kind: ResourceKind,
    },
    /// Cleanup has started.
    CleanupStarted {
        /// Nodes that need a delete.
        pending: usize,
    },
    /// A node was deleted.
    NodeDeleted {
        /// Node name.
        name: String,
        /// Resource kind.
        kind: ResourceKind,
    },
    /// A node was already gone when cleanup reached it.
    NodeAlreadyDeleted {
        /// Node name.
        name: String,
        /// Resource kind.
        kind: ResourceKind,
    },
    /// A node was removed by deleting one of its ancestors.
    NodeCascadeDeleted {
        /// Node name.
        name: String,
        /// Resource kind.
        kind: ResourceKind,
        /// The ancestor whose delete removed it.
        ancestor: String,
    },
    /// A node could not be deleted.
    NodeDeleteFailed {
        /// Node name.
        name: String,
        /// Resource kind.
        kind: ResourceKind,
        /// Error classification.
        error_kind: ErrorKind,
        /// Error message.
        message: String,
    },
    /// Cleanup has finished.
    CleanupFinished {
        /// Nodes deleted or confirmed gone.
        deleted: usize,
        /// Nodes whose delete failed.
        failed: usize,
    },
    /// The run was cancelled before the named node.
    RunCancelled {
        /// Node that would have run next.
        next: String,
    },
    /// The run has finished.
    RunFinished {
        /// Run identifier.
        run_id: String,
        /// Whether every node was created and deleted cleanly.
        success: bool,
    },
}

impl LifecycleEvent {
    /// Returns true for events describing a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::NodeCreateFailed { .. }
                | Self::NodeUpdateFailed { .. }
                | Self::NodeDeleteFailed { .. }
                | Self::NodeMissing { .. }
        )
    }

    /// Name of the node the event concerns, if any.
    #[must_use]
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::NodeCreated { name, .. }
            | Self::NodeCreateFailed { name, .. }
            | Self::NodeSkipped { name, .. }
            | Self::NodeUpdated { name, .. }
            | Self::NodeUpdateFailed { name, .. }
            | Self::NodeMissing { name, .. }
            | Self::NodeDeleted { name, .. }
            | Self::NodeAlreadyDeleted { name, .. }
            | Self::NodeCascadeDeleted { name, .. }
            | Self::NodeDeleteFailed { name, .. } => Some(name),
            Self::RunStarted { .. }
            | Self::CleanupStarted { .. }
            | Self::CleanupFinished { .. }
            | Self::RunCancelled { .. }
            | Self::RunFinished { .. } => None,
        }
    }
}

/// Receiver of lifecycle events.
pub trait EventSink: Send + Sync {
    /// Records an event.
    fn emit(&self, event: LifecycleEvent);
}

/// Sink that writes events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: LifecycleEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        if event.is_failure() {
            warn!(target: "lifecycle::events", "{payload}");
        } else {
            info!(target: "lifecycle::events", "{payload}");
        }
    }
}

/// Sink that forwards events over a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<LifecycleEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: LifecycleEvent) {
        // A closed receiver only means nobody is listening any more.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = LifecycleEvent::NodeCreated {
            name: String::from("ns"),
            kind: ResourceKind::Namespace,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "node_created");
        assert_eq!(json["kind"], "namespace");
        assert_eq!(event.node(), Some("ns"));
    }

    #[test]
    fn test_channel_sink_forwards_in_order() {
        let (sink, mut receiver) = ChannelSink::new();
        sink.emit(LifecycleEvent::CleanupStarted { pending: 2 });
        sink.emit(LifecycleEvent::CleanupFinished {
            deleted: 2,
            failed: 0,
        });

        assert_eq!(
            receiver.try_recv().unwrap(),
            LifecycleEvent::CleanupStarted { pending: 2 }
        );
        assert!(matches!(
            receiver.try_recv().unwrap(),
            LifecycleEvent::CleanupFinished { deleted: 2, .. }
        ));
    }

    #[test]
    fn test_failure_classification() {
        let failed = LifecycleEvent::NodeDeleteFailed {
            name: String::from("rg"),
            kind: ResourceKind::ResourceGroup,
            error_kind: ErrorKind::TransientProvider,
            message: String::from("boom"),
        };
        assert!(failed.is_failure());
        assert!(!LifecycleEvent::CleanupStarted { pending: 0 }.is_failure());
    }
}
