//! Shared plans and helpers for orchestrator tests.

use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::{OptionMap, ResourceKind};
use crate::planner::{Plan, ResourceNode};

use super::events::LifecycleEvent;

fn options(pairs: &[(&str, serde_json::Value)]) -> OptionMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn node(name: &str, kind: ResourceKind, parent: Option<&str>, config: OptionMap) -> ResourceNode {
    ResourceNode::new(name, kind, parent.map(String::from), config)
}

/// Group, namespace and two queues with session and dedupe settings.
pub fn scenario_plan() -> Plan {
    Plan::new(vec![
        node("group", ResourceKind::ResourceGroup, None, options(&[("location", json!("westus"))])),
        node("namespace", ResourceKind::Namespace, Some("group"), OptionMap::new()),
        node(
            "queue-a",
            ResourceKind::Queue,
            Some("namespace"),
            options(&[
                ("requires_session", json!(true)),
                ("default_message_time_to_live", json!("10m")),
                ("max_delivery_count", json!(40)),
            ]),
        ),
        node(
            "queue-b",
            ResourceKind::Queue,
            Some("namespace"),
            options(&[
                ("requires_duplicate_detection", json!(true)),
                ("duplicate_detection_history_time_window", json!("10m")),
                ("auto_delete_on_idle", json!("10m")),
            ]),
        ),
    ])
    .unwrap()
}

/// The scenario plan plus a send rule on `queue-a`.
pub fn scenario_plan_with_rule() -> Plan {
    let mut nodes = scenario_plan().nodes().to_vec();
    nodes.push(node(
        "queue-a-sender",
        ResourceKind::AuthorizationRule,
        Some("queue-a"),
        options(&[("rights", json!(["send"]))]),
    ));
    Plan::new(nodes).unwrap()
}

/// Shortens `queue-b`'s idle timeout.
pub fn queue_b_patch() -> OptionMap {
    options(&[("auto_delete_on_idle", json!("5m"))])
}

/// Collects every event emitted so far.
pub fn drain(receiver: &mut UnboundedReceiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
