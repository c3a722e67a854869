//! Resource lifecycle orchestration.
//!
//! This module drives a [`Plan`](crate::planner::Plan) against a provider:
//! - Forward provisioning in dependency order, stopping at the first failure
//! - Idempotent updates of created nodes
//! - Best-effort cleanup that runs exactly once per run
//! - Structured events and a final run report

mod cleanup;
mod engine;
mod events;
#[cfg(test)]
mod fixtures;
mod report;

pub use engine::Orchestrator;
pub use events::{ChannelSink, EventSink, LifecycleEvent, TracingSink};
pub use report::{
    CleanupFailure, CleanupOutcome, CleanupReport, NodeSummary, RunFailure, RunReport, RunStage,
};
