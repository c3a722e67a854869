//! Planning module for orchestration runs.
//!
//! This module turns scenario declarations into a dependency-ordered plan of
//! resource nodes and tracks each node's lifecycle state during a run.

mod node;
mod plan;

pub use node::{NodeError, NodeState, ResourceNode};
pub use plan::Plan;
