//! Execution plan construction and ordering.
//!
//! A [`Plan`] is the dependency-ordered forest of nodes for one run. Nodes
//! are stored in creation order; deletion order is derived by reversing it.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::config::ScenarioConfig;
use crate::error::{PlanError, Result};

use super::node::{NodeState, ResourceNode};

/// Dependency-ordered set of nodes for one orchestration run.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Nodes in creation order.
    nodes: Vec<ResourceNode>,
    /// Name to position lookup.
    index: HashMap<String, usize>,
}

impl Plan {
    /// Builds a plan from nodes in any order.
    ///
    /// Nodes are sorted so that every parent precedes its children. Among
    /// nodes whose dependencies are satisfied, declaration order is kept.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate names, unknown parents, or cycles.
    pub fn new(nodes: Vec<ResourceNode>) -> Result<Self> {
        let mut names = HashSet::new();
        for node in &nodes {
            if !names.insert(node.name.as_str()) {
                return Err(PlanError::DuplicateName {
                    name: node.name.clone(),
                }
                .into());
            }
        }

        for node in &nodes {
            if let Some(parent) = &node.parent
                && !names.contains(parent.as_str())
            {
                return Err(PlanError::UnknownParent {
                    name: node.name.clone(),
                    parent: parent.clone(),
                }
                .into());
            }
        }

        let ordered = Self::sort(nodes)?;
        let index = ordered
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.clone(), i))
            .collect();

        Ok(Self {
            nodes: ordered,
            index,
        })
    }

    /// Builds a plan from a scenario's resource declarations.
    ///
    /// # Errors
    ///
    /// Returns an error if the declarations do not form a forest.
    pub fn from_config(config: &ScenarioConfig) -> Result<Self> {
        let plan = Self::new(config.resources.iter().map(ResourceNode::from).collect())?;
        debug!("Built plan with {} nodes", plan.len());
        Ok(plan)
    }

    /// Stable topological sort over the parent relation.
    fn sort(nodes: Vec<ResourceNode>) -> Result<Vec<ResourceNode>> {
        let mut remaining: Vec<Option<ResourceNode>> = nodes.into_iter().map(Some).collect();
        let mut placed: HashSet<String> = HashSet::new();
        let mut ordered = Vec::with_capacity(remaining.len());

        while ordered.len() < remaining.len() {
            let ready = remaining.iter().position(|slot| {
                slot.as_ref().is_some_and(|n| {
                    n.parent.as_ref().is_none_or(|p| placed.contains(p))
                })
            });

            let Some(position) = ready else {
                return Err(PlanError::CircularDependency {
                    cycle: Self::describe_cycle(&remaining),
                }
                .into());
            };

            if let Some(node) = remaining[position].take() {
                placed.insert(node.name.clone());
                ordered.push(node);
            }
        }

        Ok(ordered)
    }

    /// Describes one cycle among the unplaced nodes.
    fn describe_cycle(remaining: &[Option<ResourceNode>]) -> String {
        let parents: HashMap<&str, &str> = remaining
            .iter()
            .flatten()
            .filter_map(|n| n.parent.as_deref().map(|p| (n.name.as_str(), p)))
            .collect();

        let Some(start) = remaining.iter().flatten().next() else {
            return String::new();
        };

        let mut path = vec![start.name.as_str()];
        let mut current = start.name.as_str();
        while let Some(&parent) = parents.get(current) {
            if let Some(pos) = path.iter().position(|n| *n == parent) {
                let mut cycle: Vec<&str> = path[pos..].to_vec();
                cycle.push(parent);
                return cycle.join(" -> ");
            }
            path.push(parent);
            current = parent;
        }

        path.join(" -> ")
    }

    /// All nodes in creation order.
    #[must_use]
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    /// Number of nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the plan has no nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a node by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&ResourceNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Position of a node in creation order.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn node_mut(&mut self, name: &str) -> Option<&mut ResourceNode> {
        self.index.get(name).map(|&i| &mut self.nodes[i])
    }

    pub(crate) fn node_at_mut(&mut self, position: usize) -> &mut ResourceNode {
        &mut self.nodes[position]
    }

    /// Nodes in creation (forward dependency) order.
    pub fn creation_order(&self) -> impl DoubleEndedIterator<Item = &ResourceNode> {
        self.nodes.iter()
    }

    /// Nodes in deletion (reverse dependency) order.
    pub fn deletion_order(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter().rev()
    }

    /// Parent of the named node.
    #[must_use]
    pub fn parent_of(&self, name: &str) -> Option<&ResourceNode> {
        self.node(name)
            .and_then(|n| n.parent.as_deref())
            .and_then(|p| self.node(p))
    }

    /// Direct children of the named node, in creation order.
    #[must_use]
    pub fn children_of(&self, name: &str) -> Vec<&ResourceNode> {
        self.nodes
            .iter()
            .filter(|n| n.parent.as_deref() == Some(name))
            .collect()
    }

    /// Ancestors of the named node, nearest first.
    #[must_use]
    pub fn ancestors(&self, name: &str) -> Vec<&ResourceNode> {
        let mut ancestors = Vec::new();
        let mut current = self.parent_of(name);
        while let Some(node) = current {
            ancestors.push(node);
            current = self.parent_of(&node.name);
        }
        ancestors
    }

    /// Number of nodes in the given state.
    #[must_use]
    pub fn count_in(&self, state: NodeState) -> usize {
        self.nodes.iter().filter(|n| n.state() == state).count()
    }

    /// Nodes that cleanup must still delete.
    #[must_use]
    pub fn needing_cleanup(&self) -> Vec<&ResourceNode> {
        self.nodes.iter().filter(|n| n.needs_cleanup()).collect()
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.nodes.is_empty() {
            return write!(f, "Empty plan");
        }

        writeln!(f, "Plan ({} resources):", self.nodes.len())?;
        for (i, node) in self.nodes.iter().enumerate() {
            write!(f, "  {}. {} {}", i + 1, node.kind, node.name)?;
            if let Some(parent) = &node.parent {
                write!(f, " (in {parent})")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
