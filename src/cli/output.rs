//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{ScenarioConfig, ValidationResult};
use crate::orchestrator::{CleanupOutcome, LifecycleEvent, RunReport};
use crate::planner::{NodeState, Plan};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Parent")]
    parent: String,
}

/// Per-node result row for table display.
#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Updates")]
    updates: u32,
    #[tabled(rename = "Error")]
    error: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &Plan, scenario_hash: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let mut json = PlanJson::from(plan);
                json.scenario_hash = scenario_hash.to_string();
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan, scenario_hash),
        }
    }

    fn format_plan_text(plan: &Plan, scenario_hash: &str) -> String {
        if plan.is_empty() {
            return format!("{} Scenario declares no resources.\n", "✓".green());
        }

        let mut output = String::from("\n📋 Execution Plan\n");
        let _ = write!(
            output,
            "   Scenario hash: {}\n\n",
            Self::truncate(scenario_hash, 8)
        );

        let rows: Vec<PlanRow> = plan
            .creation_order()
            .enumerate()
            .map(|(i, n)| PlanRow {
                index: i + 1,
                name: n.name.clone(),
                kind: n.kind.to_string(),
                parent: n.parent.clone().unwrap_or_else(|| String::from("-")),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let deletion: Vec<&str> = plan.deletion_order().map(|n| n.name.as_str()).collect();
        let _ = write!(
            output,
            "\nPlan: {} to create, then delete in order: {}\n",
            plan.len().to_string().green(),
            deletion.join(" → ")
        );

        output
    }

    /// Formats a validation result with a short scenario summary.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &ScenarioConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.is_valid(),
                "project": config.qualified_name(),
                "resources": config.resources.len(),
                "updates": config.updates.len(),
                "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "warnings": result.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Scenario is valid!\n", "✓".green())
                } else {
                    let mut out = format!("{} Scenario is invalid:\n", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(out, "   - {error}");
                    }
                    out
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                let _ = write!(output, "\nScenario summary:\n");
                let _ = writeln!(output, "   Project: {}", config.qualified_name());
                let _ = writeln!(output, "   Provider: {}", config.provider.provider_type);
                let _ = writeln!(output, "   Resources: {}", config.resources.len());
                let _ = writeln!(output, "   Updates: {}", config.updates.len());
                let _ = writeln!(output, "   Cleanup: {}", config.cleanup.strategy);
                output
            }
        }
    }

    /// Formats a single progress event.
    #[must_use]
    pub fn format_event(&self, event: &LifecycleEvent) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(event).unwrap_or_default(),
            OutputFormat::Text => Self::format_event_text(event),
        }
    }

    fn format_event_text(event: &LifecycleEvent) -> String {
        match event {
            LifecycleEvent::RunStarted { run_id, nodes } => {
                format!("▶ Run {} started ({nodes} resources)", Self::truncate(run_id, 8))
            }
            LifecycleEvent::NodeCreated { name, kind } => {
                format!("  {} created {kind} {name}", "+".green())
            }
            LifecycleEvent::NodeCreateFailed {
                name,
                kind,
                error_kind,
                message,
            } => format!(
                "  {} failed to create {kind} {name} [{error_kind}]: {message}",
                "✗".red()
            ),
            LifecycleEvent::NodeSkipped { name, kind } => {
                format!("  {} skipped {kind} {name}", "-".dimmed())
            }
            LifecycleEvent::NodeUpdated {
                name,
                kind,
                changed,
            } => {
                if *changed {
                    format!("  {} updated {kind} {name}", "~".yellow())
                } else {
                    format!("  {} {kind} {name} already up to date", "=".dimmed())
                }
            }
            LifecycleEvent::NodeUpdateFailed {
                name,
                error_kind,
                message,
            } => format!("  {} failed to update {name} [{error_kind}]: {message}", "✗".red()),
            LifecycleEvent::NodeMissing { name, kind } => {
                format!("  {} {kind} {name} not found by provider", "⚠".yellow())
            }
            LifecycleEvent::CleanupStarted { pending } => {
                format!("🧹 Cleanup started ({pending} to delete)")
            }
            LifecycleEvent::NodeDeleted { name, kind } => {
                format!("  {} deleted {kind} {name}", "-".red())
            }
            LifecycleEvent::NodeAlreadyDeleted { name, kind } => {
                format!("  {} {kind} {name} was already deleted", "-".dimmed())
            }
            LifecycleEvent::NodeCascadeDeleted {
                name,
                kind,
                ancestor,
            } => format!("  {} {kind} {name} removed with {ancestor}", "-".dimmed()),
            LifecycleEvent::NodeDeleteFailed {
                name,
                kind,
                error_kind,
                message,
            } => format!(
                "  {} failed to delete {kind} {name} [{error_kind}]: {message}",
                "⚠".yellow()
            ),
            LifecycleEvent::CleanupFinished { deleted, failed } => {
                format!("🧹 Cleanup finished ({deleted} deleted, {failed} failed)")
            }
            LifecycleEvent::RunCancelled { next } => {
                format!("{} Run cancelled before {next}", "⚠".yellow())
            }
            LifecycleEvent::RunFinished { success, .. } => {
                if *success {
                    format!("{} Run finished", "✓".green())
                } else {
                    format!("{} Run finished with failures", "✗".red())
                }
            }
        }
    }

    /// Formats the final run report.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &RunReport) -> String {
        let mut output = String::new();

        let status = if report.success() {
            format!("{} Run succeeded", "✓".green())
        } else {
            format!("{} Run failed", "✗".red())
        };
        let _ = write!(
            output,
            "\n{status} ({}, {} ms)\n\n",
            Self::truncate(&report.run_id, 8),
            report.duration().num_milliseconds()
        );

        let rows: Vec<NodeRow> = report
            .nodes
            .iter()
            .map(|n| NodeRow {
                name: n.name.clone(),
                kind: n.kind.to_string(),
                state: Self::format_state(n.state, n.was_created),
                updates: n.updates_applied,
                error: n
                    .error
                    .as_ref()
                    .map(|e| Self::truncate(&e.message, 50))
                    .unwrap_or_default(),
            })
            .collect();

        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if let Some(failure) = &report.failure {
            let _ = write!(output, "\nStopped during {}", failure.stage);
            if let Some(node) = &failure.node {
                let _ = write!(output, " at {node}");
            }
            let _ = writeln!(output, ": {}", failure.error);
        }

        if !report.missing.is_empty() {
            let _ = writeln!(
                output,
                "\n{} Not found after provisioning: {}",
                "⚠".yellow(),
                report.missing.join(", ")
            );
        }

        let cleanup = &report.cleanup;
        match cleanup.outcome() {
            CleanupOutcome::NothingToClean => {
                let _ = writeln!(output, "\nCleanup: nothing to clean up");
            }
            CleanupOutcome::Clean => {
                let _ = writeln!(
                    output,
                    "\nCleanup: {} removed ({} deleted, {} already gone, {} cascaded)",
                    cleanup.removed().to_string().green(),
                    cleanup.deleted.len(),
                    cleanup.already_deleted.len(),
                    cleanup.cascaded.len()
                );
            }
            CleanupOutcome::Failed => {
                let _ = write!(
                    output,
                    "\n{} Cleanup failed for {} resources:\n",
                    "⚠".yellow(),
                    cleanup.errors.len()
                );
                for failure in &cleanup.errors {
                    let _ = writeln!(
                        output,
                        "   - {} {}: {}",
                        failure.kind, failure.name, failure.error
                    );
                }
            }
        }

        let leaked = report.leaked();
        if !leaked.is_empty() {
            let _ = writeln!(
                output,
                "\n{} Left behind: {}",
                "✗".red(),
                leaked.join(", ")
            );
        }

        output
    }

    fn format_state(state: NodeState, was_created: bool) -> String {
        match state {
            NodeState::Deleted if was_created => "deleted".green().to_string(),
            NodeState::Deleted => "deleted (partial)".yellow().to_string(),
            NodeState::Created => "created".yellow().to_string(),
            NodeState::Failed => "failed".red().to_string(),
            NodeState::Pending => "pending".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct PlanJson {
    scenario_hash: String,
    resources: usize,
    creation_order: Vec<PlanNodeJson>,
    deletion_order: Vec<String>,
}

#[derive(serde::Serialize)]
struct PlanNodeJson {
    name: String,
    kind: String,
    parent: Option<String>,
}

impl From<&Plan> for PlanJson {
    fn from(plan: &Plan) -> Self {
        Self {
            scenario_hash: String::new(),
            resources: plan.len(),
            creation_order: plan
                .creation_order()
                .map(|n| PlanNodeJson {
                    name: n.name.clone(),
                    kind: n.kind.to_string(),
                    parent: n.parent.clone(),
                })
                .collect(),
            deletion_order: plan.deletion_order().map(|n| n.name.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OptionMap, ResourceKind};
    use crate::planner::ResourceNode;

    fn plan() -> Plan {
        Plan::new(vec![
            ResourceNode::new("rg", ResourceKind::ResourceGroup, None, OptionMap::new()),
            ResourceNode::new("ns", ResourceKind::Namespace, Some(String::from("rg")), OptionMap::new()),
        ])
        .unwrap()
    }

    #[test]
    fn test_plan_json_lists_both_orders() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json: serde_json::Value =
            serde_json::from_str(&formatter.format_plan(&plan(), "abc123")).unwrap();

        assert_eq!(json["scenario_hash"], "abc123");
        assert_eq!(json["resources"], 2);
        assert_eq!(json["creation_order"][0]["name"], "rg");
        assert_eq!(json["deletion_order"][0], "ns");
    }

    #[test]
    fn test_text_event_mentions_node() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let line = formatter.format_event(&LifecycleEvent::NodeAlreadyDeleted {
            name: String::from("rule"),
            kind: ResourceKind::AuthorizationRule,
        });
        assert_eq!(line, "  - authorization_rule rule was already deleted");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("ééééééééééé", 6), "ééé...");
    }
}
