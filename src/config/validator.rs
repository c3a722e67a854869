//! Configuration validation for lifecycle scenarios.
//!
//! This module validates a scenario before anything is provisioned, collecting
//! every error and warning instead of stopping at the first one.

use crate::error::{ConfigError, LifecycleError, Result};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

use super::kind::{KNOWN_RIGHTS, KNOWN_SKUS, OptionType, ResourceKind};
use super::spec::{OptionMap, ProviderType, ScenarioConfig};

/// Maximum length of a resource name.
const MAX_NAME_LEN: usize = 50;

/// Validator for scenario configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a scenario configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, config: &ScenarioConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if let Some(first_error) = result.errors.first() {
            return Err(LifecycleError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }));
        }

        debug!("Scenario validation passed");
        Ok(result)
    }

    /// Runs every check and returns all findings without failing.
    #[must_use]
    pub fn check(&self, config: &ScenarioConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_project(config, &mut result);
        Self::validate_provider(config, &mut result);
        Self::validate_resources(config, &mut result);
        Self::validate_updates(config, &mut result);

        result
    }

    /// Validates project configuration.
    fn validate_project(config: &ScenarioConfig, result: &mut ValidationResult) {
        if config.project.name.is_empty() {
            result.error("project.name", "Project name cannot be empty");
        } else if !is_valid_name(&config.project.name) {
            result.error(
                "project.name",
                format!(
                    "Project name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    config.project.name
                ),
            );
        }

        if config.project.environment.is_empty() {
            result.error("project.environment", "Environment cannot be empty");
        }
    }

    /// Validates provider configuration.
    fn validate_provider(config: &ScenarioConfig, result: &mut ValidationResult) {
        let provider = &config.provider;

        if provider.provider_type == ProviderType::Http {
            match provider.endpoint.as_deref() {
                None | Some("") => result.error(
                    "provider.endpoint",
                    "An endpoint is required when using the http provider",
                ),
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    result.error(
                        "provider.endpoint",
                        format!("Endpoint '{url}' must start with http:// or https://"),
                    );
                }
                Some(_) => {}
            }

            if !provider.simulate.faults.is_empty() {
                result
                    .warnings
                    .push(String::from("provider.simulate is ignored by the http provider"));
            }
        }

        if provider.token_env.is_empty() {
            result.error("provider.token_env", "Token variable name cannot be empty");
        }

        if provider.poll_interval_ms == 0 {
            result.error("provider.poll_interval_ms", "Poll interval must be positive");
        }

        for (i, fault) in provider.simulate.faults.iter().enumerate() {
            let needs_resource = !matches!(fault.operation, super::spec::FaultOperation::Connect);
            if needs_resource && config.resource(&fault.resource).is_none() {
                result.warnings.push(format!(
                    "provider.simulate.faults[{i}]: resource '{}' is not declared",
                    fault.resource
                ));
            }
        }
    }

    /// Validates all resource declarations.
    fn validate_resources(config: &ScenarioConfig, result: &mut ValidationResult) {
        if config.resources.is_empty() {
            result
                .warnings
                .push(String::from("No resources defined in scenario"));
            return;
        }

        let kinds: HashMap<&str, ResourceKind> = config
            .resources
            .iter()
            .map(|r| (r.name.as_str(), r.kind))
            .collect();
        let mut seen_names = HashSet::new();

        for (i, resource) in config.resources.iter().enumerate() {
            let prefix = format!("resources[{i}]");

            if !seen_names.insert(resource.name.as_str()) {
                result.error(
                    format!("{prefix}.name"),
                    format!("Duplicate resource name: {}", resource.name),
                );
            }

            if !is_valid_name(&resource.name) {
                result.error(
                    format!("{prefix}.name"),
                    format!(
                        "Resource name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                        resource.name
                    ),
                );
            }

            Self::validate_parent(resource.kind, resource.parent.as_deref(), &kinds, &prefix, result);
            Self::validate_options(
                resource.kind,
                &resource.config,
                &format!("{prefix}.config"),
                result,
            );

            if resource.kind == ResourceKind::Queue {
                Self::validate_queue_consistency(&resource.config, &prefix, result);
            }
        }
    }

    /// Validates that a parent exists and is of a compatible kind.
    fn validate_parent(
        kind: ResourceKind,
        parent: Option<&str>,
        kinds: &HashMap<&str, ResourceKind>,
        prefix: &str,
        result: &mut ValidationResult,
    ) {
        let allowed = kind.allowed_parents();

        match parent {
            None if !allowed.is_empty() => result.error(
                format!("{prefix}.parent"),
                format!("A {kind} requires a parent"),
            ),
            None => {}
            Some(parent) => match kinds.get(parent) {
                None => result.error(
                    format!("{prefix}.parent"),
                    format!("Unknown parent resource '{parent}'"),
                ),
                Some(parent_kind) if !allowed.contains(parent_kind) => result.error(
                    format!("{prefix}.parent"),
                    format!("A {kind} cannot be placed under a {parent_kind}"),
                ),
                Some(_) => {}
            },
        }
    }

    /// Validates option names and value types for a kind.
    fn validate_options(
        kind: ResourceKind,
        options: &OptionMap,
        prefix: &str,
        result: &mut ValidationResult,
    ) {
        for (name, value) in options {
            let field = format!("{prefix}.{name}");

            let Some(spec) = kind.option(name) else {
                result.error(field, format!("Unknown option '{name}' for {kind}"));
                continue;
            };

            if let Err(message) = check_value(spec.ty, value) {
                result.error(field, message);
                continue;
            }

            if name == "sku"
                && let Some(sku) = value.as_str()
                && !KNOWN_SKUS.contains(&sku)
            {
                result
                    .warnings
                    .push(format!("{field}: Unknown sku '{sku}'. This may be rejected."));
            }
        }
    }

    /// Checks cross-option rules for queues.
    fn validate_queue_consistency(options: &OptionMap, prefix: &str, result: &mut ValidationResult) {
        let dedupe_enabled = options
            .get("requires_duplicate_detection")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        if options.contains_key("duplicate_detection_history_time_window") && !dedupe_enabled {
            result.warnings.push(format!(
                "{prefix}.config.duplicate_detection_history_time_window has no effect \
                 without requires_duplicate_detection"
            ));
        }

        if let Some(count) = options
            .get("max_delivery_count")
            .and_then(serde_json::Value::as_u64)
            && count == 0
        {
            result.error(
                format!("{prefix}.config.max_delivery_count"),
                "max_delivery_count must be at least 1",
            );
        }
    }

    /// Validates post-provisioning updates.
    fn validate_updates(config: &ScenarioConfig, result: &mut ValidationResult) {
        for (i, update) in config.updates.iter().enumerate() {
            let prefix = format!("updates[{i}]");

            let Some(target) = config.resource(&update.resource) else {
                result.error(
                    format!("{prefix}.resource"),
                    format!("Update targets unknown resource '{}'", update.resource),
                );
                continue;
            };

            if update.patch.is_empty() {
                result.warnings.push(format!("{prefix}.patch is empty"));
            }

            Self::validate_options(target.kind, &update.patch, &format!("{prefix}.patch"), result);

            for (name, value) in &update.patch {
                if target.kind.is_immutable(name) && target.config.get(name) != Some(value) {
                    result.error(
                        format!("{prefix}.patch.{name}"),
                        format!(
                            "Option '{name}' of '{}' cannot be changed after creation",
                            target.name
                        ),
                    );
                }
            }
        }
    }
}

impl ValidationResult {
    /// Returns true if no errors were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Checks a single option value against its declared type.
fn check_value(ty: OptionType, value: &serde_json::Value) -> std::result::Result<(), String> {
    match ty {
        OptionType::String => value
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|_| ())
            .ok_or_else(|| String::from("Expected a non-empty string")),
        OptionType::Integer => value
            .as_u64()
            .map(|_| ())
            .ok_or_else(|| String::from("Expected a non-negative integer")),
        OptionType::Boolean => value
            .as_bool()
            .map(|_| ())
            .ok_or_else(|| String::from("Expected true or false")),
        OptionType::Duration => {
            let raw = value
                .as_str()
                .ok_or_else(|| String::from("Expected a duration such as \"10m\""))?;
            parse_duration(raw).map(|_| ())
        }
        OptionType::Rights => check_rights(value),
    }
}

/// Checks an authorization rights list.
fn check_rights(value: &serde_json::Value) -> std::result::Result<(), String> {
    let rights = value
        .as_array()
        .ok_or_else(|| String::from("Expected a list of rights"))?;

    if rights.is_empty() {
        return Err(String::from("At least one right is required"));
    }

    let mut granted = HashSet::new();
    for right in rights {
        let right = right
            .as_str()
            .ok_or_else(|| String::from("Rights must be strings"))?;
        if !KNOWN_RIGHTS.contains(&right) {
            return Err(format!(
                "Unknown right '{right}'. Expected one of: {}",
                KNOWN_RIGHTS.join(", ")
            ));
        }
        granted.insert(right);
    }

    if granted.contains("manage") && !(granted.contains("listen") && granted.contains("send")) {
        return Err(String::from("The manage right requires listen and send"));
    }

    Ok(())
}

/// Parses a human-readable duration such as `10m` or `1h 30m`.
///
/// # Errors
///
/// Returns a message describing why the value is not a valid positive duration.
pub fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    let duration =
        humantime::parse_duration(raw).map_err(|e| format!("Invalid duration '{raw}': {e}"))?;

    if duration.is_zero() {
        return Err(format!("Duration '{raw}' must be positive"));
    }

    Ok(duration)
}

/// Checks if a name is valid (lowercase alphanumeric with hyphens).
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }

    let mut chars = name.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_lowercase());

    starts_with_letter
        && !name.ends_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
