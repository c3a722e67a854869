//! Resource kinds and their option schemas.
//!
//! Every kind knows which parent kinds it may live under, which options it
//! accepts, which of those are fixed once the resource exists, and whether
//! deleting it removes its children on the provider side.

use serde::{Deserialize, Serialize};

/// Kind of a provisionable resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Container grouping all other resources.
    ResourceGroup,
    /// Messaging namespace.
    Namespace,
    /// Queue inside a namespace.
    Queue,
    /// Shared access authorization rule on a namespace or queue.
    AuthorizationRule,
}

/// Value type accepted by an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    /// Free-form string.
    String,
    /// Non-negative integer.
    Integer,
    /// Boolean flag.
    Boolean,
    /// Human-readable duration such as `10m` or `1h 30m`.
    Duration,
    /// List of access rights (`listen`, `send`, `manage`).
    Rights,
}

/// Schema entry for a single option.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    /// Option name as written in the scenario file.
    pub name: &'static str,
    /// Accepted value type.
    pub ty: OptionType,
    /// Whether the option is fixed once the resource is created.
    pub immutable: bool,
}

const fn opt(name: &'static str, ty: OptionType, immutable: bool) -> OptionSpec {
    OptionSpec {
        name,
        ty,
        immutable,
    }
}

const RESOURCE_GROUP_OPTIONS: &[OptionSpec] = &[opt("location", OptionType::String, true)];

const NAMESPACE_OPTIONS: &[OptionSpec] = &[
    opt("location", OptionType::String, true),
    opt("sku", OptionType::String, false),
    opt("zone_redundant", OptionType::Boolean, true),
];

const QUEUE_OPTIONS: &[OptionSpec] = &[
    opt("requires_session", OptionType::Boolean, true),
    opt("requires_duplicate_detection", OptionType::Boolean, true),
    opt("enable_partitioning", OptionType::Boolean, true),
    opt("duplicate_detection_history_time_window", OptionType::Duration, false),
    opt("default_message_time_to_live", OptionType::Duration, false),
    opt("auto_delete_on_idle", OptionType::Duration, false),
    opt("lock_duration", OptionType::Duration, false),
    opt("max_delivery_count", OptionType::Integer, false),
    opt("max_size_in_megabytes", OptionType::Integer, false),
    opt("dead_lettering_on_message_expiration", OptionType::Boolean, false),
    opt("enable_batched_operations", OptionType::Boolean, false),
];

const AUTHORIZATION_RULE_OPTIONS: &[OptionSpec] = &[opt("rights", OptionType::Rights, false)];

/// Access rights an authorization rule may grant.
pub const KNOWN_RIGHTS: &[&str] = &["listen", "send", "manage"];

/// Known namespace tiers.
pub const KNOWN_SKUS: &[&str] = &["basic", "standard", "premium"];

impl ResourceKind {
    /// All kinds, in the order they usually nest.
    pub const ALL: [Self; 4] = [
        Self::ResourceGroup,
        Self::Namespace,
        Self::Queue,
        Self::AuthorizationRule,
    ];

    /// Returns the snake-case identifier used in files and URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResourceGroup => "resource_group",
            Self::Namespace => "namespace",
            Self::Queue => "queue",
            Self::AuthorizationRule => "authorization_rule",
        }
    }

    /// Kinds this kind may be nested under. Empty means it must be a root.
    #[must_use]
    pub const fn allowed_parents(self) -> &'static [Self] {
        match self {
            Self::ResourceGroup => &[],
            Self::Namespace => &[Self::ResourceGroup],
            Self::Queue => &[Self::Namespace],
            Self::AuthorizationRule => &[Self::Namespace, Self::Queue],
        }
    }

    /// Option schema for this kind.
    #[must_use]
    pub const fn options(self) -> &'static [OptionSpec] {
        match self {
            Self::ResourceGroup => RESOURCE_GROUP_OPTIONS,
            Self::Namespace => NAMESPACE_OPTIONS,
            Self::Queue => QUEUE_OPTIONS,
            Self::AuthorizationRule => AUTHORIZATION_RULE_OPTIONS,
        }
    }

    /// Looks up the schema entry for an option.
    #[must_use]
    pub fn option(self, name: &str) -> Option<&'static OptionSpec> {
        self.options().iter().find(|o| o.name == name)
    }

    /// Returns true if the option cannot change after creation.
    #[must_use]
    pub fn is_immutable(self, name: &str) -> bool {
        self.option(name).is_some_and(|o| o.immutable)
    }

    /// Returns true if deleting a resource of this kind deletes its children.
    #[must_use]
    pub const fn cascades_delete(self) -> bool {
        !matches!(self, Self::AuthorizationRule)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown resource kind: {s}"))
    }
}
