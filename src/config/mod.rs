//! Configuration module for lifecycle scenarios.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `lifecycle.yaml`
//! - Resource kinds and their option schemas
//! - Validation of configuration values
//! - Computing configuration hashes for change detection

mod hash;
mod kind;
mod parser;
mod spec;
mod validator;

pub use hash::ConfigHasher;
pub use kind::{KNOWN_RIGHTS, KNOWN_SKUS, OptionSpec, OptionType, ResourceKind};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use spec::{
    CleanupConfig, CleanupStrategy, FaultConfig, FaultError, FaultOperation, OptionMap,
    ProjectConfig, ProviderConfig, ProviderType, ResourceConfig, ScenarioConfig,
    SimulationConfig, UpdateConfig,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult, parse_duration};
