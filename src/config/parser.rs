//! Scenario parser for loading configuration files.
//!
//! This module handles loading scenarios from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{ConfigError, LifecycleError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::ScenarioConfig;

/// Parser for loading scenario configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a scenario from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ScenarioConfig> {
        let path = path.as_ref();
        info!("Loading scenario from: {}", path.display());

        if !path.exists() {
            return Err(LifecycleError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            LifecycleError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a scenario from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ScenarioConfig> {
        debug!("Parsing YAML scenario");

        let config: ScenarioConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            LifecycleError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed scenario {} with {} resources",
            config.project.name,
            config.resources.len()
        );
        Ok(config)
    }

    /// Loads a scenario with environment variable overrides.
    ///
    /// Recognised variables: `LIFECYCLE_PROJECT_NAME`,
    /// `LIFECYCLE_PROJECT_ENVIRONMENT` and `LIFECYCLE_PROVIDER_ENDPOINT`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ScenarioConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut ScenarioConfig) {
        if let Ok(name) = std::env::var("LIFECYCLE_PROJECT_NAME") {
            debug!("Overriding project.name from environment");
            config.project.name = name;
        }

        if let Ok(env) = std::env::var("LIFECYCLE_PROJECT_ENVIRONMENT") {
            debug!("Overriding project.environment from environment");
            config.project.environment = env;
        }

        if let Ok(endpoint) = std::env::var("LIFECYCLE_PROVIDER_ENDPOINT") {
            debug!("Overriding provider.endpoint from environment");
            config.provider.endpoint = Some(endpoint);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                LifecycleError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Reads the API token from the named environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is not set or empty.
    pub fn get_api_token(var: &str) -> Result<String> {
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(LifecycleError::Config(ConfigError::MissingEnvVar {
                name: var.to_string(),
            })),
        }
    }
}

/// Default scenario file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "lifecycle.yaml",
    "lifecycle.yml",
    "scenario.yaml",
    "scenario.yml",
];

/// Finds the scenario file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no scenario file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found scenario file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(LifecycleError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
