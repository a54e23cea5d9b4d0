//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file, apply environment fallbacks
    /// and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        let config = config.apply_env_fallbacks();
        config.validate()?;
        Ok(config)
    }

    /// Fill unset connection fields from environment variables.
    ///
    /// Precedence: explicit config value, then environment variable,
    /// then built-in default.
    pub fn apply_env_fallbacks(mut self) -> Self {
        env_fallback(&mut self.source.host, "ORACLE_HOST");
        env_fallback_port(&mut self.source.port, "ORACLE_PORT");
        env_fallback(&mut self.source.service_name, "ORACLE_SERVICE_NAME");
        env_fallback(&mut self.source.username, "ORACLE_USERNAME");
        env_fallback(&mut self.source.password, "ORACLE_PASSWORD");
        env_fallback(&mut self.source.schema, "ORACLE_SCHEMA");

        env_fallback(&mut self.target.host, "PG_HOST");
        env_fallback_port(&mut self.target.port, "PG_PORT");
        env_fallback(&mut self.target.database, "PG_DATABASE");
        env_fallback(&mut self.target.username, "PG_USERNAME");
        env_fallback(&mut self.target.password, "PG_PASSWORD");
        env_fallback(&mut self.target.schema, "PG_SCHEMA");

        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

fn env_fallback(field: &mut String, var: &str) {
    if field.is_empty() {
        if let Ok(value) = std::env::var(var) {
            *field = value;
        }
    }
}

fn env_fallback_port(field: &mut Option<u16>, var: &str) {
    if field.is_none() {
        if let Some(port) = std::env::var(var).ok().and_then(|v| v.parse().ok()) {
            *field = Some(port);
        }
    }
}
