//! Configuration system for EvalForge.
//!
//! Load compiler, engine and conformance settings from TOML or YAML files
//! without code changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use evalforge_config::{EngineKind, EvalConfig, OptLevel};
//!
//! let config = EvalConfig::from_toml_str(r#"
//!     engine = "production"
//!
//!     [jit]
//!     opt_level = "speed"
//!     verify = true
//!
//!     [conformance]
//!     min_pass_count = 1000
//!     print_fail = true
//! "#).unwrap();
//!
//! assert_eq!(config.engine, EngineKind::Production);
//! assert_eq!(config.jit.opt_level, OptLevel::Speed);
//! assert_eq!(config.conformance.min_pass_count, 1000);
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use evalforge_config::EvalConfig;
//!
//! let config = EvalConfig::load("evalforge.toml").unwrap_or_default();
//! // Proceeds with defaults if file doesn't exist
//! ```

#[cfg(test)]
mod tests;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EvalConfig {
    /// Native compiler settings.
    #[serde(default)]
    pub jit: JitConfig,

    /// Tensor engine used when an expression cannot be compiled.
    #[serde(default)]
    pub engine: EngineKind,

    /// Conformance harness settings.
    #[serde(default)]
    pub conformance: ConformanceConfig,
}

impl EvalConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist, contains invalid TOML, or fails
    /// validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the Cranelift optimization level.
    pub fn with_opt_level(mut self, opt_level: OptLevel) -> Self {
        self.jit.opt_level = opt_level;
        self
    }

    /// Sets the fallback tensor engine.
    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the minimum number of passing conformance cases.
    pub fn with_min_pass_count(mut self, count: usize) -> Self {
        self.conformance.min_pass_count = count;
        self
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.conformance.validate()
    }
}

/// Native compiler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct JitConfig {
    /// Cranelift optimization level.
    #[serde(default)]
    pub opt_level: OptLevel,

    /// Run the Cranelift IR verifier on every compiled function.
    #[serde(default = "default_verify")]
    pub verify: bool,
}

fn default_verify() -> bool {
    cfg!(debug_assertions)
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::default(),
            verify: default_verify(),
        }
    }
}

/// Cranelift optimization level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    /// No optimization.
    None,

    /// Optimize for speed.
    #[default]
    Speed,

    /// Optimize for speed and code size.
    SpeedAndSize,
}

impl OptLevel {
    /// Name of the level as understood by Cranelift's `opt_level` setting.
    pub fn as_cranelift_str(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

/// Tensor engine selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Straightforward reference implementation.
    Reference,

    /// Dense, stride-based production implementation.
    #[default]
    Production,
}

/// Conformance harness configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ConformanceConfig {
    /// Log every passing case.
    pub print_pass: bool,

    /// Log every failing case.
    pub print_fail: bool,

    /// Minimum number of passing cases for a conformant run.
    pub min_pass_count: usize,

    /// Relative tolerance for finite results.
    pub relative_epsilon: f64,

    /// Absolute tolerance for finite results.
    pub absolute_epsilon: f64,

    /// Run cases on the rayon thread pool.
    pub parallel: bool,
}

impl Default for ConformanceConfig {
    fn default() -> Self {
        Self {
            print_pass: false,
            print_fail: true,
            min_pass_count: 1000,
            relative_epsilon: 1e-9,
            absolute_epsilon: 1e-12,
            parallel: false,
        }
    }
}

impl ConformanceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.relative_epsilon >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "conformance.relative_epsilon must be >= 0, got {}",
                self.relative_epsilon
            )));
        }
        if !(self.absolute_epsilon >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "conformance.absolute_epsilon must be >= 0, got {}",
                self.absolute_epsilon
            )));
        }
        Ok(())
    }
}
