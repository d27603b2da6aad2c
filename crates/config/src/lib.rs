//! Configuration management for the expense agent
//!
//! Supports loading configuration from:
//! - TOML/YAML files under `config/` (`default`, then `{env}`)
//! - Environment variables (`EXPENSE_AGENT__SECTION__KEY`)
//! - Runtime overrides via the builder methods on each section

pub mod constants;
pub mod llm;
pub mod pipeline;
pub mod settings;

pub use llm::LlmSettings;
pub use pipeline::{PipelineConfig, RetryPolicy};
pub use settings::{
    load_settings, load_settings_from, ObservabilityConfig, RuntimeEnvironment, ServerConfig,
    Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
