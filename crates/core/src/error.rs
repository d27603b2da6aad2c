//! Error types shared across crates

use thiserror::Error;

/// Result alias using the core error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Requested schema is not part of the fixed registry
    #[error("Schema '{name}' not found. Available: {available}")]
    SchemaNotFound { name: String, available: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
