//! Generative backend integration
//!
//! Features:
//! - Interchangeable backends (local Ollama, Groq, OpenAI) behind one trait
//! - Schema-constrained JSON generation with fence stripping
//! - Caller-driven cancellation
//! - Provider selection from settings

pub mod backend;
pub mod cancel;
pub mod factory;
pub mod ollama;
pub mod openai;

pub use backend::{
    parse_structured, structured_prompt, GenerateRequest, LlmBackend, ModelRole,
    StructuredRequest,
};
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use factory::{BackendHandle, LlmFactory, LlmProvider};
pub use ollama::{OllamaBackend, OllamaConfig};
pub use openai::{OpenAIBackend, OpenAIConfig};

use thiserror::Error;

/// Backend errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend timed out: {0}")]
    BackendTimeout(String),

    #[error("Backend rejected request (HTTP {status}): {body}")]
    BackendRejected { status: u16, body: String },

    #[error("Invalid JSON response from LLM: {reason}")]
    MalformedStructuredOutput { reason: String, raw: String },

    #[error("Unknown LLM provider: {0}")]
    UnsupportedProvider(String),

    #[error("{env_var} not configured for provider {provider}")]
    MissingCredential { provider: String, env_var: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Transport-level failures that may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::BackendUnavailable(_) | LlmError::BackendTimeout(_)
        )
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, LlmError::MalformedStructuredOutput { .. })
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::BackendTimeout(err.to_string())
        } else if let Some(status) = err.status() {
            LlmError::BackendRejected {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            LlmError::BackendUnavailable(err.to_string())
        }
    }
}

impl From<LlmError> for expense_agent_core::Error {
    fn from(err: LlmError) -> Self {
        expense_agent_core::Error::Llm(err.to_string())
    }
}
