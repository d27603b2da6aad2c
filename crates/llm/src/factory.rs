//! Backend factory
//!
//! Selects one backend variant from settings and builds it.
//!
//! ## Supported Providers
//! - **Ollama** (`ollama`, `local`): self-hosted, no credential
//! - **Groq** (`groq`): OpenAI-compatible cloud API
//! - **OpenAI** (`openai`)
//!
//! ## Example
//! ```ignore
//! let handle = LlmFactory::select_backend(&settings.llm)?;
//! let backend = LlmFactory::create(&handle)?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use expense_agent_config::constants::credentials;
use expense_agent_config::LlmSettings;

use crate::backend::LlmBackend;
use crate::ollama::{OllamaBackend, OllamaConfig};
use crate::openai::{OpenAIBackend, OpenAIConfig};
use crate::LlmError;

/// Backend provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    Groq,
    OpenAI,
}

impl LlmProvider {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" | "local" => Some(LlmProvider::Ollama),
            "groq" => Some(LlmProvider::Groq),
            "openai" => Some(LlmProvider::OpenAI),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "ollama",
            LlmProvider::Groq => "groq",
            LlmProvider::OpenAI => "openai",
        }
    }

    pub fn requires_credential(&self) -> bool {
        !matches!(self, LlmProvider::Ollama)
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved configuration for the selected backend
#[derive(Clone, PartialEq)]
pub struct BackendHandle {
    pub provider: LlmProvider,
    pub base_url: String,
    pub extraction_model: String,
    pub validation_model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandle")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("extraction_model", &self.extraction_model)
            .field("validation_model", &self.validation_model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Backend factory
pub struct LlmFactory;

impl LlmFactory {
    /// Resolve settings into a handle for exactly one provider.
    ///
    /// Keys come from settings first, then from `GROQ_API_KEY` /
    /// `OPENAI_API_KEY`.
    pub fn select_backend(settings: &LlmSettings) -> Result<BackendHandle, LlmError> {
        let provider = LlmProvider::from_name(&settings.provider)
            .ok_or_else(|| LlmError::UnsupportedProvider(settings.provider.clone()))?;

        let api_key = if provider.requires_credential() {
            Some(Self::resolve_credential(settings, provider)?)
        } else {
            None
        };

        let (base_url, extraction_model, validation_model) = match provider {
            LlmProvider::Ollama => (
                settings.ollama_base_url.clone(),
                settings.ollama_model_extraction.clone(),
                settings.ollama_model_validation.clone(),
            ),
            LlmProvider::Groq => (
                settings.groq_base_url.clone(),
                settings.groq_model.clone(),
                settings.groq_model.clone(),
            ),
            LlmProvider::OpenAI => (
                settings.openai_base_url.clone(),
                settings.openai_model.clone(),
                settings.openai_model.clone(),
            ),
        };

        let handle = BackendHandle {
            provider,
            base_url,
            extraction_model,
            validation_model,
            api_key,
            timeout: settings.timeout(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        };

        tracing::info!(
            provider = %handle.provider,
            base_url = %handle.base_url,
            model = %handle.extraction_model,
            "Selected LLM backend"
        );

        Ok(handle)
    }

    /// Build the backend described by `handle`
    pub fn create(handle: &BackendHandle) -> Result<Arc<dyn LlmBackend>, LlmError> {
        match handle.provider {
            LlmProvider::Ollama => {
                let config = OllamaConfig {
                    endpoint: handle.base_url.clone(),
                    extraction_model: handle.extraction_model.clone(),
                    validation_model: handle.validation_model.clone(),
                    temperature: handle.temperature,
                    max_tokens: handle.max_tokens,
                    timeout: handle.timeout,
                };
                Ok(Arc::new(OllamaBackend::new(config)?))
            }
            LlmProvider::Groq | LlmProvider::OpenAI => {
                let api_key = handle.api_key.clone().ok_or_else(|| missing(handle.provider))?;
                let config = OpenAIConfig {
                    provider: handle.provider.as_str().to_string(),
                    endpoint: handle.base_url.clone(),
                    api_key,
                    model: handle.extraction_model.clone(),
                    temperature: handle.temperature,
                    max_tokens: handle.max_tokens,
                    timeout: handle.timeout,
                };
                Ok(Arc::new(OpenAIBackend::new(config)?))
            }
        }
    }

    /// Select and build in one step
    pub fn from_settings(settings: &LlmSettings) -> Result<Arc<dyn LlmBackend>, LlmError> {
        Self::create(&Self::select_backend(settings)?)
    }

    fn resolve_credential(settings: &LlmSettings, provider: LlmProvider) -> Result<String, LlmError> {
        if let Some(key) = settings.configured_api_key() {
            return Ok(key.to_string());
        }

        settings
            .credential_env_var()
            .and_then(|var| std::env::var(var).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| missing(provider))
    }
}

fn missing(provider: LlmProvider) -> LlmError {
    let env_var = match provider {
        LlmProvider::Groq => credentials::GROQ_API_KEY,
        LlmProvider::OpenAI => credentials::OPENAI_API_KEY,
        LlmProvider::Ollama => "",
    };
    LlmError::MissingCredential {
        provider: provider.as_str().to_string(),
        env_var: env_var.to_string(),
    }
}
