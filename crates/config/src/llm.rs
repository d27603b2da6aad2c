//! Generative backend settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{credentials, endpoints, generation, models, SUPPORTED_PROVIDERS};
use crate::ConfigError;

/// Settings for every supported backend; the factory reads the section
/// matching `provider` and ignores the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// One of "ollama" (alias "local"), "groq", "openai"
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,
    #[serde(default = "default_ollama_extraction_model")]
    pub ollama_model_extraction: String,
    #[serde(default = "default_ollama_validation_model")]
    pub ollama_model_validation: String,

    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_groq_base_url")]
    pub groq_base_url: String,

    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request deadline
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_ollama_base_url() -> String {
    endpoints::OLLAMA_DEFAULT.to_string()
}
fn default_ollama_extraction_model() -> String {
    models::OLLAMA_EXTRACTION.to_string()
}
fn default_ollama_validation_model() -> String {
    models::OLLAMA_VALIDATION.to_string()
}
fn default_groq_model() -> String {
    models::GROQ.to_string()
}
fn default_groq_base_url() -> String {
    endpoints::GROQ_DEFAULT.to_string()
}
fn default_openai_model() -> String {
    models::OPENAI.to_string()
}
fn default_openai_base_url() -> String {
    endpoints::OPENAI_DEFAULT.to_string()
}
fn default_temperature() -> f32 {
    generation::TEMPERATURE
}
fn default_max_tokens() -> u32 {
    generation::MAX_TOKENS
}
fn default_timeout_secs() -> u64 {
    generation::TIMEOUT_SECS
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            ollama_base_url: default_ollama_base_url(),
            ollama_model_extraction: default_ollama_extraction_model(),
            ollama_model_validation: default_ollama_validation_model(),
            groq_api_key: None,
            groq_model: default_groq_model(),
            groq_base_url: default_groq_base_url(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            openai_base_url: default_openai_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmSettings {
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_groq_api_key(mut self, key: impl Into<String>) -> Self {
        self.groq_api_key = Some(key.into());
        self
    }

    pub fn with_openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Normalised provider name
    pub fn provider_name(&self) -> String {
        self.provider.trim().to_lowercase()
    }

    /// Key configured for the selected provider, ignoring the environment
    pub fn configured_api_key(&self) -> Option<&str> {
        let key = match self.provider_name().as_str() {
            "groq" => self.groq_api_key.as_deref(),
            "openai" => self.openai_api_key.as_deref(),
            _ => None,
        };
        key.filter(|k| !k.trim().is_empty())
    }

    /// Conventional environment variable holding the selected provider's key
    pub fn credential_env_var(&self) -> Option<&'static str> {
        match self.provider_name().as_str() {
            "groq" => Some(credentials::GROQ_API_KEY),
            "openai" => Some(credentials::OPENAI_API_KEY),
            _ => None,
        }
    }

    /// Whether the selected provider needs a key and none can be found
    pub fn credential_missing(&self) -> bool {
        match self.credential_env_var() {
            None => false,
            Some(var) => {
                self.configured_api_key().is_none()
                    && std::env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true)
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let provider = self.provider_name();
        if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "llm.provider".to_string(),
                message: format!(
                    "Must be one of {}, got {}",
                    SUPPORTED_PROVIDERS.join(", "),
                    self.provider
                ),
            });
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", self.temperature),
            });
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_tokens".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.timeout_secs == 0 || self.timeout_secs > 600 {
            return Err(ConfigError::InvalidValue {
                field: "llm.timeout_secs".to_string(),
                message: format!("Must be between 1 and 600, got {}", self.timeout_secs),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = LlmSettings::default();
        assert_eq!(settings.provider, "ollama");
        assert_eq!(settings.ollama_base_url, "http://localhost:11434");
        assert_eq!(settings.groq_model, "llama-3.1-8b-instant");
        assert_eq!(settings.max_tokens, 500);
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_provider_name_normalised() {
        let settings = LlmSettings::default().with_provider("  Groq ");
        assert_eq!(settings.provider_name(), "groq");
    }

    #[test]
    fn test_configured_api_key() {
        let settings = LlmSettings::default()
            .with_provider("groq")
            .with_groq_api_key("gsk_123");
        assert_eq!(settings.configured_api_key(), Some("gsk_123"));
        assert_eq!(settings.credential_env_var(), Some("GROQ_API_KEY"));
        assert!(!settings.credential_missing());

        let settings = LlmSettings::default().with_provider("openai").with_openai_api_key("  ");
        assert_eq!(settings.configured_api_key(), None);

        let settings = LlmSettings::default();
        assert_eq!(settings.credential_env_var(), None);
        assert!(!settings.credential_missing());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let settings = LlmSettings::default().with_provider("anthropic");
        assert!(settings.validate().is_err());

        let settings = LlmSettings::default().with_provider("Local");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_ranges() {
        let mut settings = LlmSettings::default();
        settings.temperature = 3.0;
        assert!(settings.validate().is_err());

        let settings = LlmSettings::default().with_timeout_secs(0);
        assert!(settings.validate().is_err());

        let mut settings = LlmSettings::default();
        settings.max_tokens = 0;
        assert!(settings.validate().is_err());
    }
}
