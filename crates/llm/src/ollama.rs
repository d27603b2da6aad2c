//! Local Ollama backend (`/api/generate`)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backend::{GenerateRequest, LlmBackend, ModelRole};
use crate::cancel::run_cancellable;
use crate::LlmError;

use expense_agent_config::constants::{endpoints, generation, models};

/// Ollama configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Server base address, without the `/api` suffix
    pub endpoint: String,
    pub extraction_model: String,
    pub validation_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::OLLAMA_DEFAULT.to_string(),
            extraction_model: models::OLLAMA_EXTRACTION.to_string(),
            validation_model: models::OLLAMA_VALIDATION.to_string(),
            temperature: generation::TEMPERATURE,
            max_tokens: generation::MAX_TOKENS,
            timeout: Duration::from_secs(generation::TIMEOUT_SECS),
        }
    }
}

impl OllamaConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_models(mut self, extraction: impl Into<String>, validation: impl Into<String>) -> Self {
        self.extraction_model = extraction.into();
        self.validation_model = validation.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(endpoint = %config.endpoint, "Initialized Ollama backend");

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn model_for(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Extraction => &self.config.extraction_model,
            ModelRole::Validation => &self.config.validation_model,
        }
    }

    async fn send(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let body = OllamaGenerateRequest {
            model: self.model_for(request.role),
            prompt: &request.prompt,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature.unwrap_or(self.config.temperature),
                num_predict: request.max_tokens.unwrap_or(self.config.max_tokens),
            },
            system: request.system_prompt.as_deref(),
            format: request.json_mode.then_some("json"),
        };

        let response = self
            .client
            .post(self.api_url("/generate"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(LlmError::BackendRejected {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: OllamaGenerateResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::MalformedStructuredOutput {
                reason: format!("unexpected Ollama response envelope: {}", e),
                raw: text.clone(),
            })?;

        Ok(parsed.response)
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let start = std::time::Instant::now();
        let result = run_cancellable(request.cancel.as_ref(), self.send(request)).await;

        match &result {
            Ok(text) => tracing::debug!(
                model = self.model_for(request.role),
                json_mode = request.json_mode,
                elapsed_ms = start.elapsed().as_millis() as u64,
                response_len = text.len(),
                "Ollama generation complete"
            ),
            Err(e) => tracing::error!(
                model = self.model_for(request.role),
                error = %e,
                "Ollama generation error"
            ),
        }

        result
    }

    async fn is_available(&self) -> bool {
        match self.client.get(self.api_url("/tags")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Ollama availability probe failed");
                false
            }
        }
    }

    fn provider(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.config.extraction_model
    }
}
