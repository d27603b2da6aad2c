//! OpenAI-compatible chat completions backend
//!
//! Serves both Groq and OpenAI; they differ only in base address, model and
//! key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backend::{GenerateRequest, LlmBackend};
use crate::cancel::run_cancellable;
use crate::LlmError;

use expense_agent_config::constants::{endpoints, generation, models};

/// OpenAI-compatible configuration
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Provider label reported by the backend
    pub provider: String,
    /// Base address including the version segment, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    pub api_key: String,
    /// Used for both extraction and validation
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            endpoint: endpoints::OPENAI_DEFAULT.to_string(),
            api_key: String::new(),
            model: models::OPENAI.to_string(),
            temperature: generation::TEMPERATURE,
            max_tokens: generation::MAX_TOKENS,
            timeout: Duration::from_secs(generation::TIMEOUT_SECS),
        }
    }
}

impl OpenAIConfig {
    /// Config for OpenAI
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Config for Groq's OpenAI-compatible API
    pub fn groq(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: "groq".to_string(),
            endpoint: endpoints::GROQ_DEFAULT.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible backend
pub struct OpenAIBackend {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Configuration(format!(
                "API key required for provider {}",
                config.provider
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            provider = %config.provider,
            model = %config.model,
            "Initialized OpenAI-compatible backend"
        );

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn build_headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();

        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| LlmError::Configuration("API key is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    async fn send(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: request.temperature.unwrap_or(self.config.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(self.url("/chat/completions"))
            .headers(self.build_headers()?)
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

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::MalformedStructuredOutput {
                reason: format!("unexpected chat completion envelope: {}", e),
                raw: text.clone(),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| LlmError::MalformedStructuredOutput {
                reason: "no choices in response".to_string(),
                raw: text,
            })
    }
}

#[async_trait]
impl LlmBackend for OpenAIBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let start = std::time::Instant::now();
        let result = run_cancellable(request.cancel.as_ref(), self.send(request)).await;

        match &result {
            Ok(text) => tracing::debug!(
                provider = %self.config.provider,
                model = %self.config.model,
                json_mode = request.json_mode,
                elapsed_ms = start.elapsed().as_millis() as u64,
                response_len = text.len(),
                "Chat completion complete"
            ),
            Err(e) => tracing::error!(
                provider = %self.config.provider,
                error = %e,
                "Chat completion error"
            ),
        }

        result
    }

    async fn is_available(&self) -> bool {
        let headers = match self.build_headers() {
            Ok(headers) => headers,
            Err(_) => return false,
        };

        match self.client.get(self.url("/models")).headers(headers).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(provider = %self.config.provider, error = %e, "Availability probe failed");
                false
            }
        }
    }

    fn provider(&self) -> &str {
        &self.config.provider
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
