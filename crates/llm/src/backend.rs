//! Backend trait and request types
//!
//! One trait covers every provider. Implementors supply the raw completion
//! call; the structured call is shared and lives here as a default method so
//! JSON handling behaves identically across providers.

use async_trait::async_trait;
use serde_json::Value;

use crate::cancel::CancelSignal;
use crate::LlmError;

/// Instruction appended to every structured prompt
pub const JSON_ONLY_INSTRUCTION: &str = "Respond with valid JSON only.";

/// Which configured model a request is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelRole {
    #[default]
    Extraction,
    Validation,
}

/// One completion request
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    /// Falls back to the backend's configured temperature
    pub temperature: Option<f32>,
    /// Falls back to the backend's configured limit
    pub max_tokens: Option<u32>,
    /// Ask the provider for a JSON-only answer
    pub json_mode: bool,
    pub role: ModelRole,
    pub cancel: Option<CancelSignal>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    pub fn with_role(mut self, role: ModelRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_cancel(mut self, cancel: Option<CancelSignal>) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Completion request whose answer must decode as JSON
#[derive(Debug, Clone, Default)]
pub struct StructuredRequest {
    pub request: GenerateRequest,
    /// Rendered into the prompt when present
    pub schema: Option<Value>,
}

impl StructuredRequest {
    pub fn new(request: GenerateRequest) -> Self {
        Self {
            request,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Generative backend
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Raw completion text
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError>;

    /// Completion decoded as JSON.
    ///
    /// Appends the JSON-only instruction (and the schema, if any) to the
    /// prompt, turns JSON mode on and decodes the answer once. Decode failures
    /// surface as [`LlmError::MalformedStructuredOutput`]; nothing is retried.
    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value, LlmError> {
        let StructuredRequest {
            mut request,
            schema,
        } = request;

        request.prompt = structured_prompt(&request.prompt, schema.as_ref());
        request.json_mode = true;

        let raw = self.generate(&request).await?;
        let parsed = parse_structured(&raw);

        if let Err(ref e) = parsed {
            tracing::warn!(
                provider = self.provider(),
                model = self.model_name(),
                error = %e,
                raw_len = raw.len(),
                "Structured output did not decode"
            );
        }

        parsed
    }

    /// Cheap reachability probe
    async fn is_available(&self) -> bool;

    /// Provider name, e.g. "ollama"
    fn provider(&self) -> &str;

    /// Primary (extraction) model name
    fn model_name(&self) -> &str;
}

/// Prompt text sent for a structured call
pub fn structured_prompt(prompt: &str, schema: Option<&Value>) -> String {
    let mut full = format!("{}\n\n{}", prompt, JSON_ONLY_INSTRUCTION);

    if let Some(schema) = schema {
        let rendered = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        full.push_str("\n\nJSON Schema:\n");
        full.push_str(&rendered);
    }

    full
}

/// Decode a structured answer, tolerating a surrounding markdown fence
pub fn parse_structured(raw: &str) -> Result<Value, LlmError> {
    let body = strip_code_fence(raw);

    serde_json::from_str(body).map_err(|e| LlmError::MalformedStructuredOutput {
        reason: e.to_string(),
        raw: raw.to_string(),
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json", "JSON", ...) on the opening line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };

    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
