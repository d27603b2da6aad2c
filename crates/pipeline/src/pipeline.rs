//! Extraction -> intent gate -> validation -> record assembly

use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use thiserror::Error;

use expense_agent_config::{PipelineConfig, RetryPolicy};
use expense_agent_core::{
    Category, ExpenseRecord, ExtractionResponse, ExtractionResult, FailureKind, InputMethod,
    Intent, PipelineResult, Schema, SchemaName, ValidationResponse, ValidationResult,
};
use expense_agent_llm::cancel::run_cancellable;
use expense_agent_llm::{
    CancelSignal, GenerateRequest, LlmBackend, LlmError, ModelRole, StructuredRequest,
};

use crate::prompts::{build_categorization_prompt, build_extraction_prompt, build_validation_prompt};
use crate::retry::{compute_delay, should_retry};

/// Token budget for the one-word categorization answer
const CATEGORIZE_MAX_TOKENS: u32 = 10;

/// Why a run did not produce a record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Input text must not be empty")]
    EmptyInput,

    #[error("Failed to extract expense data: {0}")]
    Extraction(LlmError),

    #[error("Could not determine intent from input")]
    IntentUnknown,

    #[error("This pipeline only handles expenses, got intent: {0}")]
    WrongIntent(Intent),

    #[error("Failed to validate expense data: {0}")]
    Validation(LlmError),

    #[error("Validation failed: {}", join_errors(.0))]
    ValidationRejected(Vec<String>),
}

fn join_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        "Unknown validation error".to_string()
    } else {
        errors.join("; ")
    }
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::EmptyInput => FailureKind::InvalidInput,
            PipelineError::Extraction(e) | PipelineError::Validation(e) => backend_failure_kind(e),
            PipelineError::IntentUnknown => FailureKind::IntentUnknown,
            PipelineError::WrongIntent(_) => FailureKind::WrongIntent,
            PipelineError::ValidationRejected(_) => FailureKind::ValidationRejected,
        }
    }
}

fn backend_failure_kind(err: &LlmError) -> FailureKind {
    match err {
        LlmError::BackendTimeout(_) => FailureKind::BackendTimeout,
        LlmError::BackendRejected { .. } => FailureKind::BackendRejected,
        LlmError::MalformedStructuredOutput { .. } => FailureKind::MalformedStructuredOutput,
        LlmError::Cancelled => FailureKind::Cancelled,
        LlmError::BackendUnavailable(_)
        | LlmError::UnsupportedProvider(_)
        | LlmError::MissingCredential { .. }
        | LlmError::Configuration(_) => FailureKind::BackendUnavailable,
    }
}

/// One unit of work for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub raw_input: String,
    pub input_method: InputMethod,
    /// Reference date for relative phrases; local today when absent
    pub today: Option<NaiveDate>,
    pub cancel: Option<CancelSignal>,
}

impl PipelineRequest {
    pub fn new(raw_input: impl Into<String>, input_method: InputMethod) -> Self {
        Self {
            raw_input: raw_input.into(),
            input_method,
            today: None,
            cancel: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Extraction,
    Validation,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Validation => "validation",
        }
    }
}

/// Two-stage expense pipeline.
///
/// Holds no per-run state; share one instance behind an `Arc`.
pub struct ExpensePipeline {
    backend: Arc<dyn LlmBackend>,
    config: PipelineConfig,
}

impl ExpensePipeline {
    pub fn new(backend: Arc<dyn LlmBackend>, config: PipelineConfig) -> Self {
        tracing::info!(
            provider = backend.provider(),
            model = backend.model_name(),
            extraction_attempts = config.extraction_retry.max_attempts,
            validation_attempts = config.validation_retry.max_attempts,
            "Initialized expense pipeline"
        );
        Self { backend, config }
    }

    pub fn backend(&self) -> &Arc<dyn LlmBackend> {
        &self.backend
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run both stages for `raw_input`; never fails past this boundary
    pub async fn process_expense_input(
        &self,
        raw_input: &str,
        input_method: InputMethod,
    ) -> PipelineResult {
        self.process(PipelineRequest::new(raw_input, input_method)).await
    }

    /// [`Self::run`] folded into a `PipelineResult`, with metrics
    pub async fn process(&self, request: PipelineRequest) -> PipelineResult {
        let start = Instant::now();
        let input_method = request.input_method;

        tracing::info!(
            input_method = %input_method,
            input_len = request.raw_input.len(),
            "Processing expense input"
        );

        let result = match self.run(request).await {
            Ok(record) => {
                tracing::info!(
                    amount = %record.normalized_fields.amount,
                    category = %record.normalized_fields.category,
                    confidence = record.confidence,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Pipeline completed successfully"
                );
                metrics::counter!("expense_pipeline_requests_total", "outcome" => "success")
                    .increment(1);
                PipelineResult::success(record)
            }
            Err(e) => {
                let kind = e.kind();
                tracing::warn!(
                    error_kind = kind.as_str(),
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Pipeline failed"
                );
                metrics::counter!("expense_pipeline_requests_total", "outcome" => "failure")
                    .increment(1);
                metrics::counter!("expense_pipeline_errors_total", "kind" => kind.as_str())
                    .increment(1);
                PipelineResult::failure(kind, e.to_string())
            }
        };

        metrics::histogram!("expense_pipeline_latency_seconds")
            .record(start.elapsed().as_secs_f64());

        result
    }

    /// Typed form of the full run
    pub async fn run(&self, request: PipelineRequest) -> Result<ExpenseRecord, PipelineError> {
        if request.raw_input.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let extraction = self.extract(&request).await?;

        match &extraction.intent {
            Intent::AddExpense => {}
            Intent::Unknown => return Err(PipelineError::IntentUnknown),
            other => return Err(PipelineError::WrongIntent(other.clone())),
        }

        let validation = self.validate(&extraction, request.cancel.as_ref()).await?;

        let normalized_fields = match (validation.is_valid, validation.normalized_fields) {
            (true, Some(fields)) => fields,
            _ => return Err(PipelineError::ValidationRejected(validation.errors)),
        };

        Ok(ExpenseRecord {
            raw_input: extraction.metadata.raw_input.clone(),
            input_method: extraction.metadata.input_method,
            confidence: extraction.confidence(),
            extracted_fields: extraction.fields,
            normalized_fields,
            suggestions: validation.suggestions,
            processed_at: Utc::now(),
        })
    }

    /// Extraction stage alone
    pub async fn extract(&self, request: &PipelineRequest) -> Result<ExtractionResult, PipelineError> {
        let today = request.today.unwrap_or_else(|| Local::now().date_naive());
        let prompts = build_extraction_prompt(&request.raw_input, today);

        let structured = StructuredRequest::new(
            GenerateRequest::new(prompts.user)
                .with_system(prompts.system)
                .with_role(ModelRole::Extraction)
                .with_cancel(request.cancel.clone()),
        )
        .with_schema(Schema::get(SchemaName::Extraction).to_json_schema());

        let response: ExtractionResponse = self
            .structured(Stage::Extraction, &self.config.extraction_retry, structured)
            .await
            .map_err(PipelineError::Extraction)?;

        let result =
            ExtractionResult::from_response(response, request.raw_input.clone(), request.input_method);

        tracing::info!(
            stage = "extraction",
            intent = %result.intent,
            confidence = result.confidence(),
            has_amount = result.fields.amount.is_some(),
            "Extraction complete"
        );

        Ok(result)
    }

    /// Validation stage alone
    pub async fn validate(
        &self,
        extraction: &ExtractionResult,
        cancel: Option<&CancelSignal>,
    ) -> Result<ValidationResult, PipelineError> {
        let prompts = build_validation_prompt(&extraction.fields, &extraction.metadata.raw_input);

        let structured = StructuredRequest::new(
            GenerateRequest::new(prompts.user)
                .with_system(prompts.system)
                .with_role(ModelRole::Validation)
                .with_cancel(cancel.cloned()),
        )
        .with_schema(Schema::get(SchemaName::Validation).to_json_schema());

        let response: ValidationResponse = self
            .structured(Stage::Validation, &self.config.validation_retry, structured)
            .await
            .map_err(PipelineError::Validation)?;

        let result = ValidationResult::from_response(response, extraction.confidence());

        tracing::info!(
            stage = "validation",
            is_valid = result.is_valid,
            error_count = result.errors.len(),
            "Validation complete"
        );

        Ok(result)
    }

    /// Map a free-text description onto a category with one raw call
    pub async fn categorize(
        &self,
        description: &str,
        cancel: Option<CancelSignal>,
    ) -> Result<Category, LlmError> {
        let request = GenerateRequest::new(build_categorization_prompt(description))
            .with_max_tokens(CATEGORIZE_MAX_TOKENS)
            .with_cancel(cancel);

        let reply = self.backend.generate(&request).await?;
        let category = parse_category(&reply);

        tracing::debug!(category = %category, reply_len = reply.len(), "Categorized description");

        Ok(category)
    }

    /// One structured call under `policy`, decoded into `T`
    async fn structured<T: DeserializeOwned>(
        &self,
        stage: Stage,
        policy: &RetryPolicy,
        request: StructuredRequest,
    ) -> Result<T, LlmError> {
        let cancel = request.request.cancel.clone();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let start = Instant::now();

            let outcome = self
                .backend
                .generate_structured(request.clone())
                .await
                .and_then(|value| decode_shape(stage, value));

            metrics::histogram!("expense_pipeline_stage_latency_seconds", "stage" => stage.as_str())
                .record(start.elapsed().as_secs_f64());

            let err = match outcome {
                Ok(decoded) => return Ok(decoded),
                Err(e) => e,
            };

            if !should_retry(policy, attempt, &err) {
                tracing::error!(stage = stage.as_str(), attempt, error = %err, "Stage failed");
                return Err(err);
            }

            let delay = compute_delay(policy, attempt - 1);
            tracing::warn!(
                stage = stage.as_str(),
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying stage"
            );
            metrics::counter!("expense_pipeline_retries_total", "stage" => stage.as_str())
                .increment(1);

            run_cancellable(cancel.as_ref(), async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
        }
    }
}

/// Well-formed JSON of the wrong shape counts as malformed output
fn decode_shape<T: DeserializeOwned>(stage: Stage, value: serde_json::Value) -> Result<T, LlmError> {
    serde_json::from_value::<T>(value.clone()).map_err(|e| LlmError::MalformedStructuredOutput {
        reason: format!("{} output has unexpected shape: {}", stage.as_str(), e),
        raw: value.to_string(),
    })
}

/// First word of the reply, or `other`
fn parse_category(reply: &str) -> Category {
    reply
        .split_whitespace()
        .next()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_ascii_alphabetic())
                .to_lowercase()
        })
        .and_then(|word| word.parse::<Category>().ok())
        .unwrap_or(Category::Other)
}
