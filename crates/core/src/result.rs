//! Final value returned to callers of the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ExtractedFields, InputMethod, NormalizedFields, Suggestions};

/// Accepted expense, ready to hand to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub raw_input: String,
    pub input_method: InputMethod,
    pub extracted_fields: ExtractedFields,
    pub normalized_fields: NormalizedFields,
    pub suggestions: Suggestions,
    pub confidence: f64,
    pub processed_at: DateTime<Utc>,
}

/// Machine-readable tag for a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    BackendUnavailable,
    BackendTimeout,
    BackendRejected,
    MalformedStructuredOutput,
    Cancelled,
    IntentUnknown,
    WrongIntent,
    ValidationRejected,
    InvalidInput,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::BackendUnavailable => "backend_unavailable",
            FailureKind::BackendTimeout => "backend_timeout",
            FailureKind::BackendRejected => "backend_rejected",
            FailureKind::MalformedStructuredOutput => "malformed_structured_output",
            FailureKind::Cancelled => "cancelled",
            FailureKind::IntentUnknown => "intent_unknown",
            FailureKind::WrongIntent => "wrong_intent",
            FailureKind::ValidationRejected => "validation_rejected",
            FailureKind::InvalidInput => "invalid_input",
        }
    }

    /// Failures caused by the backend rather than by the input
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            FailureKind::BackendUnavailable
                | FailureKind::BackendTimeout
                | FailureKind::BackendRejected
                | FailureKind::MalformedStructuredOutput
        )
    }
}

/// Outcome of one pipeline run.
///
/// Exactly one of `data` and `error` is present. `error_kind` accompanies
/// `error` so callers can branch without matching on message text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExpenseRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
}

impl PipelineResult {
    pub fn success(record: ExpenseRecord) -> Self {
        Self {
            success: true,
            data: Some(record),
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_kind: Some(kind),
        }
    }
}
