//! Extraction stage output
//!
//! The extraction backend answers with `{"intent": ..., "extracted_data": {...}}`.
//! Fields are guesses, so decoding is lenient: `null`, numeric strings and
//! out-of-range confidence are tolerated and normalised here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{InputMethod, Intent};

/// Decoded extraction answer exactly as the backend sent it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtractionResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub intent: Intent,
    #[serde(default, alias = "fields", deserialize_with = "null_as_default")]
    pub extracted_data: ExtractedFields,
}

/// Fields guessed from free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtractedFields {
    #[serde(default, deserialize_with = "lenient_number")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    /// Always within [0, 1]; absent confidence decodes as 0
    #[serde(default, deserialize_with = "confidence")]
    pub confidence: f64,
}

/// Provenance recorded alongside the extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub input_method: InputMethod,
    pub raw_input: String,
    pub extracted_at: DateTime<Utc>,
}

/// Extraction stage result, immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub intent: Intent,
    pub fields: ExtractedFields,
    pub metadata: ExtractionMetadata,
}

impl ExtractionResult {
    pub fn from_response(
        response: ExtractionResponse,
        raw_input: impl Into<String>,
        input_method: InputMethod,
    ) -> Self {
        Self {
            intent: response.intent,
            fields: response.extracted_data,
            metadata: ExtractionMetadata {
                input_method,
                raw_input: raw_input.into(),
                extracted_at: Utc::now(),
            },
        }
    }

    pub fn confidence(&self) -> f64 {
        self.fields.confidence
    }
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse::<f64>()
            .ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(number_from_value)
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(0.0))
}
