//! Validation stage output
//!
//! A result is only ever marked valid when every normalized field is present
//! and well typed. A backend claiming validity for data that fails these
//! checks produces an invalid result listing the failed checks.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

use crate::extraction::null_as_default;
use crate::Category;

static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static date pattern"));

/// Decoded validation answer exactly as the backend sent it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidationResponse {
    #[serde(default, alias = "isValid", deserialize_with = "null_as_default")]
    pub is_valid: bool,
    #[serde(default, alias = "normalizedFields", alias = "normalized_fields")]
    pub validated_data: Option<Value>,
    #[serde(default, deserialize_with = "error_list")]
    pub errors: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suggestions: Suggestions,
}

/// Cleaned expense fields ready for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFields {
    /// Kept exactly as the backend wrote it (`50` stays `50`)
    pub amount: Number,
    pub category: Category,
    pub description: String,
    /// `YYYY-MM-DD`
    pub date: String,
}

/// Optional corrections proposed by the validation backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Suggestions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetadata {
    pub validated_at: DateTime<Utc>,
    /// Confidence reported by the extraction stage
    pub source_confidence: f64,
}

/// Validation stage result, terminal for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub normalized_fields: Option<NormalizedFields>,
    pub errors: Vec<String>,
    pub suggestions: Suggestions,
    pub metadata: ValidationMetadata,
}

impl ValidationResult {
    pub fn from_response(response: ValidationResponse, source_confidence: f64) -> Self {
        let metadata = ValidationMetadata {
            validated_at: Utc::now(),
            source_confidence,
        };

        if !response.is_valid {
            return Self {
                is_valid: false,
                normalized_fields: None,
                errors: response.errors,
                suggestions: response.suggestions,
                metadata,
            };
        }

        let checked = match response.validated_data.as_ref() {
            Some(data) => NormalizedFields::check(data),
            None => Err(vec!["validated data is missing".to_string()]),
        };

        match checked {
            Ok(fields) => Self {
                is_valid: true,
                normalized_fields: Some(fields),
                errors: response.errors,
                suggestions: response.suggestions,
                metadata,
            },
            Err(errors) => Self {
                is_valid: false,
                normalized_fields: None,
                errors,
                suggestions: response.suggestions,
                metadata,
            },
        }
    }
}

impl NormalizedFields {
    pub fn amount_value(&self) -> f64 {
        self.amount.as_f64().unwrap_or_default()
    }

    /// Check a raw `validated_data` object, collecting every failed check
    pub fn check(data: &Value) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();

        let amount = match data.get("amount") {
            Some(Value::Number(n)) if n.as_f64().is_some_and(|a| a.is_finite() && a > 0.0) => {
                Some(n.clone())
            }
            Some(Value::Number(_)) => {
                errors.push("amount must be positive".to_string());
                None
            }
            _ => {
                errors.push("amount is missing or not a number".to_string());
                None
            }
        };

        let category = match data.get("category").and_then(Value::as_str) {
            Some(c) => match c.parse::<Category>() {
                Ok(category) => Some(category),
                Err(_) => {
                    errors.push(format!(
                        "category '{}' is not one of: {}",
                        c,
                        Category::joined()
                    ));
                    None
                }
            },
            None => {
                errors.push("category is missing".to_string());
                None
            }
        };

        let description = match data.get("description").and_then(Value::as_str) {
            Some(d) => Some(d.to_string()),
            None => {
                errors.push("description is missing".to_string());
                None
            }
        };

        let date = match data.get("date").and_then(Value::as_str) {
            Some(d) if is_iso_date(d) => Some(d.to_string()),
            Some(d) => {
                errors.push(format!("date '{}' is not a valid YYYY-MM-DD date", d));
                None
            }
            None => {
                errors.push("date is missing".to_string());
                None
            }
        };

        match (amount, category, description, date) {
            (Some(amount), Some(category), Some(description), Some(date)) => Ok(Self {
                amount,
                category,
                description,
                date,
            }),
            _ => Err(errors),
        }
    }
}

/// `YYYY-MM-DD` that also names a real calendar day
pub fn is_iso_date(s: &str) -> bool {
    DATE_PATTERN.is_match(s) && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn error_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_response() {
        let response: ValidationResponse = serde_json::from_value(json!({
            "is_valid": true,
            "validated_data": {
                "amount": 50,
                "category": "food",
                "description": "groceries",
                "date": "2024-01-14"
            },
            "errors": []
        }))
        .unwrap();

        let result = ValidationResult::from_response(response, 0.9);
        assert!(result.is_valid);
        let fields = result.normalized_fields.unwrap();
        assert_eq!(fields.amount_value(), 50.0);
        assert_eq!(fields.amount.to_string(), "50");
        assert_eq!(fields.category, Category::Food);
        assert_eq!(fields.date, "2024-01-14");
        assert_eq!(result.metadata.source_confidence, 0.9);
    }

    #[test]
    fn test_camel_case_aliases() {
        let response: ValidationResponse = serde_json::from_value(json!({
            "isValid": false,
            "errors": ["amount must be positive"]
        }))
        .unwrap();
        assert!(!response.is_valid);
        assert_eq!(response.errors, vec!["amount must be positive"]);
        assert_eq!(response.suggestions, Suggestions::default());
    }

    #[test]
    fn test_claimed_valid_but_ill_typed() {
        let response: ValidationResponse = serde_json::from_value(json!({
            "is_valid": true,
            "validated_data": {
                "amount": -3,
                "category": "groceries",
                "description": "milk",
                "date": "14/01/2024"
            }
        }))
        .unwrap();

        let result = ValidationResult::from_response(response, 0.5);
        assert!(!result.is_valid);
        assert!(result.normalized_fields.is_none());
        assert_eq!(result.errors.len(), 3);
        assert_eq!(result.errors[0], "amount must be positive");
        assert!(result.errors[1].starts_with("category 'groceries'"));
        assert!(result.errors[2].contains("14/01/2024"));
    }

    #[test]
    fn test_claimed_valid_without_data() {
        let response = ValidationResponse {
            is_valid: true,
            ..Default::default()
        };
        let result = ValidationResult::from_response(response, 0.0);
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["validated data is missing"]);
    }

    #[test]
    fn test_iso_date() {
        assert!(is_iso_date("2024-02-29"));
        assert!(!is_iso_date("2023-02-29"));
        assert!(!is_iso_date("2024-1-5"));
        assert!(!is_iso_date("yesterday"));
    }

    #[test]
    fn test_error_list_leniency() {
        let response: ValidationResponse =
            serde_json::from_value(json!({ "is_valid": false, "errors": "bad date", "suggestions": null }))
                .unwrap();
        assert_eq!(response.errors, vec!["bad date"]);

        let response: ValidationResponse =
            serde_json::from_value(json!({ "is_valid": false, "errors": null })).unwrap();
        assert!(response.errors.is_empty());
    }
}
