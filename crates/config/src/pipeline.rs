//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

/// Retry behaviour for one pipeline stage.
///
/// The default performs exactly one call per stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total calls per stage, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Also retry answers that are not valid JSON or not the expected shape
    #[serde(default)]
    pub retry_malformed: bool,
}

fn default_max_attempts() -> u32 {
    1
}
fn default_initial_backoff_ms() -> u64 {
    250
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_backoff_ms() -> u64 {
    4_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            retry_malformed: false,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::default()
    }

    /// `max_attempts` calls with the given initial backoff
    pub fn attempts(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: initial_backoff.as_millis() as u64,
            ..Self::default()
        }
    }

    pub fn with_retry_malformed(mut self, retry: bool) -> Self {
        self.retry_malformed = retry;
        self
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.max_attempts > 10 {
            return Err(ConfigError::InvalidValue {
                field: format!("{}.max_attempts", field),
                message: format!("Must be between 1 and 10, got {}", self.max_attempts),
            });
        }

        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: format!("{}.backoff_multiplier", field),
                message: format!("Must be at least 1.0, got {}", self.backoff_multiplier),
            });
        }

        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::InvalidValue {
                field: format!("{}.initial_backoff_ms", field),
                message: format!(
                    "Cannot exceed max_backoff_ms ({}), got {}",
                    self.max_backoff_ms, self.initial_backoff_ms
                ),
            });
        }

        Ok(())
    }
}

/// Two-stage pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub extraction_retry: RetryPolicy,
    #[serde(default)]
    pub validation_retry: RetryPolicy,
}

impl PipelineConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.extraction_retry.validate("pipeline.extraction_retry")?;
        self.validation_retry.validate("pipeline.validation_retry")?;
        Ok(())
    }
}
