//! Per-stage retry with exponential backoff

use std::time::Duration;

use expense_agent_config::RetryPolicy;
use expense_agent_llm::LlmError;

/// Delay before retry number `attempt` (0-based)
pub fn compute_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let delay_ms =
        (policy.initial_backoff_ms as f64) * policy.backoff_multiplier.powi(attempt as i32);
    let capped = delay_ms.min(policy.max_backoff_ms as f64) as u64;
    Duration::from_millis(capped)
}

/// Whether a failed call (`attempt` is 1-based, counting the call that just
/// failed) should be made again
pub fn should_retry(policy: &RetryPolicy, attempt: u32, error: &LlmError) -> bool {
    if attempt >= policy.max_attempts {
        return false;
    }

    match error {
        LlmError::BackendUnavailable(_) | LlmError::BackendTimeout(_) => true,
        LlmError::MalformedStructuredOutput { .. } => policy.retry_malformed,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 100,
            backoff_multiplier: 2.0,
            max_backoff_ms: 500,
            retry_malformed: false,
        }
    }

    fn malformed() -> LlmError {
        LlmError::MalformedStructuredOutput {
            reason: "eof".into(),
            raw: "{".into(),
        }
    }

    #[test]
    fn exponential_backoff() {
        let policy = policy(5);
        assert_eq!(compute_delay(&policy, 0), Duration::from_millis(100));
        assert_eq!(compute_delay(&policy, 1), Duration::from_millis(200));
        assert_eq!(compute_delay(&policy, 2), Duration::from_millis(400));
        // Capped
        assert_eq!(compute_delay(&policy, 3), Duration::from_millis(500));
    }

    #[test]
    fn default_policy_never_retries() {
        let policy = RetryPolicy::default();
        assert!(!should_retry(&policy, 1, &LlmError::BackendTimeout("t".into())));
        assert!(!should_retry(&policy, 1, &malformed()));
    }

    #[test]
    fn transient_errors_retry_until_limit() {
        let policy = policy(3);
        let err = LlmError::BackendUnavailable("refused".into());
        assert!(should_retry(&policy, 1, &err));
        assert!(should_retry(&policy, 2, &err));
        assert!(!should_retry(&policy, 3, &err));
    }

    #[test]
    fn malformed_only_when_enabled() {
        let mut policy = policy(3);
        assert!(!should_retry(&policy, 1, &malformed()));
        policy.retry_malformed = true;
        assert!(should_retry(&policy, 1, &malformed()));
    }

    #[test]
    fn rejected_and_cancelled_never_retry() {
        let mut policy = policy(5);
        policy.retry_malformed = true;
        let rejected = LlmError::BackendRejected {
            status: 400,
            body: "bad".into(),
        };
        assert!(!should_retry(&policy, 1, &rejected));
        assert!(!should_retry(&policy, 1, &LlmError::Cancelled));
    }
}
