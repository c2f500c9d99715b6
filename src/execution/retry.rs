//! Retry loop with configurable backoff

use crate::core::config::RetryPolicy;
use crate::core::error::{ExecutionError, StepError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Value produced by a retried operation, with the attempts it took
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Information passed to the retry observer before each re-attempt
#[derive(Debug, Clone)]
pub struct RetryNotice<'a> {
    pub step_id: &'a str,
    /// 1-based number of the attempt about to start
    pub next_attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub error: &'a StepError,
}

/// Run `operation` until it succeeds or the policy's attempts are used up
///
/// `operation` receives the zero-based attempt index. Between failed
/// attempts the task sleeps for the policy's backoff delay (skipped when the
/// delay is zero). After the last failed attempt the error is wrapped as an
/// [`ExecutionError`] for `step_id`.
pub async fn run_with_retry<T, F, Fut, R>(
    step_id: &str,
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: R,
) -> Result<Attempted<T>, ExecutionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StepError>>,
    R: FnMut(&RetryNotice<'_>),
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0u32;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                return Ok(Attempted {
                    value,
                    attempts: attempt + 1,
                })
            }
            Err(error) => {
                if attempt >= policy.retries {
                    return Err(ExecutionError {
                        step_id: step_id.to_string(),
                        attempts: attempt + 1,
                        cause: error,
                    });
                }

                let delay = policy.delay_for(attempt);
                warn!(
                    step_id,
                    attempt = attempt + 1,
                    retries = policy.retries,
                    backoff_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying step"
                );
                on_retry(&RetryNotice {
                    step_id,
                    next_attempt: attempt + 2,
                    max_attempts,
                    delay,
                    error: &error,
                });

                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
