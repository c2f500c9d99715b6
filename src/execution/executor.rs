//! Step executor - runs individual steps under their retry policy

use crate::{
    core::{
        ExecutionContext, ExecutionError, RetryOptions, RetryPolicy, StepContext, StepDefinition,
        StepOutcome, StepStatus,
    },
    execution::engine::{emit, EventHandler, ExecutionEvent},
    execution::retry::{run_with_retry, Attempted},
    secrets::{injected_secrets, redact, redact_text},
    trace::TraceRecord,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Result of running one step to completion or exhaustion
#[derive(Debug, Clone)]
pub struct StepRun {
    pub step_id: String,
    pub layer: usize,

    /// Params the body was invoked with
    pub input: Value,

    pub result: Result<Attempted<Value>, ExecutionError>,

    /// Wall time across all attempts, backoff included
    pub duration_ms: u64,

    pub started_at: DateTime<Utc>,
}

impl StepRun {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn attempts(&self) -> u32 {
        match &self.result {
            Ok(attempted) => attempted.attempts,
            Err(err) => err.attempts,
        }
    }

    pub fn outcome(&self) -> StepOutcome {
        let status = match &self.result {
            Ok(_) => StepStatus::Completed,
            Err(err) => StepStatus::Failed {
                error: err.cause.to_string(),
            },
        };

        StepOutcome {
            step_id: self.step_id.clone(),
            layer: self.layer,
            status,
            attempts: self.attempts(),
            duration_ms: self.duration_ms,
        }
    }

    /// Trace record for this run
    ///
    /// Injected secret values are masked wherever they appear: in the
    /// input, the output and the error text.
    pub fn trace(&self, execution_id: Uuid, pipeline_name: &str) -> TraceRecord {
        let secrets = injected_secrets(&self.input);
        let mut record = TraceRecord::new(execution_id, pipeline_name, &self.step_id, &self.input);
        match &self.result {
            Ok(attempted) => record.output = Some(redact(&attempted.value, &secrets)),
            Err(err) => record.error = Some(redact_text(&err.cause.to_string(), &secrets)),
        }
        record.attempts = self.attempts();
        record.duration_ms = self.duration_ms;
        record.timestamp = self.started_at;
        record
    }
}

/// Executes a single step
#[derive(Debug, Clone, Default)]
pub struct StepExecutor {
    pipeline_retry: Option<RetryOptions>,
}

impl StepExecutor {
    pub fn new(pipeline_retry: Option<RetryOptions>) -> Self {
        Self { pipeline_retry }
    }

    /// Effective retry policy for `step`
    pub fn policy_for(&self, step: &StepDefinition) -> RetryPolicy {
        RetryPolicy::resolve(step.retry_options.as_ref(), self.pipeline_retry.as_ref())
    }

    /// Run `step` until it succeeds or its retry budget is spent
    ///
    /// Every attempt gets the same params and a fresh [`StepContext`] over
    /// `store`. Nothing is written to the store here.
    pub async fn execute(
        &self,
        step: &StepDefinition,
        layer: usize,
        store: Arc<ExecutionContext>,
        handlers: &[EventHandler],
    ) -> StepRun {
        let policy = self.policy_for(step);
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(step_id = %step.id, layer, "Executing step");

        let result = run_with_retry(
            &step.id,
            &policy,
            |attempt| {
                emit(
                    handlers,
                    ExecutionEvent::StepStarted {
                        step_id: step.id.clone(),
                        attempt: attempt + 1,
                    },
                );
                let ctx = StepContext::new(step.id.clone(), store.clone());
                step.body.run(step.params.clone(), ctx)
            },
            |notice| {
                emit(
                    handlers,
                    ExecutionEvent::StepRetrying {
                        step_id: notice.step_id.to_string(),
                        next_attempt: notice.next_attempt,
                        max_attempts: notice.max_attempts,
                        delay_ms: notice.delay.as_millis() as u64,
                        error: notice.error.to_string(),
                    },
                );
            },
        )
        .await;

        let duration_ms = clock.elapsed().as_millis() as u64;
        match &result {
            Ok(attempted) => info!(
                step_id = %step.id,
                attempts = attempted.attempts,
                duration_ms,
                "Step completed"
            ),
            Err(err) => error!(
                step_id = %step.id,
                attempts = err.attempts,
                duration_ms,
                error = %err.cause,
                "Step failed"
            ),
        }

        StepRun {
            step_id: step.id.clone(),
            layer,
            input: step.params.clone(),
            result,
            duration_ms,
            started_at,
        }
    }
}
