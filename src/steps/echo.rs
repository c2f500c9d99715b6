//! `echo` step: returns its params unchanged

use crate::core::{StepBody, StepContext, StepError};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoStep;

#[async_trait]
impl StepBody for EchoStep {
    async fn run(&self, input: Value, ctx: StepContext) -> Result<Value, StepError> {
        debug!(step_id = ctx.step_id(), "Echoing params");
        Ok(input)
    }
}
