//! `llm` step: sends a rendered prompt to a language model CLI

use crate::core::{StepBody, StepContext, StepError};
use crate::secrets::injected_secrets;
use crate::steps::template::render;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Program used when a step names none
pub const DEFAULT_PROGRAM: &str = "pi";

/// Arguments that put `pi` in one-shot text mode
pub const DEFAULT_ARGS: [&str; 4] = ["--mode", "text", "--print", "--no-session"];

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
struct LlmParams {
    prompt: String,

    #[serde(default)]
    provider: Option<String>,

    #[serde(default)]
    model: Option<String>,

    #[serde(default)]
    program: Option<String>,

    /// Replaces [`DEFAULT_ARGS`] when given
    #[serde(default)]
    args: Option<Vec<String>>,

    #[serde(default)]
    timeout_secs: Option<u64>,
}

/// Completes a prompt through a model CLI running as a subprocess
///
/// The prompt may reference upstream outputs with `{{ steps.<id>.<field> }}`.
/// The CLI is called as `<program> <args> [--provider P] [--model M] <prompt>`
/// and its stdout is the completion. Output is `{ text, provider, model }`.
/// Injected secrets are exported to the child's environment, so API keys
/// reach the CLI without appearing on its command line.
#[derive(Debug, Clone, Default)]
pub struct LlmStep {
    program: Option<String>,
}

impl LlmStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default program for steps that don't set `program`
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }
}

#[async_trait]
impl StepBody for LlmStep {
    async fn run(&self, input: Value, ctx: StepContext) -> Result<Value, StepError> {
        let params: LlmParams = serde_json::from_value(input.clone())
            .map_err(|e| StepError::InvalidInput(e.to_string()))?;

        let prompt = render(&params.prompt, &ctx).await?;
        if prompt.trim().is_empty() {
            return Err(StepError::InvalidInput("prompt is empty".to_string()));
        }

        let program = params
            .program
            .as_deref()
            .or(self.program.as_deref())
            .unwrap_or(DEFAULT_PROGRAM);
        let timeout_secs = params.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let mut command = Command::new(program);
        match &params.args {
            Some(args) => command.args(args),
            None => command.args(DEFAULT_ARGS),
        };
        if let Some(provider) = &params.provider {
            command.args(["--provider", provider.as_str()]);
        }
        if let Some(model) = &params.model {
            command.args(["--model", model.as_str()]);
        }
        command.arg(&prompt).kill_on_drop(true);
        for (name, value) in injected_secrets(&input) {
            command.env(name, value);
        }

        debug!(
            step_id = ctx.step_id(),
            program,
            provider = params.provider.as_deref(),
            model = params.model.as_deref(),
            "Sending prompt of {} bytes",
            prompt.len()
        );

        let output = timeout(Duration::from_secs(timeout_secs), command.output())
            .await
            .map_err(|_| StepError::Timeout(timeout_secs))?
            .map_err(|e| StepError::Io(format!("failed to execute '{}': {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            warn!(
                step_id = ctx.step_id(),
                "{} exited with code {}: {}",
                program,
                code,
                stderr.trim()
            );
            return Err(StepError::Command {
                code,
                stderr: stderr.trim().to_string(),
            });
        }

        let text = String::from_utf8(output.stdout)
            .map_err(|e| StepError::Failed(format!("failed to decode {} output: {}", program, e)))?;

        debug!(step_id = ctx.step_id(), "Model returned {} bytes", text.len());

        Ok(json!({
            "text": text.trim_end(),
            "provider": params.provider,
            "model": params.model,
        }))
    }
}
