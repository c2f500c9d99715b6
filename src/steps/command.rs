//! `command` step: runs a program as a subprocess

use crate::core::{StepBody, StepContext, StepError};
use crate::secrets::injected_secrets;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::process::Command;
use tracing::{debug, warn};

/// Params accepted by the `command` step
#[derive(Debug, Clone, Deserialize)]
struct CommandParams {
    program: String,

    #[serde(default)]
    args: Vec<String>,

    #[serde(default)]
    env: HashMap<String, String>,

    #[serde(default)]
    cwd: Option<String>,
}

/// Spawns `program` with `args` and captures its output
///
/// Output is `{ stdout, stderr, code }`. A non-zero exit is a
/// [`StepError::Command`]. Secrets injected into the params are exported to
/// the child's environment.
#[derive(Debug, Clone, Default)]
pub struct CommandStep;

impl CommandStep {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepBody for CommandStep {
    async fn run(&self, input: Value, ctx: StepContext) -> Result<Value, StepError> {
        let params: CommandParams = serde_json::from_value(input.clone())
            .map_err(|e| StepError::InvalidInput(e.to_string()))?;

        debug!(
            step_id = ctx.step_id(),
            program = %params.program,
            args = ?params.args,
            "Spawning command"
        );

        let mut command = Command::new(&params.program);
        command.args(&params.args).kill_on_drop(true);
        for (name, value) in injected_secrets(&input) {
            command.env(name, value);
        }
        command.envs(&params.env);
        if let Some(cwd) = &params.cwd {
            command.current_dir(cwd);
        }

        let output = command.output().await.map_err(|e| {
            StepError::Io(format!("failed to execute '{}': {}", params.program, e))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            warn!(
                step_id = ctx.step_id(),
                "{} exited with code {}: {}",
                params.program,
                code,
                stderr.trim()
            );
            return Err(StepError::Command {
                code,
                stderr: stderr.trim().to_string(),
            });
        }

        debug!(step_id = ctx.step_id(), "Command returned {} bytes of output", stdout.len());

        Ok(json!({
            "stdout": stdout,
            "stderr": stderr,
            "code": code,
        }))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::ExecutionContext;
    use std::sync::Arc;

    fn ctx() -> StepContext {
        StepContext::new("cmd", Arc::new(ExecutionContext::new()))
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let output = CommandStep::new()
            .run(json!({"program": "echo", "args": ["hello"]}), ctx())
            .await
            .unwrap();

        assert_eq!(output["stdout"], json!("hello\n"));
        assert_eq!(output["code"], json!(0));
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let err = CommandStep::new()
            .run(json!({"program": "sh", "args": ["-c", "echo bad >&2; exit 3"]}), ctx())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StepError::Command {
                code: 3,
                stderr: "bad".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_env_and_secrets_exported() {
        let output = CommandStep::new()
            .run(
                json!({
                    "program": "sh",
                    "args": ["-c", "printf '%s-%s' \"$GREETING\" \"$TOKEN\""],
                    "env": {"GREETING": "hi"},
                    "secrets": {"TOKEN": "t0k"}
                }),
                ctx(),
            )
            .await
            .unwrap();

        assert_eq!(output["stdout"], json!("hi-t0k"));
    }

    #[tokio::test]
    async fn test_missing_program_param() {
        let err = CommandStep::new().run(json!({"args": []}), ctx()).await.unwrap_err();
        assert!(matches!(err, StepError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unknown_program() {
        let err = CommandStep::new()
            .run(json!({"program": "definitely-not-a-real-binary-xyz"}), ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Io(_)));
    }
}
