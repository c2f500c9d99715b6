//! `template` step: renders text from upstream outputs

use crate::core::{StepBody, StepContext, StepError};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::warn;

/// Matches `{{ steps.<id> }}` and `{{ steps.<id>.<field>[.<field>...] }}`
const PLACEHOLDER: &str = r"\{\{\s*steps\.([A-Za-z0-9_\-]+)((?:\.[A-Za-z0-9_\-]+)*)\s*\}\}";

/// Substitutes upstream outputs into `params.template`; output is `{ text }`
///
/// Strings are inserted as-is, other values as compact JSON. Missing values
/// render as an empty string; a missing field of a present output is logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateStep;

#[async_trait]
impl StepBody for TemplateStep {
    async fn run(&self, input: Value, ctx: StepContext) -> Result<Value, StepError> {
        let template = input
            .get("template")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::InvalidInput("'template' must be a string".to_string()))?;

        let text = render(template, &ctx).await?;
        Ok(json!({ "text": text }))
    }
}

/// Render `template` against the run's context
pub async fn render(template: &str, ctx: &StepContext) -> Result<String, StepError> {
    let pattern = placeholder()?;

    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;
    for caps in pattern.captures_iter(template) {
        let (Some(whole), Some(step_id)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let fields = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        rendered.push_str(&template[last..whole.start()]);
        if let Some(output) = ctx.get(step_id.as_str()).await {
            let pointer = fields.replace('.', "/");
            match output.pointer(&pointer) {
                Some(value) => rendered.push_str(&display(value)),
                None => warn!(
                    step_id = %ctx.step_id(),
                    upstream = step_id.as_str(),
                    field = fields.trim_start_matches('.'),
                    "Template field not found in upstream output"
                ),
            }
        }
        last = whole.end();
    }
    rendered.push_str(&template[last..]);

    Ok(rendered)
}

/// Compiled once per process
fn placeholder() -> Result<&'static Regex, StepError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(PLACEHOLDER))
        .as_ref()
        .map_err(|e| StepError::Failed(e.to_string()))
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
