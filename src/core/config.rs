//! Pipeline configuration from YAML or JSON, and retry policy configuration

use crate::core::{PipelineDefinition, StepDefinition};
use crate::core::error::SchemaError;
use crate::secrets::SecretInjector;
use crate::steps::StepRegistry;
use crate::validation::schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// How the delay between attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Retry immediately
    None,
    /// `backoff_ms * (attempt + 1)`
    Linear,
    /// `backoff_ms * 2^attempt`
    #[default]
    Exponential,
}

impl std::str::FromStr for BackoffStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(BackoffStrategy::None),
            "linear" => Ok(BackoffStrategy::Linear),
            "exponential" => Ok(BackoffStrategy::Exponential),
            other => Err(format!(
                "unknown backoff strategy '{}' (expected none, linear or exponential)",
                other
            )),
        }
    }
}

/// Partial retry settings, as written at pipeline or step level
///
/// Unset fields fall through to the next level down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(default, alias = "backoff_ms", skip_serializing_if = "Option::is_none")]
    pub backoff_ms: Option<u64>,

    #[serde(default, alias = "backoff_strategy", skip_serializing_if = "Option::is_none")]
    pub backoff_strategy: Option<BackoffStrategy>,
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.backoff_ms = Some(backoff_ms);
        self
    }

    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = Some(strategy);
        self
    }

    /// Field-wise merge where `overrides` wins wherever it is set
    pub fn merged(&self, overrides: &RetryOptions) -> RetryOptions {
        RetryOptions {
            retries: overrides.retries.or(self.retries),
            backoff_ms: overrides.backoff_ms.or(self.backoff_ms),
            backoff_strategy: overrides.backoff_strategy.or(self.backoff_strategy),
        }
    }
}

/// Fully resolved retry policy for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub retries: u32,
    pub backoff_ms: u64,
    pub backoff_strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            backoff_ms: 0,
            backoff_strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Resolve the effective policy: step options, then pipeline options, then defaults
    pub fn resolve(step: Option<&RetryOptions>, pipeline: Option<&RetryOptions>) -> Self {
        let defaults = RetryPolicy::default();
        let mut merged = RetryOptions::default();
        if let Some(pipeline) = pipeline {
            merged = merged.merged(pipeline);
        }
        if let Some(step) = step {
            merged = merged.merged(step);
        }

        RetryPolicy {
            retries: merged.retries.unwrap_or(defaults.retries),
            backoff_ms: merged.backoff_ms.unwrap_or(defaults.backoff_ms),
            backoff_strategy: merged.backoff_strategy.unwrap_or(defaults.backoff_strategy),
        }
    }

    /// Total attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay to wait after the failed attempt with the given zero-based index
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let ms = match self.backoff_strategy {
            BackoffStrategy::None => 0,
            BackoffStrategy::Linear => self
                .backoff_ms
                .saturating_mul(u64::from(attempt_index) + 1),
            BackoffStrategy::Exponential => {
                let factor = 2u64.checked_pow(attempt_index).unwrap_or(u64::MAX);
                self.backoff_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(ms)
    }
}

/// Errors raised while loading a pipeline file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read pipeline file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse pipeline definition: {0}")]
    Parse(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("step '{step_id}' uses unknown step kind '{kind}'")]
    UnknownStepKind { step_id: String, kind: String },
}

/// Top-level pipeline configuration as written in a pipeline file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Pipeline name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Cron schedule for the whole pipeline, consumed by the trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,

    /// Pipeline-level retry options (step options override these)
    #[serde(default, alias = "retry_options", skip_serializing_if = "Option::is_none")]
    pub retry_options: Option<RetryOptions>,

    /// Pipeline steps
    pub steps: Vec<StepConfig>,
}

/// Step configuration as written in a pipeline file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Built-in step kind that provides the body
    #[serde(default = "default_step_kind")]
    pub uses: String,

    /// List of step IDs this step depends on
    #[serde(default, alias = "depends_on")]
    pub depends_on: Vec<String>,

    /// Static input passed to the step body
    #[serde(default)]
    pub params: Value,

    /// Retry options for this step (overrides pipeline-level)
    #[serde(default, alias = "retry_options", skip_serializing_if = "Option::is_none")]
    pub retry_options: Option<RetryOptions>,

    /// Only accepted so structural validation can reject it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,

    /// Names of secrets injected into this step's params (`*` for all)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,
}

fn default_step_kind() -> String {
    "echo".to_string()
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        if config.name.is_none() {
            config.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
        }
        Ok(config)
    }

    /// Parse pipeline configuration from a YAML (or JSON) string
    ///
    /// The raw document is shape-checked before it is deserialized, so every
    /// shape problem is reported at once.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: Value =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_value(raw)
    }

    /// Build configuration from an already parsed document
    pub fn from_value(raw: Value) -> Result<Self, ConfigError> {
        schema::validate_value(&raw)?;
        serde_json::from_value(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Pipeline name, falling back to a generic one
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("pipeline")
    }

    /// Bind every step to a body from the registry
    pub fn to_definition(
        &self,
        registry: &StepRegistry,
        secrets: Option<&SecretInjector>,
    ) -> Result<PipelineDefinition, ConfigError> {
        let mut steps = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let body = registry
                .get(&step.uses)
                .ok_or_else(|| ConfigError::UnknownStepKind {
                    step_id: step.id.clone(),
                    kind: step.uses.clone(),
                })?;

            let params = match secrets {
                Some(injector) if !step.secrets.is_empty() => {
                    injector.inject(step.params.clone(), &step.secrets)
                }
                _ => step.params.clone(),
            };

            let mut definition = StepDefinition::new(step.id.clone(), body)
                .depends_on(step.depends_on.iter().cloned())
                .params(params);
            definition.retry_options = step.retry_options.clone();
            definition.schedule = step.schedule.clone();
            steps.push(definition);
        }

        let mut pipeline = PipelineDefinition::new(self.display_name(), steps);
        pipeline.schedule = self.schedule.clone();
        Ok(pipeline)
    }
}
