//! Step domain model

use crate::core::config::RetryOptions;
use crate::core::context::StepContext;
use crate::core::error::StepError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The work a step performs
///
/// `input` is the step's static params; upstream outputs are read explicitly
/// through `ctx`.
#[async_trait]
pub trait StepBody: Send + Sync {
    async fn run(&self, input: Value, ctx: StepContext) -> Result<Value, StepError>;
}

/// Step body backed by a closure
pub struct FnStep<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> StepBody for FnStep<F>
where
    F: Fn(Value, StepContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, StepError>> + Send,
{
    async fn run(&self, input: Value, ctx: StepContext) -> Result<Value, StepError> {
        (self.func)(input, ctx).await
    }
}

/// Wrap an async closure as a step body
pub fn step_fn<F, Fut>(func: F) -> Arc<dyn StepBody>
where
    F: Fn(Value, StepContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
{
    Arc::new(FnStep { func })
}

/// A single step in a pipeline
#[derive(Clone)]
pub struct StepDefinition {
    /// Unique step identifier
    pub id: String,

    pub body: Arc<dyn StepBody>,

    /// List of step IDs this step depends on
    pub depends_on: Vec<String>,

    /// Static input passed to the body on every attempt
    pub params: Value,

    /// Overrides the pipeline-level retry options
    pub retry_options: Option<RetryOptions>,

    /// Steps may not be scheduled individually; a value here is rejected
    /// by structural validation
    pub schedule: Option<String>,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, body: Arc<dyn StepBody>) -> Self {
        Self {
            id: id.into(),
            body,
            depends_on: Vec::new(),
            params: Value::Null,
            retry_options: None,
            schedule: None,
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn retry(mut self, options: RetryOptions) -> Self {
        self.retry_options = Some(options);
        self
    }

    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    pub fn has_dependencies(&self) -> bool {
        !self.depends_on.is_empty()
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("depends_on", &self.depends_on)
            .field("params", &self.params)
            .field("retry_options", &self.retry_options)
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}
