//! Error taxonomy for pipeline validation and execution
//!
//! Pre-flight errors (`SchemaError`, `StructuralError`, `CycleError`) are
//! raised before any step runs. `ExecutionError` is raised once a step has
//! exhausted its retry budget.

use std::fmt;
use thiserror::Error;

/// Failure reported by a step body
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    #[error("{0}")]
    Failed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing upstream output '{0}'")]
    MissingInput(String),

    #[error("command exited with code {code}: {stderr}")]
    Command { code: i32, stderr: String },

    #[error("io error: {0}")]
    Io(String),

    #[error("timed out after {0}s")]
    Timeout(u64),
}

impl StepError {
    /// Shorthand for a plain failure message
    pub fn failed(message: impl Into<String>) -> Self {
        StepError::Failed(message.into())
    }
}

impl From<std::io::Error> for StepError {
    fn from(err: std::io::Error) -> Self {
        StepError::Io(err.to_string())
    }
}

/// A single shape problem found in a raw definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Location of the problem, e.g. `/steps/2/id`
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// The definition does not have the required shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema validation failed: {}", join(.violations))]
pub struct SchemaError {
    pub violations: Vec<SchemaViolation>,
}

/// Why a step makes the graph structurally invalid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// Scheduling is pipeline-level only
    StepSchedule,
    DuplicateId,
    MissingDependency { dependency: String },
}

/// A single structural problem, tied to the offending step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralViolation {
    pub step_id: String,
    pub kind: ViolationKind,
}

impl fmt::Display for StructuralViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::StepSchedule => write!(
                f,
                "step '{}' declares a schedule; scheduling is pipeline-level only",
                self.step_id
            ),
            ViolationKind::DuplicateId => write!(f, "duplicate step id '{}'", self.step_id),
            ViolationKind::MissingDependency { dependency } => write!(
                f,
                "step '{}' depends on missing step '{}'",
                self.step_id, dependency
            ),
        }
    }
}

/// The definition is well-shaped but its graph is not legal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("structural validation failed: {}", join(.violations))]
pub struct StructuralError {
    pub violations: Vec<StructuralViolation>,
}

impl StructuralError {
    /// Ids of every offending step, in the order they were found
    pub fn step_ids(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.step_id.as_str()).collect()
    }
}

/// The dependency graph contains a cycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle detected at step '{step_id}'")]
pub struct CycleError {
    pub step_id: String,
}

/// A step exhausted its retry budget
#[derive(Debug, Clone, PartialEq, Error)]
#[error("step '{step_id}' failed after {attempts} attempt(s): {cause}")]
pub struct ExecutionError {
    pub step_id: String,
    pub attempts: u32,
    #[source]
    pub cause: StepError,
}

/// Every way a pipeline run can fail
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// More than one step of the same layer exhausted its retries
    #[error("{} steps failed in the same layer: {}", .0.len(), join(.0))]
    Aggregate(Vec<ExecutionError>),
}

impl PipelineError {
    /// True for errors raised before any step was executed
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            PipelineError::Schema(_) | PipelineError::Structural(_) | PipelineError::Cycle(_)
        )
    }

    /// Execution failures carried by this error (empty for pre-flight errors)
    pub fn execution_failures(&self) -> Vec<&ExecutionError> {
        match self {
            PipelineError::Execution(e) => vec![e],
            PipelineError::Aggregate(errors) => errors.iter().collect(),
            _ => Vec::new(),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
