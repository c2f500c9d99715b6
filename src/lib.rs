//! layerflow - an in-process DAG workflow engine
//!
//! Pipelines are validated, sorted into dependency layers and executed
//! layer by layer, with the steps of a layer running concurrently and every
//! step retried under its own backoff policy.

pub mod cli;
pub mod core;
pub mod execution;
pub mod secrets;
pub mod steps;
pub mod trace;
pub mod trigger;
pub mod validation;

// Re-export commonly used types
pub use core::{
    step_fn, BackoffStrategy, ExecutionContext, ExecutionStatus, PipelineConfig,
    PipelineDefinition, PipelineError, RetryOptions, RetryPolicy, RunReport, StepBody,
    StepContext, StepDefinition, StepError,
};
pub use execution::{ExecutionEvent, ExecutionPlan, PipelineRunner};
pub use secrets::SecretInjector;
pub use steps::StepRegistry;
pub use trace::{InMemoryTraceSink, LogTraceSink, TraceRecord, TraceSink};
pub use trigger::{CronTrigger, TriggerOptions};
