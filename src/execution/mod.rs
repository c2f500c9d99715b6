//! Pipeline execution: layering, retries, per-step execution and the runner

pub mod engine;
pub mod executor;
pub mod retry;
pub mod scheduler;

pub use engine::{EventHandler, ExecutionEvent, PipelineRunner};
pub use executor::{StepExecutor, StepRun};
pub use retry::{run_with_retry, Attempted, RetryNotice};
pub use scheduler::{layer, topological_order, ExecutionPlan, Layer};
