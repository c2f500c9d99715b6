//! Main execution engine - orchestrates the entire pipeline run

use crate::{
    core::{
        ExecutionContext, ExecutionError, ExecutionStatus, PipelineDefinition, PipelineError,
        RetryOptions, RunReport, RunState, StepOutcome,
    },
    execution::{executor::StepRun, scheduler, ExecutionPlan, StepExecutor},
    trace::TraceSink,
    validation::{validate_shape, validate_structure},
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    LayerStarted {
        index: usize,
        step_ids: Vec<String>,
    },
    StepStarted {
        step_id: String,
        /// 1-based
        attempt: u32,
    },
    StepRetrying {
        step_id: String,
        next_attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
        error: String,
    },
    StepCompleted {
        step_id: String,
        attempts: u32,
        duration_ms: u64,
    },
    StepFailed {
        step_id: String,
        attempts: u32,
        error: String,
    },
    LayerFinished {
        index: usize,
        failed: usize,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Deliver `event` to every handler, in registration order
pub(crate) fn emit(handlers: &[EventHandler], event: ExecutionEvent) {
    for handler in handlers {
        handler(event.clone());
    }
}

/// Runs a pipeline layer by layer
///
/// Steps of one layer run concurrently on the current task and all of them
/// settle before the next layer starts. The first layer with a failed step
/// ends the run.
#[derive(Default)]
pub struct PipelineRunner {
    executor: StepExecutor,
    trace_sink: Option<Arc<dyn TraceSink>>,
    event_handlers: Vec<EventHandler>,
    last_state: Mutex<Option<RunState>>,
}

impl PipelineRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline-level retry options; step options take precedence
    pub fn with_retry_options(mut self, options: RetryOptions) -> Self {
        self.executor = StepExecutor::new(Some(options));
        self
    }

    /// Send a trace record for every finished step to `sink`
    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace_sink = Some(sink);
        self
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    /// State of the most recent run, if any
    pub async fn last_state(&self) -> Option<RunState> {
        self.last_state.lock().await.clone()
    }

    /// Validate and sort without running anything
    pub fn plan(&self, definition: &PipelineDefinition) -> Result<ExecutionPlan, PipelineError> {
        validate_shape(definition)?;
        validate_structure(definition)?;
        Ok(scheduler::layer(definition)?)
    }

    /// Execute the entire pipeline
    ///
    /// Validation and cycle errors are returned before any step runs. A run
    /// that fails in some layer has already stored the outputs of the steps
    /// that succeeded, but those are dropped along with the context.
    pub async fn run(&self, definition: &PipelineDefinition) -> Result<RunReport, PipelineError> {
        let clock = Instant::now();
        let mut state = RunState::new();
        let execution_id = state.execution_id;
        let pipeline_name = definition.name.as_str();
        state.start(definition.len());

        let plan = match self.plan(definition) {
            Ok(plan) => plan,
            Err(err) => {
                error!(pipeline = pipeline_name, error = %err, "Pipeline rejected before execution");
                state.fail();
                self.store_state(state).await;
                return Err(err);
            }
        };
        state.sorted();

        info!(
            "Starting pipeline execution: {} ({}), {} steps in {} layers",
            pipeline_name,
            execution_id,
            plan.total_steps(),
            plan.len()
        );
        emit(
            &self.event_handlers,
            ExecutionEvent::PipelineStarted {
                execution_id,
                pipeline_name: pipeline_name.to_string(),
                total_steps: plan.total_steps(),
            },
        );

        let store = Arc::new(ExecutionContext::new());
        let mut outcomes: Vec<StepOutcome> = Vec::with_capacity(plan.total_steps());

        for layer in plan.layers() {
            state.enter_layer(layer.index);
            debug!(layer = layer.index, steps = ?layer.step_ids, "Starting layer");
            emit(
                &self.event_handlers,
                ExecutionEvent::LayerStarted {
                    index: layer.index,
                    step_ids: layer.step_ids.clone(),
                },
            );

            let runs = join_all(
                layer
                    .step_ids
                    .iter()
                    .filter_map(|id| definition.step(id))
                    .map(|step| {
                        self.run_step(step, layer.index, store.clone(), execution_id, pipeline_name)
                    }),
            )
            .await;

            let mut failures: Vec<ExecutionError> = Vec::new();
            for run in runs {
                let outcome = run.outcome();
                state.record(&outcome);
                outcomes.push(outcome);
                if let Err(err) = run.result {
                    failures.push(err);
                }
            }

            emit(
                &self.event_handlers,
                ExecutionEvent::LayerFinished {
                    index: layer.index,
                    failed: failures.len(),
                },
            );

            if !failures.is_empty() {
                error!(
                    pipeline = pipeline_name,
                    layer = layer.index,
                    failed = failures.len(),
                    "Pipeline failed"
                );
                state.fail();
                self.store_state(state).await;
                emit(
                    &self.event_handlers,
                    ExecutionEvent::PipelineCompleted {
                        execution_id,
                        status: ExecutionStatus::Failed,
                    },
                );
                return Err(if failures.len() == 1 {
                    PipelineError::Execution(failures.remove(0))
                } else {
                    PipelineError::Aggregate(failures)
                });
            }
        }

        state.complete();
        self.store_state(state).await;

        let duration_ms = clock.elapsed().as_millis() as u64;
        info!(
            "Pipeline {} ({}) completed in {}ms",
            pipeline_name, execution_id, duration_ms
        );
        emit(
            &self.event_handlers,
            ExecutionEvent::PipelineCompleted {
                execution_id,
                status: ExecutionStatus::Completed,
            },
        );

        Ok(RunReport {
            execution_id,
            pipeline_name: pipeline_name.to_string(),
            status: ExecutionStatus::Completed,
            layers: plan.step_ids(),
            outputs: store.snapshot().await,
            steps: outcomes,
            duration_ms,
        })
    }

    /// Execute one step, publish its output and emit its trace
    async fn run_step(
        &self,
        step: &crate::core::StepDefinition,
        layer: usize,
        store: Arc<ExecutionContext>,
        execution_id: Uuid,
        pipeline_name: &str,
    ) -> StepRun {
        let run = self
            .executor
            .execute(step, layer, store.clone(), &self.event_handlers)
            .await;

        match &run.result {
            Ok(attempted) => {
                if !store.set(&run.step_id, attempted.value.clone()).await {
                    error!(step_id = %run.step_id, "Context already holds an output for this step");
                }
                emit(
                    &self.event_handlers,
                    ExecutionEvent::StepCompleted {
                        step_id: run.step_id.clone(),
                        attempts: attempted.attempts,
                        duration_ms: run.duration_ms,
                    },
                );
            }
            Err(err) => emit(
                &self.event_handlers,
                ExecutionEvent::StepFailed {
                    step_id: run.step_id.clone(),
                    attempts: err.attempts,
                    error: err.cause.to_string(),
                },
            ),
        }

        if let Some(sink) = &self.trace_sink {
            if let Err(err) = sink.record(&run.trace(execution_id, pipeline_name)).await {
                error!(step_id = %run.step_id, error = %err, "Failed to record trace");
            }
        }

        run
    }

    async fn store_state(&self, state: RunState) {
        *self.last_state.lock().await = Some(state);
    }
}
