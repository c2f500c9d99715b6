//! Test utility functions for layerflow

#![allow(dead_code)]

use async_trait::async_trait;
use layerflow::core::{
    PipelineConfig, PipelineDefinition, PipelineError, RunReport, StepBody, StepContext, StepError,
};
use layerflow::execution::{ExecutionEvent, PipelineRunner};
use layerflow::secrets::SecretInjector;
use layerflow::steps::StepRegistry;
use layerflow::trace::{InMemoryTraceSink, TraceRecord};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// One invocation of a mock step
#[derive(Debug, Clone)]
pub struct Call {
    pub step_id: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Shared record of every mock step invocation
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<Call>>,
}

impl CallLog {
    fn push(&self, step_id: &str, started: Instant) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push(Call {
            step_id: step_id.to_string(),
            started,
            finished: Instant::now(),
        });
        calls.iter().filter(|c| c.step_id == step_id).count()
    }

    pub fn count(&self, step_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.step_id == step_id)
            .count()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn first(&self, step_id: &str) -> Option<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.step_id == step_id)
            .cloned()
    }

    pub fn last(&self, step_id: &str) -> Option<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.step_id == step_id)
            .cloned()
    }
}

async fn pause(params: &Value) {
    if let Some(ms) = params.get("sleep_ms").and_then(Value::as_u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// `record`: reads the ids listed in `params.reads` and returns what it saw
///
/// Output is `params.value` when given, otherwise `{ step, seen }`.
pub struct RecordingStep {
    log: Arc<CallLog>,
}

#[async_trait]
impl StepBody for RecordingStep {
    async fn run(&self, input: Value, ctx: StepContext) -> Result<Value, StepError> {
        let started = Instant::now();
        let mut seen = Map::new();
        if let Some(reads) = input.get("reads").and_then(Value::as_array) {
            for id in reads.iter().filter_map(Value::as_str) {
                seen.insert(id.to_string(), ctx.get(id).await.unwrap_or(Value::Null));
            }
        }
        pause(&input).await;
        self.log.push(ctx.step_id(), started);

        Ok(input
            .get("value")
            .cloned()
            .unwrap_or_else(|| json!({ "step": ctx.step_id(), "seen": seen })))
    }
}

/// `flaky`: fails the first `params.fail_times` calls, then returns `params.value`
pub struct FlakyStep {
    log: Arc<CallLog>,
}

#[async_trait]
impl StepBody for FlakyStep {
    async fn run(&self, input: Value, ctx: StepContext) -> Result<Value, StepError> {
        let started = Instant::now();
        pause(&input).await;
        let call = self.log.push(ctx.step_id(), started);
        let fail_times = input.get("fail_times").and_then(Value::as_u64).unwrap_or(0) as usize;

        if call <= fail_times {
            Err(StepError::failed(format!("flaky failure {}", call)))
        } else {
            Ok(input.get("value").cloned().unwrap_or(Value::Null))
        }
    }
}

/// `fail`: always fails with `params.message`
pub struct AlwaysFail {
    log: Arc<CallLog>,
}

#[async_trait]
impl StepBody for AlwaysFail {
    async fn run(&self, input: Value, ctx: StepContext) -> Result<Value, StepError> {
        let started = Instant::now();
        pause(&input).await;
        self.log.push(ctx.step_id(), started);
        let message = input
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("always fails")
            .to_string();
        Err(StepError::Failed(message))
    }
}

/// Built-in kinds plus `record`, `flaky` and `fail`, all logging to `log`
pub fn mock_registry(log: Arc<CallLog>) -> StepRegistry {
    let mut registry = StepRegistry::with_builtins();
    registry
        .register("record", Arc::new(RecordingStep { log: log.clone() }))
        .register("flaky", Arc::new(FlakyStep { log: log.clone() }))
        .register("fail", Arc::new(AlwaysFail { log }));
    registry
}

/// Everything observable about one scenario run
pub struct ScenarioRun {
    pub result: Result<RunReport, PipelineError>,
    pub log: Arc<CallLog>,
    pub traces: Vec<TraceRecord>,
    pub events: Vec<ExecutionEvent>,
    pub elapsed: Duration,
}

impl ScenarioRun {
    pub fn report(&self) -> &RunReport {
        match &self.result {
            Ok(report) => report,
            Err(err) => panic!("Expected pipeline to complete, got {}", err),
        }
    }

    pub fn error(&self) -> &PipelineError {
        match &self.result {
            Ok(_) => panic!("Expected pipeline to fail"),
            Err(err) => err,
        }
    }

    pub fn trace(&self, step_id: &str) -> Option<&TraceRecord> {
        self.traces.iter().find(|t| t.step_id == step_id)
    }

    pub fn retries_of(&self, step_id: &str) -> usize {
        self.events
            .iter()
            .filter(|event| {
                matches!(event, ExecutionEvent::StepRetrying { step_id: id, .. } if id == step_id)
            })
            .count()
    }
}

/// Load `yaml`, bind it against the mock registry and run it
pub async fn run_yaml(yaml: &str) -> ScenarioRun {
    run_yaml_with_secrets(yaml, None).await
}

pub async fn run_yaml_with_secrets(yaml: &str, secrets: Option<&SecretInjector>) -> ScenarioRun {
    let config = PipelineConfig::from_yaml(yaml).unwrap();
    let log = Arc::new(CallLog::default());
    let definition = config
        .to_definition(&mock_registry(log.clone()), secrets)
        .unwrap();

    let mut harness = Harness::new();
    if let Some(options) = config.retry_options.clone() {
        harness.runner = harness.runner.with_retry_options(options);
    }
    harness.run(&definition, log).await
}

/// Run an already built definition
pub async fn run_definition(definition: &PipelineDefinition, log: Arc<CallLog>) -> ScenarioRun {
    Harness::new().run(definition, log).await
}

struct Harness {
    runner: PipelineRunner,
    sink: Arc<InMemoryTraceSink>,
    events: Arc<Mutex<Vec<ExecutionEvent>>>,
}

impl Harness {
    fn new() -> Self {
        let sink = Arc::new(InMemoryTraceSink::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        let runner = PipelineRunner::new()
            .with_trace_sink(sink.clone())
            .with_event_handler(move |event| seen.lock().unwrap().push(event));

        Self {
            runner,
            sink,
            events,
        }
    }

    async fn run(self, definition: &PipelineDefinition, log: Arc<CallLog>) -> ScenarioRun {
        let clock = Instant::now();
        let result = self.runner.run(definition).await;
        let elapsed = clock.elapsed();
        let events = self.events.lock().unwrap().clone();

        ScenarioRun {
            result,
            log,
            traces: self.sink.records().await,
            events,
            elapsed,
        }
    }
}
