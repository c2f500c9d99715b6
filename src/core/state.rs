//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Phase of a pipeline run
///
/// `NotStarted -> Validating -> Sorted -> Executing { layer } -> Completed | Failed`.
/// Validation and sorting failures go straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    NotStarted,
    Validating,
    Sorted,
    Executing { layer: usize },
    Completed,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed)
    }
}

/// Final status of a run, as stored alongside its traces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

/// How a single step ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepStatus {
    Completed,
    Failed { error: String },
}

/// Record of one step within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub layer: usize,
    pub status: StepStatus,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl StepOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, StepStatus::Completed)
    }
}

/// Overall state of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique execution ID
    pub execution_id: Uuid,

    pub phase: RunPhase,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When execution completed/failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of steps
    pub total_steps: usize,

    /// Number of completed steps
    pub completed_steps: usize,

    /// Number of failed steps
    pub failed_steps: usize,
}

impl RunState {
    /// Create a new run state
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            phase: RunPhase::NotStarted,
            started_at: None,
            completed_at: None,
            total_steps: 0,
            completed_steps: 0,
            failed_steps: 0,
        }
    }

    /// Mark run as started and validating
    pub fn start(&mut self, total_steps: usize) {
        self.phase = RunPhase::Validating;
        self.started_at = Some(Utc::now());
        self.total_steps = total_steps;
    }

    pub fn sorted(&mut self) {
        self.phase = RunPhase::Sorted;
    }

    pub fn enter_layer(&mut self, layer: usize) {
        self.phase = RunPhase::Executing { layer };
    }

    pub fn record(&mut self, outcome: &StepOutcome) {
        if outcome.succeeded() {
            self.completed_steps += 1;
        } else {
            self.failed_steps += 1;
        }
    }

    /// Mark run as completed
    pub fn complete(&mut self) {
        self.phase = RunPhase::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark run as failed
    pub fn fail(&mut self) {
        self.phase = RunPhase::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// Calculate progress percentage (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        (self.completed_steps + self.failed_steps) as f64 / self.total_steps as f64
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub execution_id: Uuid,
    pub pipeline_name: String,
    pub status: ExecutionStatus,

    /// Step ids grouped by layer, layer 0 first
    pub layers: Vec<Vec<String>>,

    /// Final contents of the execution context
    pub outputs: HashMap<String, Value>,

    pub steps: Vec<StepOutcome>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn output(&self, step_id: &str) -> Option<&Value> {
        self.outputs.get(step_id)
    }

    pub fn outcome(&self, step_id: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }
}
