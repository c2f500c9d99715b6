//! Pipeline domain model

use crate::core::step::StepDefinition;

/// A pipeline definition: an ordered list of steps plus an optional
/// pipeline-level schedule
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    /// Pipeline name, used in logs and trace records
    pub name: String,

    /// Pipeline steps, in declaration order
    pub steps: Vec<StepDefinition>,

    /// Cron expression consumed by the trigger; opaque to the engine
    pub schedule: Option<String>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<StepDefinition>) -> Self {
        Self {
            name: name.into(),
            steps,
            schedule: None,
        }
    }

    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    /// Get a step by ID (first match if ids are not yet validated)
    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
