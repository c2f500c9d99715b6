//! Pipeline context - shared per-run store of step outputs

use crate::core::error::StepError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Execution context for a single pipeline run
///
/// Maps a step id to the output it produced. An entry exists only once the
/// step has completed successfully, and it is written once. Steps in the same
/// layer write disjoint keys concurrently, so the map sits behind a lock.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    step_outputs: RwLock<HashMap<String, Value>>,
}

impl ExecutionContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the output of a step, or `None` if it has not completed
    pub async fn get(&self, step_id: &str) -> Option<Value> {
        self.step_outputs.read().await.get(step_id).cloned()
    }

    /// Record the output of a step
    ///
    /// Returns `false` and keeps the existing value if the step already has
    /// an entry.
    pub async fn set(&self, step_id: &str, output: Value) -> bool {
        let mut outputs = self.step_outputs.write().await;
        if outputs.contains_key(step_id) {
            return false;
        }
        outputs.insert(step_id.to_string(), output);
        debug!(step_id, "Context set");
        true
    }

    pub async fn contains(&self, step_id: &str) -> bool {
        self.step_outputs.read().await.contains_key(step_id)
    }

    pub async fn len(&self) -> usize {
        self.step_outputs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.step_outputs.read().await.is_empty()
    }

    /// Copy of every output recorded so far
    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.step_outputs.read().await.clone()
    }
}

/// Read-only view of the context handed to a running step
///
/// Misses are logged here, not in the store, so that lookups of optional
/// upstream results stay visible in the logs.
#[derive(Debug, Clone)]
pub struct StepContext {
    step_id: String,
    store: Arc<ExecutionContext>,
}

impl StepContext {
    pub fn new(step_id: impl Into<String>, store: Arc<ExecutionContext>) -> Self {
        Self {
            step_id: step_id.into(),
            store,
        }
    }

    /// Id of the step this context was created for
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// Look up an upstream output; logs a warning when it is absent
    pub async fn get(&self, key: &str) -> Option<Value> {
        let value = self.store.get(key).await;
        if value.is_none() {
            warn!(step_id = %self.step_id, key, "Context key not found");
        }
        value
    }

    /// Like [`get`](Self::get), but a miss is a step failure
    pub async fn require(&self, key: &str) -> Result<Value, StepError> {
        self.get(key)
            .await
            .ok_or_else(|| StepError::MissingInput(key.to_string()))
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.store.contains(key).await
    }
}
