//! Per-step trace records and the sinks that receive them

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteTraceSink;

use crate::secrets::mask_secrets;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Telemetry for one executed step, emitted whether it succeeded or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Run this step belonged to
    pub execution_id: Uuid,

    pub pipeline_name: String,

    pub step_id: String,

    /// Params the step was invoked with (secrets masked)
    pub input: Value,

    /// Output on success
    pub output: Option<Value>,

    /// Error message of the last attempt on failure
    pub error: Option<String>,

    pub attempts: u32,

    /// Wall time across all attempts, backoff included
    pub duration_ms: u64,

    /// When the record was produced
    pub timestamp: DateTime<Utc>,
}

impl TraceRecord {
    /// Build a record; any injected secrets in `input` are masked
    pub fn new(
        execution_id: Uuid,
        pipeline_name: impl Into<String>,
        step_id: impl Into<String>,
        input: &Value,
    ) -> Self {
        Self {
            execution_id,
            pipeline_name: pipeline_name.into(),
            step_id: step_id.into(),
            input: mask_secrets(input),
            output: None,
            error: None,
            attempts: 0,
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Destination for trace records
///
/// Failures are reported to the caller, which logs them and carries on; a
/// sink can never fail a run.
#[async_trait::async_trait]
pub trait TraceSink: Send + Sync {
    async fn record(&self, record: &TraceRecord) -> Result<()>;
}

/// Writes trace records to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTraceSink;

#[async_trait::async_trait]
impl TraceSink for LogTraceSink {
    async fn record(&self, record: &TraceRecord) -> Result<()> {
        info!(
            execution_id = %record.execution_id,
            step_id = %record.step_id,
            attempts = record.attempts,
            duration_ms = record.duration_ms,
            error = record.error.as_deref().unwrap_or(""),
            "Step trace"
        );
        Ok(())
    }
}

/// In-memory trace sink (for testing or ephemeral use)
#[derive(Debug, Default)]
pub struct InMemoryTraceSink {
    records: RwLock<Vec<TraceRecord>>,
}

impl InMemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records received so far, in arrival order
    pub async fn records(&self) -> Vec<TraceRecord> {
        self.records.read().await.clone()
    }

    pub async fn for_step(&self, step_id: &str) -> Vec<TraceRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.step_id == step_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl TraceSink for InMemoryTraceSink {
    async fn record(&self, record: &TraceRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }
}
