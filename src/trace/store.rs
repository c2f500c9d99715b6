//! SQLite-based trace store

use crate::trace::{TraceRecord, TraceSink};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

/// One row per run, aggregated from its trace records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTraceSummary {
    pub execution_id: Uuid,
    pub pipeline_name: String,
    pub first_trace_at: DateTime<Utc>,
    pub step_count: usize,
    pub failed_steps: usize,
}

/// SQLite trace sink
pub struct SqliteTraceSink {
    pool: SqlitePool,
}

impl SqliteTraceSink {
    /// Open (or create) a trace database
    ///
    /// `":memory:"` gives a private in-memory database on a single connection.
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .context("Invalid database path")?
            .create_if_missing(true);

        let max_connections = if db_path == ":memory:" { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let db_path = Self::default_path()?;
        Self::new(&db_path.to_string_lossy()).await
    }

    /// `<data dir>/layerflow/traces.db`, creating the directory if needed
    pub fn default_path() -> Result<std::path::PathBuf> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("layerflow");
        std::fs::create_dir_all(&db_dir)?;
        Ok(db_dir.join("traces.db"))
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS traces (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                execution_id TEXT NOT NULL,
                pipeline_name TEXT NOT NULL,
                step_id TEXT NOT NULL,
                input TEXT NOT NULL,
                output TEXT,
                error TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_execution_id ON traces(execution_id);
            CREATE INDEX IF NOT EXISTS idx_timestamp ON traces(timestamp);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    /// All trace records of one run, oldest first
    pub async fn list_traces(&self, execution_id: Uuid) -> Result<Vec<TraceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT execution_id, pipeline_name, step_id, input, output, error, attempts, duration_ms, timestamp
            FROM traces
            WHERE execution_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(execution_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list traces")?;

        rows.iter()
            .map(|row| -> Result<TraceRecord> {
                let output: Option<String> = row.get("output");
                Ok(TraceRecord {
                    execution_id: Uuid::parse_str(&row.get::<String, _>("execution_id"))?,
                    pipeline_name: row.get("pipeline_name"),
                    step_id: row.get("step_id"),
                    input: serde_json::from_str(&row.get::<String, _>("input"))?,
                    output: output.map(|o| serde_json::from_str(&o)).transpose()?,
                    error: row.get("error"),
                    attempts: row.get::<i64, _>("attempts") as u32,
                    duration_ms: row.get::<i64, _>("duration_ms") as u64,
                    timestamp: Self::from_naive(row.get("timestamp")),
                })
            })
            .collect()
    }

    /// Most recent runs, newest first
    pub async fn list_executions(&self, limit: usize) -> Result<Vec<ExecutionTraceSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT execution_id,
                   MIN(pipeline_name) AS pipeline_name,
                   MIN(timestamp) AS first_trace_at,
                   COUNT(*) AS step_count,
                   SUM(CASE WHEN error IS NULL THEN 0 ELSE 1 END) AS failed_steps
            FROM traces
            GROUP BY execution_id
            ORDER BY first_trace_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list executions")?;

        rows.iter()
            .map(|row| -> Result<ExecutionTraceSummary> {
                let first_trace_at: String = row.get("first_trace_at");
                Ok(ExecutionTraceSummary {
                    execution_id: Uuid::parse_str(&row.get::<String, _>("execution_id"))?,
                    pipeline_name: row.get("pipeline_name"),
                    first_trace_at: Self::from_naive(parse_naive(&first_trace_at)?),
                    step_count: row.get::<i64, _>("step_count") as usize,
                    failed_steps: row.get::<i64, _>("failed_steps") as usize,
                })
            })
            .collect()
    }
}

/// Aggregates come back as plain text, so parse the stored timestamp format
fn parse_naive(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .with_context(|| format!("Invalid timestamp in trace store: {}", text))
}

#[async_trait::async_trait]
impl TraceSink for SqliteTraceSink {
    async fn record(&self, record: &TraceRecord) -> Result<()> {
        let output = record
            .output
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO traces
            (execution_id, pipeline_name, step_id, input, output, error, attempts, duration_ms, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(record.execution_id.to_string())
        .bind(&record.pipeline_name)
        .bind(&record.step_id)
        .bind(serde_json::to_string(&record.input)?)
        .bind(output)
        .bind(&record.error)
        .bind(record.attempts as i64)
        .bind(record.duration_ms as i64)
        .bind(Self::to_naive(record.timestamp))
        .execute(&self.pool)
        .await
        .context("Failed to save trace")?;

        Ok(())
    }
}
