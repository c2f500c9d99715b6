//! CLI command definitions

use crate::core::{BackoffStrategy, RetryOptions};
use clap::Args;

/// Run a pipeline once
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long)]
    pub file: String,

    #[command(flatten)]
    pub options: RunOptions,
}

/// Options shared by `run` and `schedule`
#[derive(Debug, Args, Clone, Default)]
pub struct RunOptions {
    /// Pipeline-level retry count (steps may override)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Pipeline-level base backoff in milliseconds
    #[arg(long)]
    pub backoff_ms: Option<u64>,

    /// Pipeline-level backoff strategy
    #[arg(long, value_enum)]
    pub backoff_strategy: Option<BackoffStrategyArg>,

    /// Trace database path (defaults to the user data directory)
    #[arg(long)]
    pub trace_db: Option<String>,

    /// Don't store step traces
    #[arg(long)]
    pub no_traces: bool,

    /// Secret made available to steps (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub secret: Vec<(String, String)>,

    /// Also offer every environment variable as a secret
    #[arg(long)]
    pub secrets_from_env: bool,
}

/// Where a run's step traces go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceTarget {
    /// Nothing is recorded
    Disabled,
    /// Trace database at the given path, or the default one
    Store(Option<String>),
}

impl RunOptions {
    /// `--no-traces` wins over `--trace-db`
    pub fn trace_target(&self) -> TraceTarget {
        if self.no_traces {
            TraceTarget::Disabled
        } else {
            TraceTarget::Store(self.trace_db.clone())
        }
    }

    /// Retry overrides given on the command line, if any
    pub fn retry_overrides(&self) -> Option<RetryOptions> {
        if self.retries.is_none() && self.backoff_ms.is_none() && self.backoff_strategy.is_none() {
            return None;
        }
        Some(RetryOptions {
            retries: self.retries,
            backoff_ms: self.backoff_ms,
            backoff_strategy: self.backoff_strategy.map(Into::into),
        })
    }
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the execution layers of a pipeline
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run a pipeline on its cron schedule
#[derive(Debug, Args, Clone)]
pub struct ScheduleCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long)]
    pub file: String,

    /// Stop after this many runs
    #[arg(long)]
    pub max_runs: Option<usize>,

    /// Run once immediately, then follow the schedule
    #[arg(long)]
    pub run_on_init: bool,

    #[command(flatten)]
    pub options: RunOptions,
}

/// Show stored step traces
#[derive(Debug, Args, Clone)]
pub struct TracesCommand {
    /// Show the traces of one execution
    #[arg(long)]
    pub execution_id: Option<String>,

    /// Number of recent executions to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Trace database path (defaults to the user data directory)
    #[arg(long)]
    pub trace_db: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Backoff strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackoffStrategyArg {
    None,
    Linear,
    Exponential,
}

impl From<BackoffStrategyArg> for BackoffStrategy {
    fn from(arg: BackoffStrategyArg) -> Self {
        match arg {
            BackoffStrategyArg::None => BackoffStrategy::None,
            BackoffStrategyArg::Linear => BackoffStrategy::Linear,
            BackoffStrategyArg::Exponential => BackoffStrategy::Exponential,
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 || parts[0].is_empty() {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
