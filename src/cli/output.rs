//! CLI output formatting

use crate::{
    core::{ConfigError, ExecutionStatus, PipelineError, RunReport},
    execution::{ExecutionEvent, ExecutionPlan},
    trace::TraceRecord,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            total_steps,
        } => format!(
            "{} Starting pipeline {} ({}, {} steps)",
            ROCKET,
            style(pipeline_name).bold(),
            style(short_id(execution_id)).dim(),
            total_steps
        ),
        ExecutionEvent::LayerStarted { index, step_ids } => format!(
            "{} Layer {}: {}",
            INFO,
            style(index).bold(),
            style(step_ids.join(", ")).cyan()
        ),
        ExecutionEvent::StepStarted { step_id, attempt } => {
            if *attempt > 1 {
                format!(
                    "{} {} (attempt {})",
                    SPINNER,
                    style(step_id).cyan(),
                    style(attempt).dim()
                )
            } else {
                format!("{} {}", SPINNER, style(step_id).cyan())
            }
        }
        ExecutionEvent::StepRetrying {
            step_id,
            next_attempt,
            max_attempts,
            delay_ms,
            error,
        } => format!(
            "{} {} failed: {} (attempt {}/{} in {}ms)",
            WARN,
            style(step_id).yellow(),
            style(error).dim(),
            next_attempt,
            max_attempts,
            delay_ms
        ),
        ExecutionEvent::StepCompleted {
            step_id,
            attempts,
            duration_ms,
        } => {
            let attempts = if *attempts > 1 {
                format!(", {} attempts", attempts)
            } else {
                String::new()
            };
            format!(
                "{} {} {}",
                CHECK,
                style(step_id).green(),
                style(format!("({}ms{})", duration_ms, attempts)).dim()
            )
        }
        ExecutionEvent::StepFailed {
            step_id,
            attempts,
            error,
        } => format!(
            "{} {}: {} {}",
            CROSS,
            style(step_id).red(),
            style(error).dim(),
            style(format!("(after {} attempts)", attempts)).dim()
        ),
        ExecutionEvent::LayerFinished { index, failed } => {
            if *failed > 0 {
                format!(
                    "{} Layer {} finished with {} failed step(s)",
                    CROSS,
                    index,
                    style(failed).red()
                )
            } else {
                format!("{} Layer {} finished", INFO, index)
            }
        }
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Completed => {
                    format!("{} completed", style("successfully").green())
                }
                ExecutionStatus::Failed => style("failed").red().to_string(),
            };
            format!(
                "{} Pipeline ({}) {}",
                INFO,
                style(short_id(execution_id)).dim(),
                status_str
            )
        }
    }
}

/// One line per layer
pub fn format_plan(plan: &ExecutionPlan) -> Vec<String> {
    plan.layers()
        .iter()
        .map(|layer| {
            format!(
                "  Layer {}: {}",
                style(layer.index).bold(),
                style(layer.step_ids.join(", ")).cyan()
            )
        })
        .collect()
}

/// Every individual problem carried by a load or run error
pub fn error_lines(err: &PipelineError) -> Vec<String> {
    match err {
        PipelineError::Schema(e) => e.violations.iter().map(ToString::to_string).collect(),
        PipelineError::Structural(e) => e.violations.iter().map(ToString::to_string).collect(),
        PipelineError::Cycle(e) => vec![e.to_string()],
        PipelineError::Execution(e) => vec![e.to_string()],
        PipelineError::Aggregate(errors) => errors.iter().map(ToString::to_string).collect(),
    }
}

/// Like [`error_lines`], for errors raised while loading a pipeline file
pub fn config_error_lines(err: &ConfigError) -> Vec<String> {
    match err {
        ConfigError::Schema(e) => e.violations.iter().map(ToString::to_string).collect(),
        other => vec![other.to_string()],
    }
}

/// Summary printed after a successful run
pub fn format_report(report: &RunReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} completed {} in {}ms ({} steps, {} layers)",
        CHECK,
        style(&report.pipeline_name).bold(),
        style("successfully").green(),
        report.duration_ms,
        report.steps.len(),
        report.layers.len()
    )];
    for outcome in &report.steps {
        lines.push(format!(
            "  {} {} {}",
            style(&outcome.step_id).cyan(),
            style(format!("layer {}", outcome.layer)).dim(),
            style(format!("{} attempt(s), {}ms", outcome.attempts, outcome.duration_ms)).dim()
        ));
    }
    lines
}

/// Format a stored trace record
pub fn format_trace(record: &TraceRecord) -> String {
    let (icon, detail) = match (&record.error, &record.output) {
        (Some(error), _) => (CROSS, style(error.clone()).red().to_string()),
        (None, Some(output)) => (CHECK, format_output(output, 60)),
        (None, None) => (CHECK, String::new()),
    };

    format!(
        "{} {} {} {} {}",
        icon,
        style(record.timestamp.to_rfc3339()).dim(),
        style(&record.step_id).bold(),
        style(format!("[{} attempt(s), {}ms]", record.attempts, record.duration_ms)).dim(),
        detail
    )
}

/// Format one stored execution
#[cfg(feature = "sqlite")]
pub fn format_execution_summary(summary: &crate::trace::store::ExecutionTraceSummary) -> String {
    let icon = if summary.failed_steps > 0 { CROSS } else { CHECK };
    format!(
        "{} {} - {} - {} steps ({} failed) - {}",
        icon,
        style(&summary.execution_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        style(summary.step_count).cyan(),
        summary.failed_steps,
        style(summary.first_trace_at.to_rfc3339()).dim()
    )
}

/// Compact JSON rendering, truncated to `max_chars`
pub fn format_output(output: &Value, max_chars: usize) -> String {
    let rendered = match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if rendered.chars().count() <= max_chars {
        rendered
    } else {
        let truncated: String = rendered.chars().take(max_chars).collect();
        format!("{}{}", truncated, style("...").dim())
    }
}
