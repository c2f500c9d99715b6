use anyhow::{Context, Result};
use indicatif::ProgressBar;
use layerflow::cli::commands::{
    PlanCommand, RunCommand, RunOptions, ScheduleCommand, TraceTarget, TracesCommand,
    ValidateCommand,
};
use layerflow::cli::output::*;
use layerflow::cli::{Cli, Command};
use layerflow::core::{PipelineConfig, PipelineDefinition, RetryOptions};
use layerflow::execution::{ExecutionEvent, PipelineRunner};
use layerflow::secrets::SecretInjector;
use layerflow::steps::StepRegistry;
use layerflow::trace::TraceSink;
use layerflow::trigger::{CronTrigger, TriggerOptions};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Plan(cmd) => plan_pipeline(cmd)?,
        Command::Schedule(cmd) => schedule_pipeline(cmd).await?,
        Command::Traces(cmd) => show_traces(cmd).await?,
    }

    Ok(())
}

/// Load a pipeline file and bind its steps, injecting the requested secrets
fn load_pipeline(file: &str, options: &RunOptions) -> Result<(PipelineConfig, PipelineDefinition)> {
    let config = PipelineConfig::from_file(file).context("Failed to load pipeline config")?;

    let mut secrets = SecretInjector::new();
    for (key, value) in &options.secret {
        secrets.insert(key.clone(), value.clone());
    }
    if options.secrets_from_env {
        secrets.extend_missing(SecretInjector::from_env());
    }

    let definition = config
        .to_definition(&StepRegistry::with_builtins(), Some(&secrets))
        .context("Failed to bind pipeline steps")?;

    Ok((config, definition))
}

/// Pipeline-file retry options with command-line overrides applied
fn retry_options(config: &PipelineConfig, options: &RunOptions) -> Option<RetryOptions> {
    match (config.retry_options.clone(), options.retry_overrides()) {
        (Some(file), Some(cli)) => Some(file.merged(&cli)),
        (file, cli) => file.or(cli),
    }
}

/// Trace sink for a run, or `None` when traces are disabled
async fn open_trace_sink(options: &RunOptions) -> Result<Option<Arc<dyn TraceSink>>> {
    let path = match options.trace_target() {
        TraceTarget::Disabled => return Ok(None),
        TraceTarget::Store(path) => path,
    };

    #[cfg(feature = "sqlite")]
    let sink: Arc<dyn TraceSink> = Arc::new(open_trace_store(path.as_deref()).await?);
    #[cfg(not(feature = "sqlite"))]
    let sink: Arc<dyn TraceSink> = {
        if path.is_some() {
            tracing::warn!("Built without sqlite; --trace-db is ignored");
        }
        Arc::new(layerflow::trace::LogTraceSink)
    };

    Ok(Some(sink))
}

#[cfg(feature = "sqlite")]
async fn open_trace_store(path: Option<&str>) -> Result<layerflow::trace::SqliteTraceSink> {
    match path {
        Some(path) => layerflow::trace::SqliteTraceSink::new(path).await,
        None => layerflow::trace::SqliteTraceSink::with_default_path().await,
    }
}

fn build_runner(
    config: &PipelineConfig,
    options: &RunOptions,
    sink: Option<Arc<dyn TraceSink>>,
    progress: Option<ProgressBar>,
) -> PipelineRunner {
    let mut runner = PipelineRunner::new().with_event_handler(move |event| {
        let line = format_execution_event(&event);
        match &progress {
            Some(progress) => {
                progress.println(line);
                match event {
                    ExecutionEvent::PipelineStarted { .. } => progress.set_position(0),
                    ExecutionEvent::StepCompleted { .. } | ExecutionEvent::StepFailed { .. } => {
                        progress.inc(1)
                    }
                    _ => {}
                }
            }
            None => println!("{}", line),
        }
    });

    if let Some(sink) = sink {
        runner = runner.with_trace_sink(sink);
    }
    if let Some(retry) = retry_options(config, options) {
        runner = runner.with_retry_options(retry);
    }
    runner
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let (config, definition) = load_pipeline(&cmd.file, &cmd.options)?;

    println!(
        "{} Loaded pipeline: {}",
        INFO,
        style(&definition.name).bold()
    );

    let sink = open_trace_sink(&cmd.options).await?;
    let tracing_enabled = sink.is_some();
    let progress = create_progress_bar(definition.len());
    let runner = build_runner(&config, &cmd.options, sink, Some(progress.clone()));

    // Execute pipeline
    println!();
    let result = runner.run(&definition).await;
    progress.finish_and_clear();

    let execution_id = runner.last_state().await.map(|state| state.execution_id);
    if let (true, Some(execution_id)) = (tracing_enabled, execution_id) {
        println!(
            "\n{} Traces saved (ID: {})",
            INFO,
            style(execution_id).dim()
        );
    }

    match result {
        Ok(report) => {
            println!();
            for line in format_report(&report) {
                println!("{}", line);
            }
            Ok(())
        }
        Err(err) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&definition.name).bold(),
                style("failed").red()
            );
            for line in error_lines(&err) {
                println!("  {}", style(line).red());
            }
            std::process::exit(1);
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    if !cmd.json {
        println!("{} Validating pipeline...", INFO);
    }

    let mut problems = Vec::new();
    let mut summary = None;

    match PipelineConfig::from_file(&cmd.file) {
        Err(e) => problems.extend(config_error_lines(&e)),
        Ok(config) => {
            if let Some(schedule) = &config.schedule {
                if let Err(e) = CronTrigger::new(schedule.as_str()) {
                    problems.push(e.to_string());
                }
            }
            match config.to_definition(&StepRegistry::with_builtins(), None) {
                Err(e) => problems.extend(config_error_lines(&e)),
                Ok(definition) => match PipelineRunner::new().plan(&definition) {
                    Err(e) => problems.extend(error_lines(&e)),
                    Ok(plan) => summary = Some((definition.name.clone(), plan)),
                },
            }
        }
    }

    let valid = problems.is_empty();
    if cmd.json {
        let data = serde_json::json!({
            "valid": valid,
            "name": summary.as_ref().map(|(name, _)| name.clone()),
            "layers": summary.as_ref().map(|(_, plan)| plan.step_ids()),
            "errors": problems,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else if let (true, Some((name, plan))) = (valid, &summary) {
        println!("{} Pipeline definition is valid!", CHECK);
        println!("  Name: {}", style(name).bold());
        println!("  Steps: {}", style(plan.total_steps()).cyan());
        println!("  Layers: {}", style(plan.len()).cyan());
    } else {
        println!("{} Validation failed:", CROSS);
        for problem in &problems {
            println!("  {}", style(problem).red());
        }
    }

    if !valid {
        std::process::exit(1);
    }
    Ok(())
}

fn plan_pipeline(cmd: &PlanCommand) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let definition = config
        .to_definition(&StepRegistry::with_builtins(), None)
        .context("Failed to bind pipeline steps")?;

    match PipelineRunner::new().plan(&definition) {
        Ok(plan) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                println!(
                    "{} {} ({} steps, {} layers)",
                    INFO,
                    style(&definition.name).bold(),
                    plan.total_steps(),
                    plan.len()
                );
                for line in format_plan(&plan) {
                    println!("{}", line);
                }
            }
            Ok(())
        }
        Err(err) => {
            println!("{} Cannot plan {}:", CROSS, style(&definition.name).bold());
            for line in error_lines(&err) {
                println!("  {}", style(line).red());
            }
            std::process::exit(1);
        }
    }
}

async fn schedule_pipeline(cmd: &ScheduleCommand) -> Result<()> {
    let (config, definition) = load_pipeline(&cmd.file, &cmd.options)?;
    let expr = config
        .schedule
        .clone()
        .context("Pipeline has no schedule")?;
    let trigger = CronTrigger::new(expr)?;

    if let Some(next) = trigger.next_fire_time() {
        println!(
            "{} Scheduling {} on '{}' (next run {})",
            INFO,
            style(&definition.name).bold(),
            style(trigger.expression()).cyan(),
            style(next.to_rfc3339()).dim()
        );
    }

    let sink = open_trace_sink(&cmd.options).await?;
    let runner = build_runner(&config, &cmd.options, sink, None);

    let fired = trigger
        .run(
            || runner.run(&definition),
            TriggerOptions {
                run_on_init: cmd.run_on_init,
                max_runs: cmd.max_runs,
            },
        )
        .await;

    println!("{} Scheduler stopped after {} run(s)", INFO, fired);
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn show_traces(cmd: &TracesCommand) -> Result<()> {
    let store = open_trace_store(cmd.trace_db.as_deref()).await?;

    // If specific execution ID is requested
    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id =
            uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;
        let traces = store.list_traces(exec_id).await?;

        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&traces)?);
        } else if traces.is_empty() {
            println!("{} No traces found for {}", WARN, exec_id);
        } else {
            println!("{} Traces for {}", INFO, style(exec_id).cyan());
            for record in &traces {
                println!("  {}", format_trace(record));
            }
        }
        return Ok(());
    }

    let executions = store.list_executions(cmd.limit).await?;

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else if executions.is_empty() {
        println!("{} No executions found", INFO);
    } else {
        println!("{} Recent executions (showing latest {}):", INFO, cmd.limit);
        for summary in &executions {
            println!("  {}", format_execution_summary(summary));
        }
    }

    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn show_traces(_cmd: &TracesCommand) -> Result<()> {
    anyhow::bail!("Trace storage requires the 'sqlite' feature")
}
