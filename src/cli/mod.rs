//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{PlanCommand, RunCommand, ScheduleCommand, TracesCommand, ValidateCommand};
use std::ffi::OsString;

/// Layered DAG workflow runner
#[derive(Debug, Parser, Clone)]
#[command(name = "layerflow")]
#[command(version)]
#[command(about = "Validate, plan and run DAG pipelines layer by layer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline once
    Run(RunCommand),

    /// Validate a pipeline definition
    Validate(ValidateCommand),

    /// Show the execution layers of a pipeline
    Plan(PlanCommand),

    /// Run a pipeline on its cron schedule
    Schedule(ScheduleCommand),

    /// Show stored step traces
    Traces(TracesCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
