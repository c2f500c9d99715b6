//! Core domain models for pipelines
//!
//! This module defines the fundamental data structures that represent
//! pipeline definitions, steps, the per-run context and run state.

pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod step;

pub use config::{BackoffStrategy, ConfigError, PipelineConfig, RetryOptions, RetryPolicy, StepConfig};
pub use context::*;
pub use error::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
