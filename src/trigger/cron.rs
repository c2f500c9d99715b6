//! Cron trigger (scheduled execution).
//!
//! Accepts the classic 5-field form (`min hour day month weekday`) as well as
//! the 6/7-field form with seconds (and year) understood by the `cron` crate.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::fmt::Display;
use std::future::Future;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error, PartialEq)]
pub enum TriggerError {
    #[error("invalid cron expression '{expr}': {message}")]
    InvalidExpression { expr: String, message: String },
}

/// How [`CronTrigger::run`] behaves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerOptions {
    /// Fire once immediately before waiting for the first scheduled time
    pub run_on_init: bool,

    /// Stop after this many fires (counting the initial one); `None` runs forever
    pub max_runs: Option<usize>,
}

/// Cron schedule trigger.
#[derive(Debug, Clone)]
pub struct CronTrigger {
    schedule: Schedule,
    /// Expression as given, for display
    expr: String,
}

impl CronTrigger {
    /// Parse a cron expression
    pub fn new(expr: impl Into<String>) -> Result<Self, TriggerError> {
        let expr = expr.into();
        let normalized = normalize(&expr);
        let schedule =
            Schedule::from_str(&normalized).map_err(|e| TriggerError::InvalidExpression {
                expr: expr.clone(),
                message: e.to_string(),
            })?;

        Ok(Self { schedule, expr })
    }

    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// Get the next scheduled time.
    pub fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.schedule.upcoming(Utc).next()
    }

    /// The next `count` scheduled times
    pub fn upcoming(&self, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.upcoming(Utc).take(count).collect()
    }

    /// Invoke `job` on every scheduled time until `max_runs` is reached
    ///
    /// A failed run is logged and the loop keeps going. Returns the number of
    /// times the job was fired.
    pub async fn run<F, Fut, T, E>(&self, mut job: F, options: TriggerOptions) -> usize
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        info!(schedule = %self.expr, "Cron trigger started");

        let limit_reached = |fired: usize| options.max_runs.is_some_and(|max| fired >= max);
        let mut fired = 0usize;

        if options.run_on_init && !limit_reached(fired) {
            info!(schedule = %self.expr, "Running job on init");
            fire(&mut job, fired).await;
            fired += 1;
        }

        while !limit_reached(fired) {
            let now = Utc::now();
            let Some(next) = self.next_fire_time() else {
                warn!(schedule = %self.expr, "No more scheduled times");
                break;
            };

            let wait = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);
            debug!(next_fire = %next, wait_secs = wait.as_secs(), "Waiting for next cron fire");
            tokio::time::sleep(wait).await;

            info!(scheduled_time = %next, "Cron trigger fired");
            fire(&mut job, fired).await;
            fired += 1;
        }

        info!(schedule = %self.expr, fired, "Cron trigger stopped");
        fired
    }
}

async fn fire<F, Fut, T, E>(job: &mut F, run: usize)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    if let Err(err) = job().await {
        error!(run = run + 1, error = %err, "Scheduled run failed");
    }
}

/// Prefix a seconds field onto 5-field expressions
fn normalize(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}
