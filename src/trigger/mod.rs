//! Outer triggers that decide when a pipeline runs

pub mod cron;

pub use self::cron::{CronTrigger, TriggerError, TriggerOptions};
