//! Scenario-based tests for layerflow

mod helpers;

mod failure_handling;
mod retry_behavior;
mod secrets_and_traces;
mod success_chain;
mod validation;
