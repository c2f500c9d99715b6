//! Test: Retry Behavior - retries, backoff and policy precedence

use crate::helpers::*;
use layerflow::core::PipelineError;
use serde_json::json;
use std::time::Duration;

/// Linear backoff of 10ms over two retries waits 10 + 20ms
#[tokio::test]
async fn test_linear_backoff_then_success() {
    let yaml = r#"
steps:
  - id: task
    uses: flaky
    params:
      fail_times: 2
      value: done
    retryOptions:
      retries: 2
      backoffMs: 10
      backoffStrategy: linear
"#;

    let run = run_yaml(yaml).await;
    let report = run.report();

    assert_eq!(run.log.count("task"), 3);
    assert_eq!(report.output("task"), Some(&json!("done")));
    assert_eq!(report.outcome("task").unwrap().attempts, 3);
    assert_eq!(run.retries_of("task"), 2);
    assert!(run.elapsed >= Duration::from_millis(30));
}

/// One retry on an always-failing step: two attempts, then an execution error
#[tokio::test]
async fn test_retries_exhausted() {
    let yaml = r#"
steps:
  - id: task
    uses: fail
    params:
      message: "nope"
    retryOptions:
      retries: 1
      backoffStrategy: none
"#;

    let run = run_yaml(yaml).await;

    match run.error() {
        PipelineError::Execution(err) => {
            assert_eq!(err.step_id, "task");
            assert_eq!(err.attempts, 2);
            assert_eq!(err.cause.to_string(), "nope");
        }
        other => panic!("Expected execution error, got {:?}", other),
    }
    assert_eq!(run.log.count("task"), 2);
    assert_eq!(run.trace("task").unwrap().attempts, 2);
}

/// Default policy is a single attempt
#[tokio::test]
async fn test_no_retries_by_default() {
    let yaml = r#"
steps:
  - id: task
    uses: flaky
    params:
      fail_times: 1
"#;

    let run = run_yaml(yaml).await;
    assert!(run.result.is_err());
    assert_eq!(run.log.count("task"), 1);
    assert_eq!(run.retries_of("task"), 0);
}

/// Pipeline-level options apply unless the step overrides them
#[tokio::test]
async fn test_pipeline_options_with_step_override() {
    let yaml = r#"
retryOptions:
  retries: 3
  backoffStrategy: none
steps:
  - id: inherits
    uses: flaky
    params: { fail_times: 3, value: 1 }
  - id: overrides
    uses: flaky
    params: { fail_times: 1, value: 2 }
    retryOptions:
      retries: 0
"#;

    let run = run_yaml(yaml).await;

    assert_eq!(run.log.count("inherits"), 4);
    assert_eq!(run.log.count("overrides"), 1);
    match run.error() {
        PipelineError::Execution(err) => assert_eq!(err.step_id, "overrides"),
        other => panic!("Expected execution error, got {:?}", other),
    }
}
