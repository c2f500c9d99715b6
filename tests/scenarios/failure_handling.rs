//! Test: Failure Handling - layer barrier and error aggregation

use crate::helpers::*;
use layerflow::core::PipelineError;

/// A failure lets its siblings finish but stops every later layer
#[tokio::test]
async fn test_sibling_failure_stops_pipeline() {
    let yaml = r#"
steps:
  - id: broken
    uses: fail
  - id: slow_ok
    uses: record
    params: { sleep_ms: 40 }
  - id: downstream
    uses: record
    dependsOn: [slow_ok]
"#;

    let run = run_yaml(yaml).await;

    match run.error() {
        PipelineError::Execution(err) => assert_eq!(err.step_id, "broken"),
        other => panic!("Expected execution error, got {:?}", other),
    }

    assert_eq!(run.log.count("slow_ok"), 1);
    assert_eq!(run.log.count("downstream"), 0);

    assert_eq!(run.traces.len(), 2);
    assert!(run.trace("broken").unwrap().error.is_some());
    assert!(run.trace("slow_ok").unwrap().output.is_some());
    assert!(run.trace("downstream").is_none());
}

/// Several failures in one layer are reported together, in layer order
#[tokio::test]
async fn test_multiple_failures_aggregate() {
    let yaml = r#"
steps:
  - id: first
    uses: fail
    params: { message: "first broke" }
  - id: fine
    uses: record
  - id: second
    uses: fail
    params: { message: "second broke" }
"#;

    let run = run_yaml(yaml).await;

    match run.error() {
        PipelineError::Aggregate(errors) => {
            let ids: Vec<&str> = errors.iter().map(|e| e.step_id.as_str()).collect();
            assert_eq!(ids, vec!["first", "second"]);
        }
        other => panic!("Expected aggregate error, got {:?}", other),
    }
    assert_eq!(run.error().execution_failures().len(), 2);
    assert_eq!(run.traces.len(), 3);
}

/// Failure in a middle layer after earlier layers succeeded
#[tokio::test]
async fn test_failure_after_successful_layers() {
    let yaml = r#"
steps:
  - id: fetch
    uses: record
  - id: parse
    uses: fail
    dependsOn: [fetch]
  - id: store
    uses: record
    dependsOn: [parse]
"#;

    let run = run_yaml(yaml).await;

    assert!(!run.error().is_preflight());
    assert_eq!(run.log.count("fetch"), 1);
    assert_eq!(run.log.count("parse"), 1);
    assert_eq!(run.log.count("store"), 0);
}
