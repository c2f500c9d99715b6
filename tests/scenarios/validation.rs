//! Test: Validation - every pre-flight rejection happens before any step runs

use crate::helpers::*;
use layerflow::core::{
    step_fn, ConfigError, PipelineConfig, PipelineDefinition, PipelineError, StepDefinition,
    ViolationKind,
};
use layerflow::execution::PipelineRunner;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counting(id: &str, calls: &Arc<AtomicUsize>) -> StepDefinition {
    let calls = calls.clone();
    StepDefinition::new(
        id,
        step_fn(move |v, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(v) }
        }),
    )
}

#[tokio::test]
async fn test_duplicate_and_missing_reported_together() {
    let yaml = r#"
steps:
  - id: a
    uses: record
  - id: a
    uses: record
  - id: b
    uses: record
    dependsOn: [ghost]
"#;

    let run = run_yaml(yaml).await;

    match run.error() {
        PipelineError::Structural(err) => {
            assert_eq!(err.violations.len(), 2);
            assert_eq!(err.violations[0].kind, ViolationKind::DuplicateId);
            assert_eq!(
                err.violations[1].kind,
                ViolationKind::MissingDependency {
                    dependency: "ghost".to_string()
                }
            );
        }
        other => panic!("Expected structural error, got {:?}", other),
    }
    assert_eq!(run.log.total(), 0);
    assert!(run.traces.is_empty());
    assert!(run.events.is_empty());
}

#[tokio::test]
async fn test_step_schedule_rejected() {
    let yaml = r#"
schedule: "*/5 * * * *"
steps:
  - id: a
    uses: record
    schedule: "* * * * *"
"#;

    let run = run_yaml(yaml).await;
    match run.error() {
        PipelineError::Structural(err) => {
            assert_eq!(err.step_ids(), vec!["a"]);
            assert_eq!(err.violations[0].kind, ViolationKind::StepSchedule);
        }
        other => panic!("Expected structural error, got {:?}", other),
    }
    assert_eq!(run.log.total(), 0);
}

#[tokio::test]
async fn test_cycle_rejected_without_running() {
    let calls = Arc::new(AtomicUsize::new(0));
    let definition = PipelineDefinition::new(
        "cycle",
        vec![
            counting("root", &calls),
            counting("a", &calls).depends_on(["root", "b"]),
            counting("b", &calls).depends_on(["a"]),
        ],
    );

    let run = run_definition(&definition, Arc::default()).await;

    match run.error() {
        PipelineError::Cycle(err) => assert!(err.step_id == "a" || err.step_id == "b"),
        other => panic!("Expected cycle error, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_schema_collects_every_violation() {
    let yaml = r#"
name: 42
steps:
  - id: ""
  - dependsOn: "a"
  - id: ok
    retryOptions:
      retries: -1
      backoffStrategy: sometimes
"#;

    match PipelineConfig::from_yaml(yaml) {
        Err(ConfigError::Schema(err)) => {
            let paths: Vec<&str> = err.violations.iter().map(|v| v.path.as_str()).collect();
            assert!(paths.contains(&"/name"));
            assert!(paths.contains(&"/steps/0/id"));
            assert!(paths.contains(&"/steps/1/id"));
            assert!(paths.contains(&"/steps/1/dependsOn"));
            assert!(paths.contains(&"/steps/2/retryOptions/retries"));
            assert!(paths.contains(&"/steps/2/retryOptions/backoffStrategy"));
        }
        other => panic!("Expected schema error, got {:?}", other.map(|c| c.steps.len())),
    }
}

#[test]
fn test_unknown_step_kind() {
    let config = PipelineConfig::from_yaml("steps:\n  - id: a\n    uses: teleport\n").unwrap();
    let err = config
        .to_definition(&mock_registry(Arc::default()), None)
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnknownStepKind { .. }));
}

/// Validating the same definition twice gives the same answer
#[test]
fn test_validation_is_repeatable() {
    let definition = PipelineDefinition::new(
        "twice",
        vec![
            StepDefinition::new("a", step_fn(|v, _| async move { Ok(v) })).depends_on(["nope"]),
            StepDefinition::new("a", step_fn(|v, _| async move { Ok(v) })),
        ],
    );

    let runner = PipelineRunner::new();
    let first = runner.plan(&definition).unwrap_err().to_string();
    let second = runner.plan(&definition).unwrap_err().to_string();
    assert_eq!(first, second);
}
