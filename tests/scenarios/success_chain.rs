//! Test: Success Chain - layered execution of a dependency graph

use crate::helpers::*;
use serde_json::json;

/// Diamond graph runs in three layers and every step sees its upstream outputs
#[tokio::test]
async fn test_diamond_layers_and_context() {
    let yaml = r#"
name: "Test: Diamond"
steps:
  - id: a
    uses: record
    params:
      value: { v: 1 }
  - id: b
    uses: record
    dependsOn: [a]
    params:
      reads: [a]
      sleep_ms: 50
  - id: c
    uses: record
    dependsOn: [a]
    params:
      reads: [a]
      sleep_ms: 50
  - id: d
    uses: record
    dependsOn: [b, c]
    params:
      reads: [b, c]
"#;

    let run = run_yaml(yaml).await;
    let report = run.report();

    assert_eq!(report.layers, vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
    assert_eq!(report.output("b").unwrap()["seen"]["a"], json!({"v": 1}));
    assert_eq!(report.output("c").unwrap()["seen"]["a"], json!({"v": 1}));
    assert_eq!(report.output("d").unwrap()["seen"]["b"]["step"], json!("b"));
    assert_eq!(report.outputs.len(), 4);
    assert_eq!(run.traces.len(), 4);
}

/// Dependencies finish before dependents start; siblings overlap
#[tokio::test]
async fn test_ordering_and_concurrency() {
    let yaml = r#"
steps:
  - id: a
    uses: record
    params: { sleep_ms: 10 }
  - id: b
    uses: record
    dependsOn: [a]
    params: { sleep_ms: 80 }
  - id: c
    uses: record
    dependsOn: [a]
    params: { sleep_ms: 80 }
  - id: d
    uses: record
    dependsOn: [b, c]
"#;

    let run = run_yaml(yaml).await;
    run.report();

    let a = run.log.first("a").unwrap();
    let b = run.log.first("b").unwrap();
    let c = run.log.first("c").unwrap();
    let d = run.log.first("d").unwrap();

    assert!(a.finished <= b.started);
    assert!(a.finished <= c.started);
    assert!(b.finished <= d.started);
    assert!(c.finished <= d.started);

    // b and c share a layer, so their runs overlap
    assert!(b.started < c.finished && c.started < b.finished);
}

/// Steps without dependencies all land in the first layer, in declaration order
#[tokio::test]
async fn test_independent_steps_single_layer() {
    let yaml = r#"
steps:
  - id: z
    uses: record
  - id: m
    uses: record
  - id: a
    uses: record
"#;

    let run = run_yaml(yaml).await;
    assert_eq!(run.report().layers, vec![vec!["z", "m", "a"]]);
    assert_eq!(run.log.total(), 3);
}

/// Built-in echo and template steps chained through the context
#[tokio::test]
async fn test_template_reads_upstream_fields() {
    let yaml = r#"
name: greeting
steps:
  - id: user
    params:
      name: ada
      visits: 3
  - id: greet
    uses: template
    dependsOn: [user]
    params:
      template: "hello {{ steps.user.name }}, visit #{{ steps.user.visits }}"
"#;

    let run = run_yaml(yaml).await;
    let report = run.report();

    assert_eq!(report.pipeline_name, "greeting");
    assert_eq!(report.output("user"), Some(&json!({"name": "ada", "visits": 3})));
    assert_eq!(
        report.output("greet"),
        Some(&json!({"text": "hello ada, visit #3"}))
    );
}

/// A step reading an id that never ran gets nothing, and the run still succeeds
#[tokio::test]
async fn test_context_miss_is_not_fatal() {
    let yaml = r#"
steps:
  - id: lonely
    uses: record
    params:
      reads: [ghost]
"#;

    let run = run_yaml(yaml).await;
    assert_eq!(
        run.report().output("lonely").unwrap()["seen"]["ghost"],
        serde_json::Value::Null
    );
}
