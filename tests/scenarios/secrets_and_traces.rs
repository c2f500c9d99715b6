//! Test: Secrets and Traces - injected secrets reach steps but never traces

use crate::helpers::*;
use layerflow::secrets::SecretInjector;
use serde_json::json;

fn injector() -> SecretInjector {
    let mut secrets = SecretInjector::new();
    secrets.insert("API_TOKEN", "tok-123");
    secrets.insert("OTHER", "unused");
    secrets
}

#[tokio::test]
async fn test_secrets_injected_and_masked_in_traces() {
    let yaml = r#"
steps:
  - id: call
    secrets: [API_TOKEN]
    params:
      url: https://example.com
"#;

    let run = run_yaml_with_secrets(yaml, Some(&injector())).await;

    // echo returns its params, so the step saw the real value
    let output = run.report().output("call").unwrap();
    assert_eq!(output["secrets"], json!({"API_TOKEN": "tok-123"}));

    let trace = run.trace("call").unwrap();
    assert_eq!(trace.input["secrets"]["API_TOKEN"], json!("***"));
    assert_eq!(trace.input["url"], json!("https://example.com"));

    let traced_output = trace.output.as_ref().unwrap();
    assert_eq!(traced_output["secrets"]["API_TOKEN"], json!("***"));
    assert_eq!(traced_output["url"], json!("https://example.com"));
    assert!(!serde_json::to_string(&trace).unwrap().contains("tok-123"));
}

#[tokio::test]
async fn test_steps_without_secrets_get_none() {
    let yaml = r#"
steps:
  - id: plain
    params: { x: 1 }
"#;

    let run = run_yaml_with_secrets(yaml, Some(&injector())).await;
    assert_eq!(run.report().output("plain"), Some(&json!({"x": 1})));
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_step_receives_secret_env() {
    let yaml = r#"
steps:
  - id: shell
    uses: command
    secrets: ["*"]
    params:
      program: sh
      args: ["-c", "printf %s \"$API_TOKEN\""]
"#;

    let run = run_yaml_with_secrets(yaml, Some(&injector())).await;
    let output = run.report().output("shell").unwrap();

    assert_eq!(output["stdout"], json!("tok-123"));
    assert_eq!(output["code"], json!(0));
    let trace = run.trace("shell").unwrap();
    assert_eq!(
        trace.input["secrets"],
        json!({"API_TOKEN": "***", "OTHER": "***"})
    );
    assert_eq!(trace.output.as_ref().unwrap()["stdout"], json!("***"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_llm_step_prompt_from_upstream() {
    let yaml = r#"
steps:
  - id: topic
    params: { name: layers }
  - id: ask
    uses: llm
    dependsOn: [topic]
    secrets: [API_TOKEN]
    params:
      program: sh
      args: ["-c"]
      model: tiny
      prompt: "printf '%s:%s' {{ steps.topic.name }} \"$API_TOKEN\""
"#;

    let run = run_yaml_with_secrets(yaml, Some(&injector())).await;
    let output = run.report().output("ask").unwrap();

    assert_eq!(output["text"], json!("layers:tok-123"));
    assert_eq!(output["model"], json!("tiny"));

    let trace = run.trace("ask").unwrap();
    assert_eq!(trace.output.as_ref().unwrap()["text"], json!("layers:***"));
}

#[tokio::test]
async fn test_trace_fields() {
    let yaml = r#"
name: traced
steps:
  - id: ok
    uses: record
    params: { value: 5 }
  - id: bad
    uses: fail
    dependsOn: [ok]
"#;

    let run = run_yaml(yaml).await;
    assert!(run.result.is_err());

    let ok = run.trace("ok").unwrap();
    let bad = run.trace("bad").unwrap();
    assert_eq!(ok.pipeline_name, "traced");
    assert_eq!(ok.output, Some(json!(5)));
    assert_eq!(ok.attempts, 1);
    assert_eq!(bad.error.as_deref(), Some("always fails"));
    assert_eq!(ok.execution_id, bad.execution_id);
}
