//! Shape checks for pipeline definitions
//!
//! Every violation is collected before returning, so a broken file can be
//! fixed in one pass.

use crate::core::error::{SchemaError, SchemaViolation};
use crate::core::PipelineDefinition;
use serde_json::{Map, Value};

const BACKOFF_STRATEGIES: [&str; 3] = ["none", "linear", "exponential"];

/// Check a raw (parsed but untyped) pipeline document
pub fn validate_value(raw: &Value) -> Result<(), SchemaError> {
    let mut violations = Vec::new();

    let Some(root) = raw.as_object() else {
        violations.push(SchemaViolation::new("/", "definition must be an object"));
        return Err(SchemaError { violations });
    };

    optional_string(root, "name", "", &mut violations);
    optional_string(root, "schedule", "", &mut violations);
    if let Some(options) = field(root, &["retryOptions", "retry_options"]) {
        check_retry_options(options, "/retryOptions", &mut violations);
    }

    match root.get("steps") {
        None => violations.push(SchemaViolation::new("/steps", "required property missing")),
        Some(Value::Array(steps)) => {
            for (index, step) in steps.iter().enumerate() {
                check_step(step, &format!("/steps/{}", index), &mut violations);
            }
        }
        Some(_) => violations.push(SchemaViolation::new("/steps", "must be an array")),
    }

    finish(violations)
}

/// Check an already typed definition
///
/// The type system guarantees the overall shape; what remains is that every
/// step carries a usable id.
pub fn validate_shape(definition: &PipelineDefinition) -> Result<(), SchemaError> {
    let violations = definition
        .steps
        .iter()
        .enumerate()
        .filter(|(_, step)| step.id.trim().is_empty())
        .map(|(index, _)| {
            SchemaViolation::new(format!("/steps/{}/id", index), "must be a non-empty string")
        })
        .collect();

    finish(violations)
}

fn finish(violations: Vec<SchemaViolation>) -> Result<(), SchemaError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaError { violations })
    }
}

fn check_step(step: &Value, path: &str, violations: &mut Vec<SchemaViolation>) {
    let Some(step) = step.as_object() else {
        violations.push(SchemaViolation::new(path, "step must be an object"));
        return;
    };

    match step.get("id") {
        None => violations.push(SchemaViolation::new(
            format!("{}/id", path),
            "required property missing",
        )),
        Some(Value::String(id)) if !id.trim().is_empty() => {}
        Some(_) => violations.push(SchemaViolation::new(
            format!("{}/id", path),
            "must be a non-empty string",
        )),
    }

    optional_string(step, "uses", path, violations);
    optional_string(step, "schedule", path, violations);
    string_array(step, &["dependsOn", "depends_on"], path, violations);
    string_array(step, &["secrets"], path, violations);

    if let Some(options) = field(step, &["retryOptions", "retry_options"]) {
        check_retry_options(options, &format!("{}/retryOptions", path), violations);
    }
}

fn check_retry_options(options: &Value, path: &str, violations: &mut Vec<SchemaViolation>) {
    let Some(options) = options.as_object() else {
        violations.push(SchemaViolation::new(path, "must be an object"));
        return;
    };

    for (names, label) in [
        (&["retries"][..], "retries"),
        (&["backoffMs", "backoff_ms"][..], "backoffMs"),
    ] {
        if let Some(value) = field(options, names) {
            if value.as_u64().is_none() {
                violations.push(SchemaViolation::new(
                    format!("{}/{}", path, label),
                    "must be a non-negative integer",
                ));
            }
        }
    }

    if let Some(strategy) = field(options, &["backoffStrategy", "backoff_strategy"]) {
        let known = strategy
            .as_str()
            .is_some_and(|s| BACKOFF_STRATEGIES.contains(&s));
        if !known {
            violations.push(SchemaViolation::new(
                format!("{}/backoffStrategy", path),
                "must be one of \"none\", \"linear\", \"exponential\"",
            ));
        }
    }
}

fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| object.get(*name))
}

fn optional_string(
    object: &Map<String, Value>,
    name: &str,
    path: &str,
    violations: &mut Vec<SchemaViolation>,
) {
    if let Some(value) = object.get(name) {
        if !value.is_string() {
            violations.push(SchemaViolation::new(
                format!("{}/{}", path, name),
                "must be a string",
            ));
        }
    }
}

fn string_array(
    object: &Map<String, Value>,
    names: &[&str],
    path: &str,
    violations: &mut Vec<SchemaViolation>,
) {
    let Some(value) = field(object, names) else {
        return;
    };
    let valid = value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string));
    if !valid {
        violations.push(SchemaViolation::new(
            format!("{}/{}", path, names[0]),
            "must be an array of strings",
        ));
    }
}
