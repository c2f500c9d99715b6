//! Secret injection into step params

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Key under which injected secrets appear in a step's params
pub const SECRETS_KEY: &str = "secrets";

/// Replacement shown instead of a secret value
pub const MASK: &str = "***";

/// Selector that grants a step every known secret
pub const ALL_SECRETS: &str = "*";

/// Named secrets available to pipeline steps
#[derive(Clone, Default)]
pub struct SecretInjector {
    secrets: HashMap<String, String>,
}

impl SecretInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }

    /// Snapshot of the process environment
    pub fn from_env() -> Self {
        Self::from_map(std::env::vars().collect())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.secrets.insert(name.into(), value.into());
    }

    /// Add secrets without replacing ones already present
    pub fn extend_missing(&mut self, other: SecretInjector) {
        for (name, value) in other.secrets {
            self.secrets.entry(name).or_insert(value);
        }
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Return `params` with a `secrets` object holding the required secrets
    ///
    /// `required` names the secrets to include; `*` selects all of them.
    /// Unknown or empty secrets are skipped. Params that are not an object
    /// are kept under `params`. Use [`mask_secrets`] for a display copy.
    pub fn inject(&self, params: Value, required: &[String]) -> Value {
        let all = required.iter().any(|name| name == ALL_SECRETS);

        let mut selected = Map::new();
        if all {
            let mut names: Vec<&String> = self.secrets.keys().collect();
            names.sort();
            for name in names {
                self.select(name, &mut selected);
            }
        } else {
            for name in required {
                if !self.select(name, &mut selected) {
                    warn!(secret = %name, "Required secret is not defined");
                }
            }
        }
        debug!(count = selected.len(), "Injecting secrets");

        let mut object = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("params".to_string(), other);
                map
            }
        };
        object.insert(SECRETS_KEY.to_string(), Value::Object(selected));
        Value::Object(object)
    }

    fn select(&self, name: &str, into: &mut Map<String, Value>) -> bool {
        match self.secrets.get(name) {
            Some(value) if !value.is_empty() => {
                into.insert(name.to_string(), Value::String(value.clone()));
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for SecretInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.secrets.keys().collect();
        names.sort();
        f.debug_struct("SecretInjector").field("names", &names).finish()
    }
}

/// Copy of `params` with every value under `secrets` replaced by `***`
pub fn mask_secrets(params: &Value) -> Value {
    let mut masked = params.clone();
    if let Some(Value::Object(secrets)) = masked.get_mut(SECRETS_KEY) {
        for value in secrets.values_mut() {
            *value = Value::String(MASK.to_string());
        }
    }
    masked
}

/// Copy of `value` with every secret value in `secrets` replaced by `***`
///
/// Walks objects and arrays. Strings equal to a secret become `***` and
/// strings embedding one have each occurrence replaced; a `secrets` object
/// is masked wholesale.
pub fn redact(value: &Value, secrets: &[(String, String)]) -> Value {
    match value {
        Value::String(text) => Value::String(redact_text(text, secrets)),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact(v, secrets)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| match v {
                    Value::Object(inner) if key == SECRETS_KEY => {
                        let masked = inner
                            .keys()
                            .map(|name| (name.clone(), Value::String(MASK.to_string())))
                            .collect();
                        (key.clone(), Value::Object(masked))
                    }
                    _ => (key.clone(), redact(v, secrets)),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// `text` with every occurrence of a secret value replaced by `***`
pub fn redact_text(text: &str, secrets: &[(String, String)]) -> String {
    secrets
        .iter()
        .filter(|(_, secret)| !secret.is_empty())
        .fold(text.to_string(), |acc, (_, secret)| acc.replace(secret.as_str(), MASK))
}

/// Injected secrets as `(name, value)` pairs, for exporting to a subprocess
pub fn injected_secrets(params: &Value) -> Vec<(String, String)> {
    params
        .get(SECRETS_KEY)
        .and_then(Value::as_object)
        .map(|secrets| {
            secrets
                .iter()
                .filter_map(|(name, value)| value.as_str().map(|v| (name.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
