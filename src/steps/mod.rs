//! Built-in step bodies and the registry that resolves them by kind

pub mod command;
pub mod echo;
pub mod llm;
pub mod template;

pub use command::CommandStep;
pub use echo::EchoStep;
pub use llm::LlmStep;
pub use template::TemplateStep;

use crate::core::StepBody;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps the `uses` field of a step to the body that runs it
#[derive(Clone, Default)]
pub struct StepRegistry {
    bodies: HashMap<String, Arc<dyn StepBody>>,
}

impl StepRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `echo`, `command`, `template` and `llm`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("echo", Arc::new(EchoStep));
        registry.register("command", Arc::new(CommandStep::new()));
        registry.register("template", Arc::new(TemplateStep));
        registry.register("llm", Arc::new(LlmStep::new()));
        registry
    }

    /// Add or replace a step kind
    pub fn register(&mut self, kind: impl Into<String>, body: Arc<dyn StepBody>) -> &mut Self {
        self.bodies.insert(kind.into(), body);
        self
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn StepBody>> {
        self.bodies.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.bodies.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.bodies.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{step_fn, ExecutionContext, StepContext};
    use serde_json::json;

    #[test]
    fn test_builtins_registered() {
        let registry = StepRegistry::with_builtins();
        assert_eq!(registry.kinds(), vec!["command", "echo", "llm", "template"]);
        assert!(registry.get("nope").is_none());
    }

    #[tokio::test]
    async fn test_register_custom_kind() {
        let mut registry = StepRegistry::with_builtins();
        registry.register("const", step_fn(|_, _| async { Ok(json!(42)) }));

        let body = registry.get("const").unwrap();
        let ctx = StepContext::new("s", Arc::new(ExecutionContext::new()));
        assert_eq!(body.run(json!(null), ctx).await.unwrap(), json!(42));
    }
}
