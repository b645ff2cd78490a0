use crate::jobs::{JobHandler, JobHandlerFactory};
use anyhow::{Result, anyhow};
use serde_json::Value;
use std::collections::HashMap;

/// Registry of job handlers by kind.
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<&'static str, JobHandlerFactory>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<H: JobHandler + Clone + 'static>(&mut self, handler: H) {
        let kind = handler.kind();
        let factory: JobHandlerFactory =
            Box::new(move |_payload| Ok(Box::new(handler.clone()) as Box<dyn JobHandler>));
        self.handlers.insert(kind, factory);
    }

    pub fn create_handler(&self, kind: &str, payload: Value) -> Result<Box<dyn JobHandler>> {
        let factory = self
            .handlers
            .get(kind)
            .ok_or_else(|| anyhow!("No handler registered for job kind: {}", kind))?;

        factory(payload)
    }

    pub fn registered_kinds(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobHandler;
    use async_trait::async_trait;
    use serde_json::json;
    use sqlx::PgPool;
    use tracing::Span;

    #[derive(Clone)]
    struct NoopHandler;

    #[async_trait]
    impl JobHandler for NoopHandler {
        async fn run(&self, _payload: Value, _pool: &PgPool, _span: Span) -> anyhow::Result<()> {
            Ok(())
        }

        fn kind(&self) -> &'static str {
            "noop"
        }
    }

    #[test]
    fn registration_lists_kinds() {
        let mut registry = JobRegistry::new();
        registry.register(NoopHandler);
        assert_eq!(registry.registered_kinds(), vec!["noop"]);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let mut registry = JobRegistry::new();
        registry.register(NoopHandler);

        assert!(registry.create_handler("noop", json!({})).is_ok());
        assert!(registry.create_handler("unknown", json!({})).is_err());
    }
}
