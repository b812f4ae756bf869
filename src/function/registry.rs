// ABOUTME: Thread-safe name-to-function table.
// ABOUTME: Checks argument counts before dispatching a call.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ConfigFunction, ExpressionFunction, FunctionSource, ServiceFunction};
use crate::expr::{Args, EvalContext, EvalError, Evaluation};

/// Registry of in-process functions.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, Arc<dyn ExpressionFunction>>>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `config` and `service`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("config", ConfigFunction);
        registry.register("service", ServiceFunction);
        registry
    }

    /// Register `function` under `name`, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, function: impl ExpressionFunction + 'static) {
        self.functions.write().insert(name.into(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExpressionFunction>> {
        self.functions.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.functions.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

#[async_trait]
impl FunctionSource for FunctionRegistry {
    async fn call(
        &self,
        cx: &EvalContext<'_>,
        name: &str,
        args: Args<'_>,
    ) -> Result<Option<Evaluation>, EvalError> {
        // The read guard is released here, before awaiting.
        let Some(function) = self.get(name) else {
            return Ok(None);
        };

        let arity = function.arity();
        if !arity.accepts(args.len()) {
            return Err(EvalError::InvalidArguments {
                function: name.to_string(),
                arity,
                found: args.len(),
            });
        }

        function.evaluate(cx, args).await.map(Some)
    }
}
