// ABOUTME: Explicit, immutable evaluation context passed to every evaluation.
// ABOUTME: Exposes the current module, state, declared points and function source.

use std::fmt;

use super::ConfigPoint;
use crate::function::FunctionSource;
use crate::state::State;

/// Everything an expression may observe while it is evaluated.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    module: &'a str,
    service: Option<&'a str>,
    state: &'a State,
    declared: &'a [ConfigPoint],
    functions: &'a dyn FunctionSource,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        module: &'a str,
        state: &'a State,
        declared: &'a [ConfigPoint],
        functions: &'a dyn FunctionSource,
    ) -> Self {
        Self {
            module,
            service: None,
            state,
            declared,
            functions,
        }
    }

    pub fn with_service(self, service: &'a str) -> Self {
        Self {
            service: Some(service),
            ..self
        }
    }

    /// The same context seen from another module.
    pub fn for_module(self, module: &'a str) -> Self {
        Self {
            module,
            service: None,
            ..self
        }
    }

    pub fn module_name(&self) -> &'a str {
        self.module
    }

    pub fn service_name(&self) -> Option<&'a str> {
        self.service
    }

    pub fn state(&self) -> &'a State {
        self.state
    }

    pub fn declared_points(&self) -> &'a [ConfigPoint] {
        self.declared
    }

    pub fn declared_point(&self, module: &str, identifier: &str) -> Option<&'a ConfigPoint> {
        self.declared.iter().find(|p| p.matches(module, identifier))
    }

    pub fn functions(&self) -> &'a dyn FunctionSource {
        self.functions
    }
}

impl fmt::Debug for EvalContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalContext")
            .field("module", &self.module)
            .field("service", &self.service)
            .field("service_index", &self.state.service_index)
            .field("declared", &self.declared.len())
            .finish()
    }
}
