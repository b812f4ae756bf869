// ABOUTME: Callable expression functions and the sources that resolve them by name.
// ABOUTME: Built-ins are consulted first, then extension sources such as sidecars.

mod builtin;
mod registry;

pub use builtin::{ConfigFunction, ServiceFunction};
pub use registry::FunctionRegistry;

use async_trait::async_trait;
use std::fmt;

use crate::expr::{Args, EvalContext, EvalError, Evaluation};

/// Accepted argument count of a function. `max: None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{} argument(s)", self.min),
            Some(max) => write!(f, "{} to {} arguments", self.min, max),
            None => write!(f, "at least {} argument(s)", self.min),
        }
    }
}

/// A named function callable from expressions.
#[async_trait]
pub trait ExpressionFunction: Send + Sync {
    fn arity(&self) -> Arity;

    /// Evaluate with unevaluated arguments; the argument count is already checked.
    async fn evaluate(&self, cx: &EvalContext<'_>, args: Args<'_>)
    -> Result<Evaluation, EvalError>;
}

/// Something that can resolve a function call by name.
///
/// `Ok(None)` means the name is unknown to this source.
#[async_trait]
pub trait FunctionSource: Send + Sync {
    async fn call(
        &self,
        cx: &EvalContext<'_>,
        name: &str,
        args: Args<'_>,
    ) -> Result<Option<Evaluation>, EvalError>;
}

/// Several sources consulted in priority order.
pub struct FunctionChain<'a> {
    sources: Vec<&'a dyn FunctionSource>,
}

impl<'a> FunctionChain<'a> {
    pub fn new(first: &'a dyn FunctionSource) -> Self {
        Self {
            sources: vec![first],
        }
    }

    pub fn then(mut self, next: &'a dyn FunctionSource) -> Self {
        self.sources.push(next);
        self
    }
}

#[async_trait]
impl FunctionSource for FunctionChain<'_> {
    async fn call(
        &self,
        cx: &EvalContext<'_>,
        name: &str,
        args: Args<'_>,
    ) -> Result<Option<Evaluation>, EvalError> {
        for source in &self.sources {
            if let Some(evaluation) = source.call(cx, name, args).await? {
                return Ok(Some(evaluation));
            }
        }
        Ok(None)
    }
}
