// ABOUTME: Built-in functions: `config` looks up configuration, `service` names a dependency.
// ABOUTME: `config` is the only built-in that can leave an evaluation pending.

use async_trait::async_trait;

use super::{Arity, ExpressionFunction};
use crate::expr::{Args, EvalContext, EvalError, Evaluation, Value};
use crate::types::ServiceRef;

/// `(config identifier)` or `(config module identifier)`.
///
/// Resolves from state first, then from the declared points of the plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigFunction;

#[async_trait]
impl ExpressionFunction for ConfigFunction {
    fn arity(&self) -> Arity {
        Arity::between(1, 2)
    }

    async fn evaluate(
        &self,
        cx: &EvalContext<'_>,
        args: Args<'_>,
    ) -> Result<Evaluation, EvalError> {
        let (module, identifier) = if args.len() == 2 {
            (args.identifier(cx, 0).await?, args.identifier(cx, 1).await?)
        } else {
            (cx.module_name().to_string(), args.identifier(cx, 0).await?)
        };

        if let Some(config) = cx.state().find_config(&module, &identifier) {
            return config.to_value().map(Evaluation::Resolved);
        }

        match cx.declared_point(&module, &identifier) {
            Some(point) => Ok(Evaluation::pending(point.clone())),
            None => Err(EvalError::UndeclaredConfig { module, identifier }),
        }
    }
}

/// `(service module service)`, producing a service reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceFunction;

#[async_trait]
impl ExpressionFunction for ServiceFunction {
    fn arity(&self) -> Arity {
        Arity::exactly(2)
    }

    async fn evaluate(
        &self,
        cx: &EvalContext<'_>,
        args: Args<'_>,
    ) -> Result<Evaluation, EvalError> {
        let module = args.identifier(cx, 0).await?;
        let service = args.identifier(cx, 1).await?;
        Ok(Evaluation::Resolved(Value::ServiceReference(
            ServiceRef::new(module, service),
        )))
    }
}
