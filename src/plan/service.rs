// ABOUTME: Evaluates a plan node into a fully resolved service or wingman definition.
// ABOUTME: Collects every pending point of a service before reporting it.

use nonempty::NonEmpty;

use super::{ServiceConfig, split_command};
use crate::expr::{
    ConfigPoint, EvalContext, EvalError, Evaluation, PendingPoints, Value, ValueKind,
};
use crate::types::ServiceRef;

/// A definition that is either ready or waiting on configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Ready(T),
    Pending(NonEmpty<ConfigPoint>),
}

/// Value of a materialized environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Literal(String),
    /// Reference to the `value` key of the named cluster secret.
    Secret(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: EnvValue,
}

/// A service with every expression resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<EnvVar>,
}

/// A wingman with its image resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WingmanDefinition {
    pub image: String,
}

impl ServiceConfig {
    pub fn service_ref(&self) -> ServiceRef {
        ServiceRef::new(&self.module_name, &self.service_name)
    }

    /// Evaluate the wingman image. `None` when the service has no wingman.
    pub async fn evaluate_wingman(
        &self,
        cx: &EvalContext<'_>,
    ) -> Result<Option<Resolution<WingmanDefinition>>, EvalError> {
        let Some(wingman) = &self.wingman else {
            return Ok(None);
        };

        let evaluation = wingman
            .image
            .evaluate(cx)
            .await
            .map_err(|e| e.in_field("wingman.image"))?;

        let resolution = match evaluation {
            Evaluation::Resolved(value) => Resolution::Ready(WingmanDefinition {
                image: value.into_string().map_err(|e| e.in_field("wingman.image"))?,
            }),
            Evaluation::Pending(points) => Resolution::Pending(points),
        };
        Ok(Some(resolution))
    }

    /// Evaluate image, command and environment.
    pub async fn evaluate(
        &self,
        cx: &EvalContext<'_>,
    ) -> Result<Resolution<ServiceDefinition>, EvalError> {
        let mut pending = PendingPoints::new();

        let image = self
            .image
            .evaluate(cx)
            .await
            .map_err(|e| e.in_field("image"))?;
        let image = pending
            .resolve(image)
            .map(|v| v.into_string().map_err(|e| e.in_field("image")))
            .transpose()?;

        let mut command = Vec::new();
        if let Some(expr) = &self.command {
            let evaluation = expr.evaluate(cx).await.map_err(|e| e.in_field("command"))?;
            if let Some(value) = pending.resolve(evaluation) {
                let text = value.into_string().map_err(|e| e.in_field("command"))?;
                command = split_command(&text).map_err(|e| e.in_field("command"))?;
            }
        }

        let mut env = Vec::with_capacity(self.env.len());
        for spec in &self.env {
            let field = || format!("env[{}]", spec.name);
            let evaluation = spec
                .value
                .evaluate(cx)
                .await
                .map_err(|e| e.in_field(field()))?;
            let value = match pending.resolve(evaluation) {
                Some(Value::String(s)) => EnvValue::Literal(s),
                Some(Value::Secret(name)) => EnvValue::Secret(name),
                Some(other) => {
                    return Err(EvalError::unexpected_kind(ValueKind::String, &other)
                        .in_field(field()));
                }
                None => continue,
            };
            env.push(EnvVar {
                name: spec.name.clone(),
                value,
            });
        }

        if let Some(points) = pending.into_pending() {
            return Ok(Resolution::Pending(points));
        }

        Ok(Resolution::Ready(ServiceDefinition {
            // Only absent when a point is pending, which returned above.
            image: image.unwrap_or_default(),
            command,
            env,
        }))
    }
}
