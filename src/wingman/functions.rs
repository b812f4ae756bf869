// ABOUTME: Resolves function calls unknown to the registry by asking sidecars.
// ABOUTME: The first sidecar that knows the function answers it.

use async_trait::async_trait;
use std::sync::Arc;

use super::protocol::FunctionRequest;
use super::{FunctionReply, Sidecar};
use crate::expr::{Args, EvalContext, EvalError, Evaluation};
use crate::function::FunctionSource;
use crate::types::{Environment, ServiceRef};

pub struct SidecarFunctions<'a> {
    environment: &'a Environment,
    sidecars: Vec<(ServiceRef, Arc<dyn Sidecar>)>,
}

impl<'a> SidecarFunctions<'a> {
    /// Sidecars are consulted in the order given.
    pub fn new(environment: &'a Environment, sidecars: Vec<(ServiceRef, Arc<dyn Sidecar>)>) -> Self {
        Self {
            environment,
            sidecars,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sidecars.is_empty()
    }
}

#[async_trait]
impl FunctionSource for SidecarFunctions<'_> {
    async fn call(
        &self,
        cx: &EvalContext<'_>,
        name: &str,
        args: Args<'_>,
    ) -> Result<Option<Evaluation>, EvalError> {
        if self.sidecars.is_empty() {
            return Ok(None);
        }

        for (service, sidecar) in &self.sidecars {
            // Each sidecar sees the call as made from its own module.
            let request = FunctionRequest {
                module_name: service.module.clone(),
                state: cx.state().clone(),
                username: self.environment.user.clone(),
                environment: self.environment.slug.clone(),
                function_name: name.to_string(),
                args: args.as_slice().to_vec(),
            };
            let reply = sidecar
                .call_function(&request)
                .await
                .map_err(|e| EvalError::Function {
                    function: name.to_string(),
                    reason: format!("sidecar {service}: {e}"),
                })?;
            if let FunctionReply::Evaluated(evaluation) = reply {
                tracing::debug!(function = name, sidecar = %service, "function answered by sidecar");
                return Ok(Some(evaluation));
            }
        }
        Ok(None)
    }
}
