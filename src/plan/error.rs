// ABOUTME: Errors that reject a submission before any deployment progresses.
// ABOUTME: Covers duplicate names, bad dependency declarations, and cycles.

use crate::expr::EvalError;
use crate::types::ServiceRef;

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("duplicate module: {0}")]
    DuplicateModule(String),

    #[error("duplicate service: {0}")]
    DuplicateService(ServiceRef),

    #[error("duplicate config point: {module}/{identifier}")]
    DuplicateConfig { module: String, identifier: String },

    #[error("config point {module}/{identifier}: {source}")]
    ConfigPoint {
        module: String,
        identifier: String,
        source: EvalError,
    },

    #[error("{service} requires[{index}]: {source}")]
    Requires {
        service: ServiceRef,
        index: usize,
        source: EvalError,
    },

    #[error("{service} requires unknown service {target}")]
    UnknownDependency {
        service: ServiceRef,
        target: ServiceRef,
    },

    #[error("dependency cycle among: {}", join(.services))]
    Cycle { services: Vec<ServiceRef> },
}

fn join(services: &[ServiceRef]) -> String {
    services
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
