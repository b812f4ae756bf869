// ABOUTME: Error types for submitting, running and configuring deployments.
// ABOUTME: Pass errors carry the failing service and step; cancellation is kept distinct.

use snafu::Snafu;

use crate::cancel::Cancelled;
use crate::expr::{EvalError, PointKind};
use crate::plan::PlanError;
use crate::resource::ConvergeError;
use crate::store::{DeploymentStatus, StoreError};
use crate::types::{DeploymentId, ServiceRef};
use crate::wingman::WingmanError;

/// Failure of one deployment pass.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PassError {
    #[snafu(display("failed to {step}: {source}"))]
    Store {
        step: &'static str,
        source: StoreError,
    },

    #[snafu(display("deployment {id} is {status} and cannot be deployed"))]
    InvalidStatus {
        id: DeploymentId,
        status: DeploymentStatus,
    },

    #[snafu(display("failed to ensure namespace: {source}"))]
    Namespace { source: ConvergeError },

    #[snafu(display("failed to evaluate {what} of {service}: {source}"))]
    Evaluate {
        service: ServiceRef,
        what: &'static str,
        source: EvalError,
    },

    #[snafu(display("failed to converge {what} of {service}: {source}"))]
    Converge {
        service: ServiceRef,
        what: &'static str,
        source: ConvergeError,
    },

    #[snafu(display("sidecar of {service} failed: {source}"))]
    Wingman {
        service: ServiceRef,
        source: WingmanError,
    },

    #[snafu(display("deployment pass cancelled"))]
    Cancelled,
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassErrorKind {
    Store,
    InvalidStatus,
    Namespace,
    Evaluate,
    Converge,
    Wingman,
    Cancelled,
}

impl PassError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> PassErrorKind {
        match self {
            PassError::Store { .. } => PassErrorKind::Store,
            PassError::InvalidStatus { .. } => PassErrorKind::InvalidStatus,
            PassError::Namespace { .. } => PassErrorKind::Namespace,
            PassError::Evaluate { .. } => PassErrorKind::Evaluate,
            PassError::Converge { .. } => PassErrorKind::Converge,
            PassError::Wingman { .. } => PassErrorKind::Wingman,
            PassError::Cancelled => PassErrorKind::Cancelled,
        }
    }

    /// Whether the pass stopped because the deployment was cancelled.
    ///
    /// Covers writes refused because the status had already become
    /// `Cancelled`, and convergence interrupted by the watcher.
    pub fn is_cancellation(&self) -> bool {
        match self {
            PassError::Cancelled => true,
            PassError::Store { source, .. } => source.is_cancelled(),
            PassError::Namespace { source } | PassError::Converge { source, .. } => {
                matches!(source, ConvergeError::Cancelled)
            }
            _ => false,
        }
    }
}

impl From<Cancelled> for PassError {
    fn from(_: Cancelled) -> Self {
        PassError::Cancelled
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("invalid plan: {0}")]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigureError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("deployment {id} is {status}, not waiting for configuration")]
    NotWaiting {
        id: DeploymentId,
        status: DeploymentStatus,
    },

    #[error("failed to determine pending configuration: {0}")]
    Pending(#[source] Box<PassError>),

    #[error("{module}/{identifier} is not pending")]
    NotPending { module: String, identifier: String },

    #[error("{module}/{identifier} was submitted more than once")]
    Duplicate { module: String, identifier: String },

    #[error("{module}/{identifier} already has a value")]
    AlreadySet { module: String, identifier: String },

    #[error("cannot inherit {module}/{identifier}: the environment has no previous deployment")]
    NoPrevious { module: String, identifier: String },

    #[error("cannot inherit {module}/{identifier}: deployment {previous} has no value for it")]
    NotInherited {
        module: String,
        identifier: String,
        previous: DeploymentId,
    },

    #[error(
        "cannot inherit {module}/{identifier}: deployment {previous} stored it as {found}, but it is now {expected}"
    )]
    KindMismatch {
        module: String,
        identifier: String,
        previous: DeploymentId,
        expected: PointKind,
        found: PointKind,
    },

    #[error("failed to store secret {module}/{identifier}: {source}")]
    Secret {
        module: String,
        identifier: String,
        source: ConvergeError,
    },
}
