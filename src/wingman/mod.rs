// ABOUTME: Sidecar ("wingman") processes that extend evaluation with dynamic points and functions.
// ABOUTME: Defines the sidecar traits, settings, errors and the HTTP implementation.

mod client;
mod functions;
mod locator;
pub mod protocol;

pub use client::HttpSidecar;
pub use functions::SidecarFunctions;
pub use locator::ClusterLocator;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::cluster::ClusterError;
use crate::expr::{ConfigPoint, Evaluation};
use crate::state::State;
use crate::types::{Environment, ServiceRef};
use protocol::FunctionRequest;

/// How sidecars are reached and how hard to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WingmanSettings {
    pub port: u16,
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for WingmanSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            attempts: 10,
            backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WingmanError {
    #[error("invalid sidecar URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to connect to sidecar at {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("sidecar HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("failed to build sidecar request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("sidecar returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to encode sidecar request: {0}")]
    Encode(serde_json::Error),

    #[error("failed to decode sidecar response: {0}")]
    Decode(serde_json::Error),

    #[error("sidecar request failed after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<WingmanError>,
    },

    #[error("{count} sidecars match {service}")]
    Ambiguous { service: ServiceRef, count: usize },

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Result of asking a sidecar to evaluate a function.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionReply {
    /// The sidecar does not define the function.
    NotFound,
    Evaluated(Evaluation),
}

/// A running sidecar.
#[async_trait]
pub trait Sidecar: Send + Sync {
    /// Points the sidecar still needs given `state`. Module and kind are filled in.
    async fn config_points(
        &self,
        module: &str,
        state: &State,
    ) -> Result<Vec<ConfigPoint>, WingmanError>;

    async fn call_function(&self, request: &FunctionRequest) -> Result<FunctionReply, WingmanError>;
}

/// Finds the sidecars running in an environment.
#[async_trait]
pub trait SidecarLocator: Send + Sync {
    async fn find(
        &self,
        environment: &Environment,
        service: &ServiceRef,
    ) -> Result<Option<Arc<dyn Sidecar>>, WingmanError>;

    /// Every sidecar of the environment with the service it belongs to.
    async fn all(
        &self,
        environment: &Environment,
    ) -> Result<Vec<(ServiceRef, Arc<dyn Sidecar>)>, WingmanError>;
}
