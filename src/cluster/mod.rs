// ABOUTME: Cluster API abstraction consumed by resource convergence.
// ABOUTME: Object-safe get/list/create/delete over a closed set of object kinds.

mod memory;
mod objects;

pub use memory::MemoryCluster;
pub use objects::{
    Container, ContainerEnv, EndpointKind, EndpointPort, EndpointSpec, EndpointStatus, Endpoint,
    EnvSource, Ingress, Labels, Namespace, Object, ObjectKind, ObjectMeta, PolicyRule, Role,
    RoleBinding, RoleRef, Secret, SecretBytes, ServiceAccount, Subject, TypedObject, Workload,
    WorkloadSpec, WorkloadStatus,
};

use async_trait::async_trait;

/// Errors from cluster API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("{kind} {name} not found")]
    NotFound { kind: ObjectKind, name: String },

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: ObjectKind, name: String },

    #[error("namespace {0} does not exist")]
    NamespaceMissing(String),

    #[error("expected a {expected} object, found {found}")]
    WrongKind {
        expected: ObjectKind,
        found: ObjectKind,
    },

    #[error("cluster API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cluster snapshot is corrupt: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }
}

/// Cluster API operations.
///
/// Namespaced objects are addressed by `(kind, namespace, name)`. Namespaces
/// themselves use an empty namespace.
#[async_trait]
pub trait Cluster: Send + Sync {
    async fn get(&self, kind: ObjectKind, namespace: &str, name: &str)
    -> Result<Object, ClusterError>;

    /// Objects of `kind` in `namespace` carrying every label of `selector`.
    async fn list(
        &self,
        kind: ObjectKind,
        namespace: &str,
        selector: &Labels,
    ) -> Result<Vec<Object>, ClusterError>;

    /// Create an object in the namespace named by its metadata.
    async fn create(&self, object: Object) -> Result<Object, ClusterError>;

    async fn delete(&self, kind: ObjectKind, namespace: &str, name: &str)
    -> Result<(), ClusterError>;
}
