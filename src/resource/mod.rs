// ABOUTME: Declared cluster resources and the generic convergence loop.
// ABOUTME: get, validate, delete if stale, create, then wait until ready.

mod endpoint;
mod identity;
mod materialized;
mod namespace;
mod secret;
mod workload;

pub use endpoint::EndpointResource;
pub use identity::{RoleBindingResource, RoleResource, ServiceAccountResource};
pub use materialized::{MaterializedService, wingman_name};
pub use namespace::NamespaceResource;
pub use secret::SecretResource;
pub use workload::WorkloadResource;

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

use crate::cancel::{CancelFlag, Cancelled};
use crate::cluster::{Cluster, ClusterError, Labels, ObjectKind, TypedObject};
use crate::types::Environment;

pub const LABEL_ENABLED: &str = "mora.enabled";
pub const LABEL_USER: &str = "mora.user";
pub const LABEL_ENVIRONMENT: &str = "mora.environment";
pub const LABEL_MODULE: &str = "mora.module";
pub const LABEL_SERVICE: &str = "mora.service";
pub const LABEL_WINGMAN: &str = "mora.wingman";
pub const LABEL_IDENTIFIER: &str = "mora.identifier";
pub const LABEL_NAME: &str = "mora.name";

/// Where resources are converged and who owns them.
#[derive(Clone, Copy)]
pub struct ResourceContext<'a> {
    cluster: &'a dyn Cluster,
    environment: &'a Environment,
    module: Option<&'a str>,
    service: Option<&'a str>,
}

impl<'a> ResourceContext<'a> {
    pub fn new(cluster: &'a dyn Cluster, environment: &'a Environment) -> Self {
        Self {
            cluster,
            environment,
            module: None,
            service: None,
        }
    }

    pub fn for_module(self, module: &'a str) -> Self {
        Self {
            module: Some(module),
            service: None,
            ..self
        }
    }

    pub fn for_service(self, module: &'a str, service: &'a str) -> Self {
        Self {
            module: Some(module),
            service: Some(service),
            ..self
        }
    }

    pub fn cluster(&self) -> &'a dyn Cluster {
        self.cluster
    }

    pub fn environment(&self) -> &'a Environment {
        self.environment
    }

    pub fn namespace(&self) -> String {
        self.environment.namespace()
    }

    /// Ownership labels for objects created in this context.
    pub fn labels(&self) -> Labels {
        let mut labels = Labels::new();
        labels.insert(LABEL_ENABLED.to_string(), "true".to_string());
        labels.insert(LABEL_USER.to_string(), self.environment.user.clone());
        labels.insert(LABEL_ENVIRONMENT.to_string(), self.environment.slug.clone());
        if let Some(module) = self.module {
            labels.insert(LABEL_MODULE.to_string(), module.to_string());
        }
        if let Some(service) = self.service {
            labels.insert(LABEL_SERVICE.to_string(), service.to_string());
        }
        labels
    }

    pub fn labels_with(&self, extra: &[(&str, &str)]) -> Labels {
        let mut labels = self.labels();
        for (key, value) in extra {
            labels.insert(key.to_string(), value.to_string());
        }
        labels
    }

    pub async fn get<T: TypedObject>(&self, name: &str) -> Result<T, ClusterError> {
        let object = self
            .cluster
            .get(T::KIND, &self.namespace(), name)
            .await?;
        T::try_from(object)
    }

    pub async fn create<T: TypedObject>(&self, object: T) -> Result<T, ClusterError> {
        let created = self.cluster.create(object.into()).await?;
        T::try_from(created)
    }

    pub async fn delete(&self, kind: ObjectKind, name: &str) -> Result<(), ClusterError> {
        self.cluster.delete(kind, &self.namespace(), name).await
    }
}

/// A desired cluster object.
#[async_trait]
pub trait Resource: Send + Sync {
    type Object: TypedObject;

    fn name(&self) -> String;

    /// Whether `existing` already matches the desired object.
    fn is_valid(&self, cx: &ResourceContext<'_>, existing: &Self::Object) -> bool;

    /// The object to create.
    fn build(&self, cx: &ResourceContext<'_>) -> Self::Object;

    fn ready(&self, object: &Self::Object) -> bool;

    async fn get(&self, cx: &ResourceContext<'_>) -> Result<Self::Object, ClusterError> {
        cx.get(&self.name()).await
    }

    async fn delete(&self, cx: &ResourceContext<'_>) -> Result<(), ClusterError> {
        cx.delete(<Self::Object as TypedObject>::KIND, &self.name()).await
    }

    async fn create(&self, cx: &ResourceContext<'_>) -> Result<Self::Object, ClusterError> {
        cx.create(self.build(cx)).await
    }
}

/// Bounds for converging one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergeSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConvergeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConvergeError {
    #[error("failed to {operation} {kind} {name}: {source}")]
    Cluster {
        operation: &'static str,
        kind: ObjectKind,
        name: String,
        source: ClusterError,
    },

    #[error("timed out after {timeout:?} waiting for {kind} {name} to {waiting_for}")]
    Timeout {
        kind: ObjectKind,
        name: String,
        waiting_for: &'static str,
        timeout: Duration,
    },

    #[error("convergence cancelled")]
    Cancelled,
}

impl From<Cancelled> for ConvergeError {
    fn from(_: Cancelled) -> Self {
        ConvergeError::Cancelled
    }
}

struct Poll<'a> {
    kind: ObjectKind,
    name: &'a str,
    deadline: Instant,
    settings: &'a ConvergeSettings,
    cancel: &'a CancelFlag,
}

impl Poll<'_> {
    async fn wait(&self, waiting_for: &'static str) -> Result<(), ConvergeError> {
        let now = Instant::now();
        if now >= self.deadline {
            return Err(ConvergeError::Timeout {
                kind: self.kind,
                name: self.name.to_string(),
                waiting_for,
                timeout: self.settings.timeout,
            });
        }
        let remaining = self.deadline - now;
        self.cancel
            .sleep(self.settings.poll_interval.min(remaining))
            .await?;
        Ok(())
    }

    fn cluster_error(&self, operation: &'static str, source: ClusterError) -> ConvergeError {
        ConvergeError::Cluster {
            operation,
            kind: self.kind,
            name: self.name.to_string(),
            source,
        }
    }
}

/// Bring one resource to its desired, ready state.
///
/// A resource that already exists, is valid and is ready costs one read and
/// no mutations.
pub async fn converge<R: Resource>(
    cx: &ResourceContext<'_>,
    resource: &R,
    settings: &ConvergeSettings,
    cancel: &CancelFlag,
) -> Result<(), ConvergeError> {
    let name = resource.name();
    let poll = Poll {
        kind: <R::Object as TypedObject>::KIND,
        name: &name,
        deadline: Instant::now() + settings.timeout,
        settings,
        cancel,
    };

    match resource.get(cx).await {
        Ok(existing) if resource.is_valid(cx, &existing) => {
            tracing::debug!(kind = %poll.kind, resource = %name, "resource is up to date");
            return wait_ready(cx, resource, existing, &poll).await;
        }
        Ok(_) => {
            tracing::info!(kind = %poll.kind, resource = %name, "replacing stale resource");
            match resource.delete(cx).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(poll.cluster_error("delete", e)),
            }
            wait_deleted(cx, resource, &poll).await?;
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(poll.cluster_error("get", e)),
    }

    let created = resource
        .create(cx)
        .await
        .map_err(|e| poll.cluster_error("create", e))?;
    tracing::info!(kind = %poll.kind, resource = %name, namespace = %cx.namespace(), "created resource");
    wait_ready(cx, resource, created, &poll).await
}

async fn wait_ready<R: Resource>(
    cx: &ResourceContext<'_>,
    resource: &R,
    mut current: R::Object,
    poll: &Poll<'_>,
) -> Result<(), ConvergeError> {
    while !resource.ready(&current) {
        tracing::debug!(kind = %poll.kind, resource = %poll.name, "waiting for resource to be ready");
        poll.wait("become ready").await?;
        current = resource
            .get(cx)
            .await
            .map_err(|e| poll.cluster_error("get", e))?;
    }
    Ok(())
}

async fn wait_deleted<R: Resource>(
    cx: &ResourceContext<'_>,
    resource: &R,
    poll: &Poll<'_>,
) -> Result<(), ConvergeError> {
    loop {
        match resource.get(cx).await {
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(poll.cluster_error("get", e)),
            Ok(_) => poll.wait("be deleted").await?,
        }
    }
}
