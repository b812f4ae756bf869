// ABOUTME: A single-replica workload running one container.
// ABOUTME: Valid when image, command, environment, identity and labels match.

use super::{LABEL_WINGMAN, Resource, ResourceContext};
use crate::cluster::{Container, ContainerEnv, EnvSource, ObjectMeta, Workload, WorkloadSpec, WorkloadStatus};
use crate::plan::{EnvValue, EnvVar};
use crate::types::{sanitize_label, sanitize_subdomain};

/// Key read from a secret referenced by an environment variable.
pub const SECRET_KEY: &str = "value";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadResource {
    pub module: String,
    pub service: String,
    pub wingman: bool,
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<EnvVar>,
    pub service_account: Option<String>,
}

impl WorkloadResource {
    fn container_env(&self) -> Vec<ContainerEnv> {
        self.env
            .iter()
            .map(|var| ContainerEnv {
                name: var.name.clone(),
                source: match &var.value {
                    EnvValue::Literal(value) => EnvSource::Value(value.clone()),
                    EnvValue::Secret(secret) => EnvSource::SecretKey {
                        secret: secret.clone(),
                        key: SECRET_KEY.to_string(),
                    },
                },
            })
            .collect()
    }

    fn wingman_label(&self) -> &'static str {
        if self.wingman { "true" } else { "false" }
    }
}

#[async_trait::async_trait]
impl Resource for WorkloadResource {
    type Object = Workload;

    fn name(&self) -> String {
        let mut name = format!("{}-{}", self.module, self.service);
        if self.wingman {
            name.push_str("-wingman");
        }
        sanitize_subdomain(&name)
    }

    fn is_valid(&self, cx: &ResourceContext<'_>, existing: &Workload) -> bool {
        if !existing
            .meta
            .matches(&cx.labels_with(&[(LABEL_WINGMAN, self.wingman_label())]))
        {
            return false;
        }

        if existing.spec.service_account != self.service_account {
            return false;
        }

        let [container] = existing.spec.containers.as_slice() else {
            return false;
        };

        if container.image != self.image {
            return false;
        }

        if !self.command.is_empty() && container.command != self.command {
            return false;
        }

        let desired = self.container_env();
        desired.len() == container.env.len()
            && desired.iter().all(|want| {
                container
                    .env
                    .iter()
                    .any(|have| have.name == want.name && have.source == want.source)
            })
    }

    fn build(&self, cx: &ResourceContext<'_>) -> Workload {
        let name = self.name();
        let labels = cx.labels_with(&[(LABEL_WINGMAN, self.wingman_label())]);
        Workload {
            meta: ObjectMeta::new(cx.namespace(), &name, labels.clone()),
            spec: WorkloadSpec {
                replicas: 1,
                selector: labels,
                service_account: self.service_account.clone(),
                containers: vec![Container {
                    name: sanitize_label(&name),
                    image: self.image.clone(),
                    command: self.command.clone(),
                    env: self.container_env(),
                }],
            },
            status: WorkloadStatus::default(),
        }
    }

    fn ready(&self, object: &Workload) -> bool {
        object.status.ready_replicas == 1
    }
}
