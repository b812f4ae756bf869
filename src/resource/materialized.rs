// ABOUTME: Ordered groups of resources that together run one service or wingman.
// ABOUTME: Each group converges fully before the next one starts.

use super::{
    ConvergeError, ConvergeSettings, EndpointResource, Resource, ResourceContext,
    RoleBindingResource, RoleResource, SecretResource, ServiceAccountResource, WorkloadResource,
    converge,
};
use crate::cancel::CancelFlag;
use crate::cluster::{EndpointKind, PolicyRule};
use crate::plan::{ServiceDefinition, WingmanDefinition};
use crate::types::sanitize_subdomain;

/// Name shared by a wingman's workload, endpoint and identity objects.
pub fn wingman_name(module: &str, service: &str) -> String {
    sanitize_subdomain(&format!("{module}-{service}-wingman"))
}

/// Access a wingman gets in its environment's namespace.
fn wingman_rules() -> Vec<PolicyRule> {
    let strings = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
    vec![PolicyRule {
        api_groups: strings(&[""]),
        resources: strings(&["secrets"]),
        verbs: strings(&["get", "list", "create", "update", "delete"]),
    }]
}

#[derive(Debug, Default)]
pub struct MaterializedService {
    pub service_accounts: Vec<ServiceAccountResource>,
    pub roles: Vec<RoleResource>,
    pub role_bindings: Vec<RoleBindingResource>,
    pub secrets: Vec<SecretResource>,
    pub workloads: Vec<WorkloadResource>,
    pub endpoints: Vec<EndpointResource>,
}

impl MaterializedService {
    pub fn for_service(definition: &ServiceDefinition, module: &str, service: &str) -> Self {
        Self {
            workloads: vec![WorkloadResource {
                module: module.to_string(),
                service: service.to_string(),
                wingman: false,
                image: definition.image.clone(),
                command: definition.command.clone(),
                env: definition.env.clone(),
                service_account: None,
            }],
            ..Self::default()
        }
    }

    pub fn for_wingman(
        definition: &WingmanDefinition,
        module: &str,
        service: &str,
        port: u16,
    ) -> Self {
        let name = wingman_name(module, service);
        Self {
            service_accounts: vec![ServiceAccountResource { name: name.clone() }],
            roles: vec![RoleResource {
                name: name.clone(),
                rules: wingman_rules(),
            }],
            role_bindings: vec![RoleBindingResource {
                name: name.clone(),
                role: name.clone(),
                service_account: name.clone(),
            }],
            secrets: Vec::new(),
            workloads: vec![WorkloadResource {
                module: module.to_string(),
                service: service.to_string(),
                wingman: true,
                image: definition.image.clone(),
                command: Vec::new(),
                env: Vec::new(),
                service_account: Some(name),
            }],
            endpoints: vec![EndpointResource {
                module: module.to_string(),
                service: service.to_string(),
                wingman: true,
                kind: EndpointKind::ClusterIp,
                port,
            }],
        }
    }

    /// Converge every group in dependency order.
    pub async fn converge(
        &self,
        cx: &ResourceContext<'_>,
        settings: &ConvergeSettings,
        cancel: &CancelFlag,
    ) -> Result<(), ConvergeError> {
        converge_all(cx, &self.service_accounts, settings, cancel).await?;
        converge_all(cx, &self.roles, settings, cancel).await?;
        converge_all(cx, &self.role_bindings, settings, cancel).await?;
        converge_all(cx, &self.secrets, settings, cancel).await?;
        converge_all(cx, &self.workloads, settings, cancel).await?;
        converge_all(cx, &self.endpoints, settings, cancel).await
    }
}

async fn converge_all<R: Resource>(
    cx: &ResourceContext<'_>,
    resources: &[R],
    settings: &ConvergeSettings,
    cancel: &CancelFlag,
) -> Result<(), ConvergeError> {
    for resource in resources {
        cancel.checkpoint()?;
        converge(cx, resource, settings, cancel).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{
        Endpoint, MemoryCluster, ObjectKind, Role, RoleBinding, ServiceAccount, Workload,
    };
    use crate::plan::{EnvValue, EnvVar};
    use crate::resource::NamespaceResource;
    use crate::types::Environment;

    fn fast() -> ConvergeSettings {
        ConvergeSettings {
            timeout: std::time::Duration::from_secs(5),
            poll_interval: std::time::Duration::from_millis(1),
        }
    }

    #[test]
    fn wingman_name_is_sanitized() {
        assert_eq!(wingman_name("App", "Web_1"), "app-web-1-wingman");
    }

    #[tokio::test]
    async fn service_converges_a_single_workload() {
        let cluster = MemoryCluster::new();
        let env = Environment::new("alice", "dev");
        let root = ResourceContext::new(&cluster, &env);
        let cancel = CancelFlag::new();
        converge(&root, &NamespaceResource::for_context(&root), &fast(), &cancel)
            .await
            .unwrap();

        let definition = ServiceDefinition {
            image: "nginx".to_string(),
            command: vec![],
            env: vec![EnvVar {
                name: "DB_PASSWORD".to_string(),
                value: EnvValue::Secret("app-db-password".to_string()),
            }],
        };
        let cx = root.for_service("app", "web");
        MaterializedService::for_service(&definition, "app", "web")
            .converge(&cx, &fast(), &cancel)
            .await
            .unwrap();

        let workloads = cluster.objects(ObjectKind::Workload);
        assert_eq!(workloads.len(), 1);
        let workload = Workload::try_from(workloads[0].clone()).unwrap();
        assert_eq!(workload.meta.name, "app-web");
        assert_eq!(workload.spec.containers[0].env.len(), 1);
        assert!(cluster.objects(ObjectKind::Endpoint).is_empty());
    }

    #[tokio::test]
    async fn wingman_gets_identity_and_endpoint() {
        let cluster = MemoryCluster::new().with_ready_after(2);
        let env = Environment::new("alice", "dev");
        let root = ResourceContext::new(&cluster, &env);
        let cancel = CancelFlag::new();
        converge(&root, &NamespaceResource::for_context(&root), &fast(), &cancel)
            .await
            .unwrap();

        let cx = root.for_service("app", "web");
        let definition = WingmanDefinition {
            image: "wingman:1".to_string(),
        };
        MaterializedService::for_wingman(&definition, "app", "web", 8080)
            .converge(&cx, &fast(), &cancel)
            .await
            .unwrap();

        assert_eq!(cluster.objects(ObjectKind::ServiceAccount).len(), 1);
        let role = Role::try_from(cluster.objects(ObjectKind::Role)[0].clone()).unwrap();
        assert_eq!(role.rules, wingman_rules());
        let binding =
            RoleBinding::try_from(cluster.objects(ObjectKind::RoleBinding)[0].clone()).unwrap();
        assert_eq!(binding.subjects[0].name, "app-web-wingman");

        let workload = Workload::try_from(cluster.objects(ObjectKind::Workload)[0].clone()).unwrap();
        assert_eq!(workload.spec.service_account.as_deref(), Some("app-web-wingman"));
        let endpoint = Endpoint::try_from(cluster.objects(ObjectKind::Endpoint)[0].clone()).unwrap();
        assert_eq!(endpoint.spec.ports[0].port, 8080);
        assert!(endpoint.spec.cluster_ip.is_some());
        let _ = ServiceAccount::try_from(cluster.objects(ObjectKind::ServiceAccount)[0].clone())
            .unwrap();
    }
}
