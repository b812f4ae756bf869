// ABOUTME: A network endpoint selecting a service's workload.
// ABOUTME: Ready once the cluster has assigned its address or ports.

use super::{LABEL_WINGMAN, Resource, ResourceContext};
use crate::cluster::{Endpoint, EndpointKind, EndpointPort, EndpointSpec, EndpointStatus, ObjectMeta};
use crate::types::sanitize_subdomain;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResource {
    pub module: String,
    pub service: String,
    pub wingman: bool,
    pub kind: EndpointKind,
    pub port: u16,
}

impl EndpointResource {
    fn selector(&self, cx: &ResourceContext<'_>) -> crate::cluster::Labels {
        let wingman = if self.wingman { "true" } else { "false" };
        cx.labels_with(&[(LABEL_WINGMAN, wingman)])
    }
}

#[async_trait::async_trait]
impl Resource for EndpointResource {
    type Object = Endpoint;

    fn name(&self) -> String {
        let mut name = format!("{}-{}", self.module, self.service);
        if self.wingman {
            name.push_str("-wingman");
        }
        sanitize_subdomain(&name)
    }

    fn is_valid(&self, cx: &ResourceContext<'_>, existing: &Endpoint) -> bool {
        let [port] = existing.spec.ports.as_slice() else {
            return false;
        };
        existing.spec.kind == self.kind
            && port.port == self.port
            && port.target_port == self.port
            && existing.spec.selector == self.selector(cx)
    }

    fn build(&self, cx: &ResourceContext<'_>) -> Endpoint {
        let labels = self.selector(cx);
        Endpoint {
            meta: ObjectMeta::new(cx.namespace(), self.name(), labels.clone()),
            spec: EndpointSpec {
                kind: self.kind,
                selector: labels,
                ports: vec![EndpointPort {
                    port: self.port,
                    target_port: self.port,
                    node_port: 0,
                }],
                cluster_ip: None,
            },
            status: EndpointStatus::default(),
        }
    }

    fn ready(&self, object: &Endpoint) -> bool {
        match object.spec.kind {
            EndpointKind::ClusterIp => object
                .spec
                .cluster_ip
                .as_deref()
                .is_some_and(|ip| !ip.is_empty() && ip != "None"),
            EndpointKind::NodePort => object.spec.ports.iter().all(|p| p.node_port != 0),
            EndpointKind::LoadBalancer => {
                let ingress = &object.status.ingress;
                !ingress.is_empty() && ingress.iter().all(|i| i.ip.is_some() || i.hostname.is_some())
            }
        }
    }
}
