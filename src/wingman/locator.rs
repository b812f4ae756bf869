// ABOUTME: Locates sidecars through the wingman endpoints in an environment's namespace.
// ABOUTME: Each endpoint becomes an HTTP sidecar at http://{endpoint}.{namespace}:{port}.

use async_trait::async_trait;
use std::sync::Arc;

use super::{HttpSidecar, Sidecar, SidecarLocator, WingmanError, WingmanSettings};
use crate::cluster::{Cluster, Endpoint, TypedObject};
use crate::resource::{LABEL_MODULE, LABEL_SERVICE, LABEL_WINGMAN, ResourceContext};
use crate::types::{Environment, ServiceRef};

pub struct ClusterLocator {
    cluster: Arc<dyn Cluster>,
    settings: WingmanSettings,
}

impl ClusterLocator {
    pub fn new(cluster: Arc<dyn Cluster>, settings: WingmanSettings) -> Self {
        Self { cluster, settings }
    }

    async fn endpoints(
        &self,
        cx: ResourceContext<'_>,
    ) -> Result<Vec<Endpoint>, WingmanError> {
        let selector = cx.labels_with(&[(LABEL_WINGMAN, "true")]);
        let objects = self
            .cluster
            .list(Endpoint::KIND, &cx.namespace(), &selector)
            .await?;
        objects
            .into_iter()
            .map(|object| Endpoint::try_from(object).map_err(WingmanError::from))
            .collect()
    }

    fn sidecar(&self, endpoint: &Endpoint) -> Result<Arc<dyn Sidecar>, WingmanError> {
        let port = endpoint
            .spec
            .ports
            .first()
            .map_or(self.settings.port, |p| p.port);
        let url = format!(
            "http://{}.{}:{}",
            endpoint.meta.name, endpoint.meta.namespace, port
        );
        Ok(Arc::new(HttpSidecar::new(&url, self.settings)?))
    }
}

#[async_trait]
impl SidecarLocator for ClusterLocator {
    async fn find(
        &self,
        environment: &Environment,
        service: &ServiceRef,
    ) -> Result<Option<Arc<dyn Sidecar>>, WingmanError> {
        let cx = ResourceContext::new(self.cluster.as_ref(), environment)
            .for_service(&service.module, &service.service);
        let endpoints = self.endpoints(cx).await?;

        match endpoints.as_slice() {
            [] => Ok(None),
            [endpoint] => self.sidecar(endpoint).map(Some),
            _ => Err(WingmanError::Ambiguous {
                service: service.clone(),
                count: endpoints.len(),
            }),
        }
    }

    async fn all(
        &self,
        environment: &Environment,
    ) -> Result<Vec<(ServiceRef, Arc<dyn Sidecar>)>, WingmanError> {
        let cx = ResourceContext::new(self.cluster.as_ref(), environment);
        let mut sidecars = Vec::new();
        for endpoint in self.endpoints(cx).await? {
            let labels = &endpoint.meta.labels;
            let (Some(module), Some(service)) = (labels.get(LABEL_MODULE), labels.get(LABEL_SERVICE))
            else {
                continue;
            };
            sidecars.push((ServiceRef::new(module, service), self.sidecar(&endpoint)?));
        }
        Ok(sidecars)
    }
}
