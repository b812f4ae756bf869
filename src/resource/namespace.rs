// ABOUTME: The environment's namespace, created if absent.
// ABOUTME: Any existing namespace of the right name is accepted as is.

use super::{Resource, ResourceContext};
use crate::cluster::{ClusterError, Namespace, ObjectMeta, TypedObject};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceResource {
    pub name: String,
}

impl NamespaceResource {
    pub fn for_context(cx: &ResourceContext<'_>) -> Self {
        Self {
            name: cx.namespace(),
        }
    }
}

#[async_trait::async_trait]
impl Resource for NamespaceResource {
    type Object = Namespace;

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_valid(&self, _cx: &ResourceContext<'_>, _existing: &Namespace) -> bool {
        true
    }

    fn build(&self, cx: &ResourceContext<'_>) -> Namespace {
        Namespace {
            meta: ObjectMeta::new("", &self.name, cx.labels()),
        }
    }

    fn ready(&self, _object: &Namespace) -> bool {
        true
    }

    async fn get(&self, cx: &ResourceContext<'_>) -> Result<Namespace, ClusterError> {
        let object = cx.cluster().get(Namespace::KIND, "", &self.name).await?;
        Namespace::try_from(object)
    }

    async fn delete(&self, cx: &ResourceContext<'_>) -> Result<(), ClusterError> {
        cx.cluster().delete(Namespace::KIND, "", &self.name).await
    }
}
