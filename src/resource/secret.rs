// ABOUTME: A cluster secret holding one supplied secret configuration value.
// ABOUTME: Its name, not its contents, is what deployment state records.

use super::workload::SECRET_KEY;
use super::{LABEL_IDENTIFIER, Resource, ResourceContext};
use crate::cluster::{ObjectMeta, Secret, SecretBytes};
use crate::types::sanitize_subdomain;
use std::collections::BTreeMap;

pub struct SecretResource {
    pub module: String,
    pub identifier: String,
    pub value: SecretBytes,
}

impl std::fmt::Debug for SecretResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretResource")
            .field("module", &self.module)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Resource for SecretResource {
    type Object = Secret;

    fn name(&self) -> String {
        sanitize_subdomain(&format!("{}-{}", self.module, self.identifier))
    }

    fn is_valid(&self, _cx: &ResourceContext<'_>, existing: &Secret) -> bool {
        existing.data.len() == 1 && existing.data.get(SECRET_KEY) == Some(&self.value)
    }

    fn build(&self, cx: &ResourceContext<'_>) -> Secret {
        let mut data = BTreeMap::new();
        data.insert(SECRET_KEY.to_string(), self.value.clone());
        Secret {
            meta: ObjectMeta::new(
                cx.namespace(),
                self.name(),
                cx.labels_with(&[(LABEL_IDENTIFIER, &self.identifier)]),
            ),
            data,
        }
    }

    fn ready(&self, _object: &Secret) -> bool {
        true
    }
}
