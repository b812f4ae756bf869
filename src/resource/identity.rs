// ABOUTME: Service accounts, roles and role bindings for wingman processes.
// ABOUTME: All three are ready as soon as they exist.

use super::{LABEL_NAME, Resource, ResourceContext};
use crate::cluster::{ObjectMeta, PolicyRule, Role, RoleBinding, RoleRef, ServiceAccount, Subject};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccountResource {
    pub name: String,
}

#[async_trait::async_trait]
impl Resource for ServiceAccountResource {
    type Object = ServiceAccount;

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_valid(&self, _cx: &ResourceContext<'_>, _existing: &ServiceAccount) -> bool {
        true
    }

    fn build(&self, cx: &ResourceContext<'_>) -> ServiceAccount {
        ServiceAccount {
            meta: ObjectMeta::new(
                cx.namespace(),
                &self.name,
                cx.labels_with(&[(LABEL_NAME, &self.name)]),
            ),
        }
    }

    fn ready(&self, _object: &ServiceAccount) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleResource {
    pub name: String,
    pub rules: Vec<PolicyRule>,
}

fn normalized(rules: &[PolicyRule]) -> Vec<PolicyRule> {
    let mut rules: Vec<PolicyRule> = rules
        .iter()
        .map(|rule| {
            let mut rule = rule.clone();
            rule.api_groups.sort();
            rule.resources.sort();
            rule.verbs.sort();
            rule
        })
        .collect();
    rules.sort_by(|a, b| {
        (&a.api_groups, &a.resources, &a.verbs).cmp(&(&b.api_groups, &b.resources, &b.verbs))
    });
    rules
}

#[async_trait::async_trait]
impl Resource for RoleResource {
    type Object = Role;

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_valid(&self, _cx: &ResourceContext<'_>, existing: &Role) -> bool {
        normalized(&existing.rules) == normalized(&self.rules)
    }

    fn build(&self, cx: &ResourceContext<'_>) -> Role {
        Role {
            meta: ObjectMeta::new(
                cx.namespace(),
                &self.name,
                cx.labels_with(&[(LABEL_NAME, &self.name)]),
            ),
            rules: self.rules.clone(),
        }
    }

    fn ready(&self, _object: &Role) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBindingResource {
    pub name: String,
    pub role: String,
    pub service_account: String,
}

#[async_trait::async_trait]
impl Resource for RoleBindingResource {
    type Object = RoleBinding;

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_valid(&self, cx: &ResourceContext<'_>, existing: &RoleBinding) -> bool {
        let [subject] = existing.subjects.as_slice() else {
            return false;
        };
        subject.kind == "ServiceAccount"
            && subject.name == self.service_account
            && subject.namespace == cx.namespace()
            && existing.role_ref.kind == "Role"
            && existing.role_ref.name == self.role
    }

    fn build(&self, cx: &ResourceContext<'_>) -> RoleBinding {
        RoleBinding {
            meta: ObjectMeta::new(
                cx.namespace(),
                &self.name,
                cx.labels_with(&[(LABEL_NAME, &self.name)]),
            ),
            subjects: vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: self.service_account.clone(),
                namespace: cx.namespace(),
            }],
            role_ref: RoleRef {
                kind: "Role".to_string(),
                name: self.role.clone(),
            },
        }
    }

    fn ready(&self, _object: &RoleBinding) -> bool {
        true
    }
}
