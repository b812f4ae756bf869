// ABOUTME: Typed cluster objects: namespaces, workloads, endpoints, secrets and RBAC.
// ABOUTME: Each converts to and from the tagged `Object` enum.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::ClusterError;

pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Namespace,
    Workload,
    Endpoint,
    Secret,
    ServiceAccount,
    Role,
    RoleBinding,
}

impl ObjectKind {
    pub fn is_namespaced(&self) -> bool {
        !matches!(self, ObjectKind::Namespace)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Namespace => "namespace",
            ObjectKind::Workload => "workload",
            ObjectKind::Endpoint => "endpoint",
            ObjectKind::Secret => "secret",
            ObjectKind::ServiceAccount => "service account",
            ObjectKind::Role => "role",
            ObjectKind::RoleBinding => "role binding",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: Labels,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, labels: Labels) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels,
        }
    }

    /// Whether every label of `selector` is present with the same value.
    pub fn matches(&self, selector: &Labels) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.labels.get(k).is_some_and(|have| have == v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub meta: ObjectMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub meta: ObjectMeta,
    pub spec: WorkloadSpec,
    #[serde(default)]
    pub status: WorkloadStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub replicas: u32,
    pub selector: Labels,
    #[serde(default)]
    pub service_account: Option<String>,
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: Vec<ContainerEnv>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEnv {
    pub name: String,
    pub source: EnvSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvSource {
    Value(String),
    SecretKey { secret: String, key: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadStatus {
    pub ready_replicas: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub meta: ObjectMeta,
    pub spec: EndpointSpec,
    #[serde(default)]
    pub status: EndpointStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointKind {
    #[default]
    ClusterIp,
    NodePort,
    LoadBalancer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    #[serde(default)]
    pub kind: EndpointKind,
    pub selector: Labels,
    pub ports: Vec<EndpointPort>,
    /// Assigned by the cluster. `"None"` marks a headless endpoint.
    #[serde(default)]
    pub cluster_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPort {
    pub port: u16,
    pub target_port: u16,
    /// Assigned by the cluster for node-port endpoints; 0 until then.
    #[serde(default)]
    pub node_port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStatus {
    #[serde(default)]
    pub ingress: Vec<Ingress>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingress {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub meta: ObjectMeta,
    pub data: BTreeMap<String, SecretBytes>,
}

/// Secret payload. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBytes(pub Vec<u8>);

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes(<{} bytes redacted>)", self.0.len())
    }
}

impl Serialize for SecretBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for SecretBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(SecretBytes)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub meta: ObjectMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub meta: ObjectMeta,
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub verbs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub meta: ObjectMeta,
    pub subjects: Vec<Subject>,
    pub role_ref: RoleRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub kind: String,
    pub name: String,
}

/// Any cluster object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Object {
    Namespace(Namespace),
    Workload(Workload),
    Endpoint(Endpoint),
    Secret(Secret),
    ServiceAccount(ServiceAccount),
    Role(Role),
    RoleBinding(RoleBinding),
}

/// A concrete object type with a fixed kind.
pub trait TypedObject:
    Into<Object> + TryFrom<Object, Error = ClusterError> + Send + Sync + 'static
{
    const KIND: ObjectKind;

    fn meta(&self) -> &ObjectMeta;
}

macro_rules! typed_objects {
    ($($ty:ident),* $(,)?) => {
        impl Object {
            pub fn kind(&self) -> ObjectKind {
                match self {
                    $(Object::$ty(_) => ObjectKind::$ty,)*
                }
            }

            pub fn meta(&self) -> &ObjectMeta {
                match self {
                    $(Object::$ty(o) => &o.meta,)*
                }
            }

            pub fn meta_mut(&mut self) -> &mut ObjectMeta {
                match self {
                    $(Object::$ty(o) => &mut o.meta,)*
                }
            }
        }

        $(
            impl From<$ty> for Object {
                fn from(object: $ty) -> Self {
                    Object::$ty(object)
                }
            }

            impl TryFrom<Object> for $ty {
                type Error = ClusterError;

                fn try_from(object: Object) -> Result<Self, Self::Error> {
                    match object {
                        Object::$ty(o) => Ok(o),
                        other => Err(ClusterError::WrongKind {
                            expected: ObjectKind::$ty,
                            found: other.kind(),
                        }),
                    }
                }
            }

            impl TypedObject for $ty {
                const KIND: ObjectKind = ObjectKind::$ty;

                fn meta(&self) -> &ObjectMeta {
                    &self.meta
                }
            }
        )*
    };
}

typed_objects!(
    Namespace,
    Workload,
    Endpoint,
    Secret,
    ServiceAccount,
    Role,
    RoleBinding,
);
