// ABOUTME: In-process cluster with simulated controllers and optional JSON snapshot.
// ABOUTME: Counts mutating calls so convergence idempotency can be observed.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{
    Cluster, ClusterError, EndpointKind, Ingress, Labels, Object, ObjectKind,
};

type Key = (ObjectKind, String, String);

struct Entry {
    object: Object,
    /// Reads left before the simulated controller marks the object ready.
    reads_until_ready: u32,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<Key, Entry>,
    mutations: usize,
    next_address: u32,
    ready_after: u32,
    unavailable: bool,
    /// Bumped on every mutation of a persisted cluster.
    generation: u64,
}

/// Serialized objects at one generation.
struct Snapshot {
    generation: u64,
    json: String,
}

/// A cluster held in memory.
///
/// Workloads and endpoints start unready and become ready after a
/// configurable number of reads. With a snapshot path every mutation is
/// written to disk, and loading a snapshot treats every object as settled.
#[derive(Default)]
pub struct MemoryCluster {
    inner: Mutex<Inner>,
    snapshot: Option<PathBuf>,
    /// Generation of the snapshot last written to disk.
    written: tokio::sync::Mutex<u64>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects become ready after `reads` reads instead of immediately.
    pub fn with_ready_after(self, reads: u32) -> Self {
        self.inner.lock().ready_after = reads;
        self
    }

    /// Load or create a cluster persisted at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClusterError> {
        let path = path.as_ref().to_path_buf();
        let mut inner = Inner::default();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let objects: Vec<Object> = serde_json::from_str(&content)?;
            for mut object in objects {
                inner.settle(&mut object);
                inner.objects.insert(key_of(&object), Entry {
                    object,
                    reads_until_ready: 0,
                });
            }
        }

        Ok(Self {
            inner: Mutex::new(inner),
            snapshot: Some(path),
            written: tokio::sync::Mutex::new(0),
        })
    }

    /// Number of create and delete calls served so far.
    pub fn mutations(&self) -> usize {
        self.inner.lock().mutations
    }

    pub fn set_ready_after(&self, reads: u32) {
        self.inner.lock().ready_after = reads;
    }

    /// Make every object ready now.
    pub fn settle_all(&self) {
        let mut inner = self.inner.lock();
        let mut keys: Vec<Key> = inner.objects.keys().cloned().collect();
        keys.sort();
        for key in keys {
            if let Some(mut entry) = inner.objects.remove(&key) {
                inner.settle(&mut entry.object);
                entry.reads_until_ready = 0;
                inner.objects.insert(key, entry);
            }
        }
    }

    /// Fail every call with an API error while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    /// Store an object directly, bypassing validation and the mutation count.
    pub fn insert(&self, object: Object) {
        self.inner.lock().objects.insert(key_of(&object), Entry {
            object,
            reads_until_ready: 0,
        });
    }

    /// Every stored object of `kind`, in name order.
    pub fn objects(&self, kind: ObjectKind) -> Vec<Object> {
        self.inner
            .lock()
            .objects
            .iter()
            .filter(|((k, _, _), _)| *k == kind)
            .map(|(_, entry)| entry.object.clone())
            .collect()
    }

    /// Serialize the objects for the snapshot file, if there is one.
    fn snapshot_of(&self, inner: &mut Inner) -> Result<Option<Snapshot>, ClusterError> {
        if self.snapshot.is_none() {
            return Ok(None);
        }
        inner.generation += 1;
        let objects: Vec<&Object> = inner.objects.values().map(|e| &e.object).collect();
        Ok(Some(Snapshot {
            generation: inner.generation,
            json: serde_json::to_string_pretty(&objects)?,
        }))
    }

    /// Write a snapshot unless a newer one is already on disk.
    async fn persist(&self, snapshot: Option<Snapshot>) -> Result<(), ClusterError> {
        let (Some(path), Some(snapshot)) = (&self.snapshot, snapshot) else {
            return Ok(());
        };
        let mut written = self.written.lock().await;
        if snapshot.generation <= *written {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, snapshot.json).await?;
        tokio::fs::rename(&tmp, path).await?;
        *written = snapshot.generation;
        Ok(())
    }

    fn apply_create(&self, mut object: Object) -> Result<(Object, Option<Snapshot>), ClusterError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;

        let kind = object.kind();
        if kind.is_namespaced() {
            let namespace = object.meta().namespace.clone();
            if !inner.objects.contains_key(&key(ObjectKind::Namespace, "", &namespace)) {
                return Err(ClusterError::NamespaceMissing(namespace));
            }
        } else {
            object.meta_mut().namespace.clear();
        }

        let key = key_of(&object);
        if inner.objects.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                kind,
                name: key.2,
            });
        }

        Inner::reset_status(&mut object);
        let reads_until_ready = inner.ready_after;
        if reads_until_ready == 0 {
            inner.settle(&mut object);
        }

        inner.objects.insert(key, Entry {
            object: object.clone(),
            reads_until_ready,
        });
        inner.mutations += 1;
        let snapshot = self.snapshot_of(&mut inner)?;
        Ok((object, snapshot))
    }

    fn apply_delete(
        &self,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Snapshot>, ClusterError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;

        let key = key(kind, namespace, name);
        if inner.objects.remove(&key).is_none() {
            return Err(ClusterError::NotFound {
                kind,
                name: name.to_string(),
            });
        }
        if kind == ObjectKind::Namespace {
            inner.objects.retain(|(_, ns, _), _| ns != name);
        }

        inner.mutations += 1;
        self.snapshot_of(&mut inner)
    }
}

impl Inner {
    fn check_available(&self) -> Result<(), ClusterError> {
        if self.unavailable {
            return Err(ClusterError::Api("cluster unavailable".to_string()));
        }
        Ok(())
    }

    /// Apply what a controller would eventually report for a live object.
    fn settle(&mut self, object: &mut Object) {
        match object {
            Object::Workload(workload) => {
                workload.status.ready_replicas = workload.spec.replicas;
            }
            Object::Endpoint(endpoint) => {
                self.next_address += 1;
                let n = self.next_address;
                if endpoint.spec.cluster_ip.is_none() {
                    endpoint.spec.cluster_ip = Some(format!("10.96.{}.{}", n / 256, n % 256));
                }
                match endpoint.spec.kind {
                    EndpointKind::ClusterIp => {}
                    EndpointKind::NodePort => {
                        for (i, port) in endpoint.spec.ports.iter_mut().enumerate() {
                            if port.node_port == 0 {
                                port.node_port = 30000 + ((n as usize * 8 + i) % 2768) as u16;
                            }
                        }
                    }
                    EndpointKind::LoadBalancer => {
                        if endpoint.status.ingress.is_empty() {
                            endpoint.status.ingress.push(Ingress {
                                ip: Some(format!("192.0.2.{}", n % 256)),
                                hostname: None,
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Clear whatever a controller fills in, for a freshly created object.
    fn reset_status(object: &mut Object) {
        match object {
            Object::Workload(workload) => workload.status.ready_replicas = 0,
            Object::Endpoint(endpoint) => {
                endpoint.spec.cluster_ip = None;
                endpoint.status.ingress.clear();
                for port in &mut endpoint.spec.ports {
                    port.node_port = 0;
                }
            }
            _ => {}
        }
    }
}

fn key_of(object: &Object) -> Key {
    let meta = object.meta();
    (object.kind(), meta.namespace.clone(), meta.name.clone())
}

fn key(kind: ObjectKind, namespace: &str, name: &str) -> Key {
    let namespace = if kind.is_namespaced() { namespace } else { "" };
    (kind, namespace.to_string(), name.to_string())
}

#[async_trait]
impl Cluster for MemoryCluster {
    async fn get(
        &self,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> Result<Object, ClusterError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;

        let key = key(kind, namespace, name);
        let Some(mut entry) = inner.objects.remove(&key) else {
            return Err(ClusterError::NotFound {
                kind,
                name: name.to_string(),
            });
        };

        if entry.reads_until_ready > 0 {
            entry.reads_until_ready -= 1;
            if entry.reads_until_ready == 0 {
                inner.settle(&mut entry.object);
            }
        }
        let object = entry.object.clone();
        inner.objects.insert(key, entry);
        Ok(object)
    }

    async fn list(
        &self,
        kind: ObjectKind,
        namespace: &str,
        selector: &Labels,
    ) -> Result<Vec<Object>, ClusterError> {
        let inner = self.inner.lock();
        inner.check_available()?;

        Ok(inner
            .objects
            .iter()
            .filter(|((k, ns, _), entry)| {
                *k == kind && ns == namespace && entry.object.meta().matches(selector)
            })
            .map(|(_, entry)| entry.object.clone())
            .collect())
    }

    async fn create(&self, object: Object) -> Result<Object, ClusterError> {
        let (object, snapshot) = self.apply_create(object)?;
        self.persist(snapshot).await?;
        Ok(object)
    }

    async fn delete(
        &self,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        let snapshot = self.apply_delete(kind, namespace, name)?;
        self.persist(snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{
        Container, Namespace, ObjectMeta, TypedObject, Workload, WorkloadSpec, WorkloadStatus,
    };

    fn namespace(name: &str) -> Object {
        Object::Namespace(Namespace {
            meta: ObjectMeta::new("", name, Labels::new()),
        })
    }

    fn workload(ns: &str, name: &str) -> Object {
        Object::Workload(Workload {
            meta: ObjectMeta::new(ns, name, Labels::new()),
            spec: WorkloadSpec {
                replicas: 1,
                selector: Labels::new(),
                service_account: None,
                containers: vec![Container {
                    name: name.to_string(),
                    image: "nginx".to_string(),
                    command: vec![],
                    env: vec![],
                }],
            },
            status: WorkloadStatus::default(),
        })
    }

    fn ready_replicas(object: Object) -> u32 {
        Workload::try_from(object).unwrap().status.ready_replicas
    }

    #[tokio::test]
    async fn create_requires_namespace() {
        let cluster = MemoryCluster::new();
        let err = cluster.create(workload("ns", "web")).await.unwrap_err();
        assert!(matches!(err, ClusterError::NamespaceMissing(_)));
    }

    #[tokio::test]
    async fn create_twice_conflicts() {
        let cluster = MemoryCluster::new();
        cluster.create(namespace("ns")).await.unwrap();
        cluster.create(workload("ns", "web")).await.unwrap();
        let err = cluster.create(workload("ns", "web")).await.unwrap_err();
        assert!(matches!(err, ClusterError::AlreadyExists { .. }));
        assert_eq!(cluster.mutations(), 2);
    }

    #[tokio::test]
    async fn workload_becomes_ready_after_reads() {
        let cluster = MemoryCluster::new().with_ready_after(2);
        cluster.create(namespace("ns")).await.unwrap();
        let created = cluster.create(workload("ns", "web")).await.unwrap();
        assert_eq!(ready_replicas(created), 0);

        let first = cluster.get(Workload::KIND, "ns", "web").await.unwrap();
        assert_eq!(ready_replicas(first), 0);
        let second = cluster.get(Workload::KIND, "ns", "web").await.unwrap();
        assert_eq!(ready_replicas(second), 1);
    }

    #[tokio::test]
    async fn deleting_namespace_removes_contents() {
        let cluster = MemoryCluster::new();
        cluster.create(namespace("ns")).await.unwrap();
        cluster.create(workload("ns", "web")).await.unwrap();
        cluster.delete(ObjectKind::Namespace, "", "ns").await.unwrap();

        let err = cluster.get(Workload::KIND, "ns", "web").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");
        {
            let cluster = MemoryCluster::open(&path).unwrap().with_ready_after(10);
            cluster.create(namespace("ns")).await.unwrap();
            cluster.create(workload("ns", "web")).await.unwrap();
        }

        let reopened = MemoryCluster::open(&path).unwrap();
        let object = reopened.get(Workload::KIND, "ns", "web").await.unwrap();
        assert_eq!(ready_replicas(object), 1);
    }

    #[tokio::test]
    async fn snapshot_follows_every_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");
        let cluster = MemoryCluster::open(&path).unwrap();
        cluster.create(namespace("ns")).await.unwrap();
        cluster.create(workload("ns", "web")).await.unwrap();
        cluster.create(workload("ns", "worker")).await.unwrap();
        cluster.delete(Workload::KIND, "ns", "web").await.unwrap();

        let reopened = MemoryCluster::open(&path).unwrap();
        assert!(reopened.get(Workload::KIND, "ns", "web").await.is_err());
        assert!(reopened.get(Workload::KIND, "ns", "worker").await.is_ok());
        assert!(!path.with_extension("tmp").exists());
    }
}
