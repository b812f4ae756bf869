// ABOUTME: In-process deployment store backed by maps behind a mutex.
// ABOUTME: Keeps every status a deployment passed through for inspection.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::{
    DeploymentLock, DeploymentRecord, DeploymentStatus, DeploymentStore, NewDeployment, StoreError,
};
use crate::plan::Plan;
use crate::state::State;
use crate::types::{DeploymentId, Environment, EnvironmentId};

#[derive(Default)]
struct Inner {
    environments: HashMap<EnvironmentId, Environment>,
    deployments: HashMap<DeploymentId, DeploymentRecord>,
    /// Creation order.
    order: Vec<DeploymentId>,
    history: HashMap<DeploymentId, Vec<DeploymentStatus>>,
    locks: HashMap<DeploymentId, Arc<tokio::sync::Mutex<()>>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every status the deployment has had, oldest first.
    pub fn status_history(&self, id: &DeploymentId) -> Vec<DeploymentStatus> {
        self.inner
            .lock()
            .history
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    fn update(
        &self,
        id: &DeploymentId,
        apply: impl FnOnce(&mut DeploymentRecord) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .deployments
            .get_mut(id)
            .ok_or_else(|| StoreError::DeploymentNotFound(id.clone()))?;

        // Apply to a copy so a refused write leaves the record untouched.
        let mut updated = record.clone();
        apply(&mut updated)?;
        let status = updated.status;
        *record = updated;
        inner.history.entry(id.clone()).or_default().push(status);
        Ok(())
    }
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn put_environment(&self, environment: &Environment) -> Result<(), StoreError> {
        self.inner
            .lock()
            .environments
            .insert(environment.id.clone(), environment.clone());
        Ok(())
    }

    async fn environment(&self, id: &EnvironmentId) -> Result<Environment, StoreError> {
        self.inner
            .lock()
            .environments
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::EnvironmentNotFound(id.clone()))
    }

    async fn create_deployment(&self, new: NewDeployment) -> Result<DeploymentRecord, StoreError> {
        let record = DeploymentRecord::new(new);
        let mut inner = self.inner.lock();
        inner.order.push(record.id.clone());
        inner
            .history
            .insert(record.id.clone(), vec![record.status]);
        inner.deployments.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn lock(&self, id: &DeploymentId) -> Result<DeploymentLock, StoreError> {
        let mutex = {
            let mut inner = self.inner.lock();
            if !inner.deployments.contains_key(id) {
                return Err(StoreError::DeploymentNotFound(id.clone()));
            }
            inner.locks.entry(id.clone()).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        Ok(DeploymentLock::new(id.clone(), guard))
    }

    async fn read(&self, id: &DeploymentId) -> Result<DeploymentRecord, StoreError> {
        self.inner
            .lock()
            .deployments
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::DeploymentNotFound(id.clone()))
    }

    async fn write_status(
        &self,
        id: &DeploymentId,
        status: DeploymentStatus,
    ) -> Result<(), StoreError> {
        self.update(id, |record| record.set_status(status))
    }

    async fn write_state_and_status(
        &self,
        id: &DeploymentId,
        state: &State,
        status: DeploymentStatus,
    ) -> Result<(), StoreError> {
        self.update(id, |record| {
            record.set_status(status)?;
            record.state = state.clone();
            Ok(())
        })
    }

    async fn write_config(&self, id: &DeploymentId, plan: &Plan) -> Result<(), StoreError> {
        self.update(id, |record| {
            record.plan = plan.clone();
            record.updated_at = chrono::Utc::now();
            Ok(())
        })
    }

    async fn list(
        &self,
        environment: Option<&EnvironmentId>,
    ) -> Result<Vec<DeploymentRecord>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.deployments.get(id))
            .filter(|record| environment.is_none_or(|env| &record.environment_id == env))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn new_deployment(env: &str) -> NewDeployment {
        NewDeployment {
            environment_id: EnvironmentId::new(env),
            previous_deployment_id: None,
            plan: Plan::default(),
        }
    }

    #[tokio::test]
    async fn refused_write_leaves_record_untouched() {
        let store = MemoryStore::new();
        let record = store.create_deployment(new_deployment("e")).await.unwrap();
        store
            .write_status(&record.id, DeploymentStatus::Cancelled)
            .await
            .unwrap();

        let state = State {
            configs: vec![],
            service_index: 3,
        };
        let err = store
            .write_state_and_status(&record.id, &state, DeploymentStatus::Errored)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());

        let read = store.read(&record.id).await.unwrap();
        assert_eq!(read.status, DeploymentStatus::Cancelled);
        assert_eq!(read.state.service_index, 0);
        assert_eq!(
            store.status_history(&record.id),
            vec![DeploymentStatus::NotStarted, DeploymentStatus::Cancelled]
        );
    }

    #[tokio::test]
    async fn lock_is_exclusive_per_deployment() {
        let store = Arc::new(MemoryStore::new());
        let a = store.create_deployment(new_deployment("e")).await.unwrap();
        let b = store.create_deployment(new_deployment("e")).await.unwrap();

        let held = store.lock(&a.id).await.unwrap();
        // Another deployment is not blocked.
        let other = store.lock(&b.id).await.unwrap();
        drop(other);

        let waiter = {
            let store = store.clone();
            let id = a.id.clone();
            tokio::spawn(async move { store.lock(&id).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn missing_deployment_counts_as_cancelled() {
        let store = MemoryStore::new();
        assert!(store.is_cancelled(&DeploymentId::new("ghost")).await.unwrap());
    }

    #[tokio::test]
    async fn cancel_active_skips_finished_deployments() {
        let store = MemoryStore::new();
        let done = store.create_deployment(new_deployment("e")).await.unwrap();
        store.write_status(&done.id, DeploymentStatus::InProgress).await.unwrap();
        store.write_status(&done.id, DeploymentStatus::Success).await.unwrap();
        let live = store.create_deployment(new_deployment("e")).await.unwrap();
        let elsewhere = store.create_deployment(new_deployment("f")).await.unwrap();

        let cancelled = store.cancel_active(&EnvironmentId::new("e")).await.unwrap();
        assert_eq!(cancelled, vec![live.id.clone()]);
        assert_eq!(
            store.read(&elsewhere.id).await.unwrap().status,
            DeploymentStatus::NotStarted
        );

        let last = store
            .last_successful(&EnvironmentId::new("e"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.id, done.id);
    }
}
