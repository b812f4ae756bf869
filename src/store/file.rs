// ABOUTME: Deployment store persisted as JSON documents under a state directory.
// ABOUTME: Writes are atomic renames; each deployment is guarded by lock files.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::lock::FileLock;
use super::{
    DeploymentLock, DeploymentRecord, DeploymentStatus, DeploymentStore, LockInfo, LockSettings,
    NewDeployment, StoreError,
};
use crate::plan::Plan;
use crate::state::State;
use crate::types::{DeploymentId, Environment, EnvironmentId};

/// Layout under the root:
///
/// ```text
/// environments/{id}.json
/// deployments/{id}.json
/// locks/{id}.lock          held for a whole pass
/// locks/{id}.record.lock   held for one read-modify-write
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    settings: LockSettings,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, settings: LockSettings) -> Self {
        Self {
            root: root.into(),
            settings,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn environment_path(&self, id: &EnvironmentId) -> PathBuf {
        self.root
            .join("environments")
            .join(format!("{}.json", file_stem(id.as_str())))
    }

    fn deployments_dir(&self) -> PathBuf {
        self.root.join("deployments")
    }

    fn deployment_path(&self, id: &DeploymentId) -> PathBuf {
        self.deployments_dir()
            .join(format!("{}.json", file_stem(id.as_str())))
    }

    fn lock_path(&self, id: &DeploymentId, suffix: &str) -> PathBuf {
        self.root
            .join("locks")
            .join(format!("{}.{suffix}", file_stem(id.as_str())))
    }

    async fn update(
        &self,
        id: &DeploymentId,
        apply: impl FnOnce(&mut DeploymentRecord) -> Result<(), StoreError> + Send,
    ) -> Result<(), StoreError> {
        let _guard = FileLock::acquire(
            self.lock_path(id, "record.lock"),
            &LockInfo::new(id.as_str()),
            &self.settings,
        )
        .await?;

        let path = self.deployment_path(id);
        let mut record: DeploymentRecord = read_json(&path)
            .await?
            .ok_or_else(|| StoreError::DeploymentNotFound(id.clone()))?;
        apply(&mut record)?;
        write_json(&path, &record).await
    }
}

/// Ids come from users for environments; keep them to one path component.
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_json<T: Serialize + Sync>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let content = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content).await.map_err(io_error)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_error)
}

#[async_trait]
impl DeploymentStore for FileStore {
    async fn put_environment(&self, environment: &Environment) -> Result<(), StoreError> {
        write_json(&self.environment_path(&environment.id), environment).await
    }

    async fn environment(&self, id: &EnvironmentId) -> Result<Environment, StoreError> {
        read_json(&self.environment_path(id))
            .await?
            .ok_or_else(|| StoreError::EnvironmentNotFound(id.clone()))
    }

    async fn create_deployment(&self, new: NewDeployment) -> Result<DeploymentRecord, StoreError> {
        let record = DeploymentRecord::new(new);
        write_json(&self.deployment_path(&record.id), &record).await?;
        Ok(record)
    }

    async fn lock(&self, id: &DeploymentId) -> Result<DeploymentLock, StoreError> {
        if !tokio::fs::try_exists(self.deployment_path(id))
            .await
            .unwrap_or(false)
        {
            return Err(StoreError::DeploymentNotFound(id.clone()));
        }
        let lock = FileLock::acquire(
            self.lock_path(id, "lock"),
            &LockInfo::new(id.as_str()),
            &self.settings,
        )
        .await?;
        Ok(DeploymentLock::new(id.clone(), lock))
    }

    async fn read(&self, id: &DeploymentId) -> Result<DeploymentRecord, StoreError> {
        read_json(&self.deployment_path(id))
            .await?
            .ok_or_else(|| StoreError::DeploymentNotFound(id.clone()))
    }

    async fn write_status(
        &self,
        id: &DeploymentId,
        status: DeploymentStatus,
    ) -> Result<(), StoreError> {
        self.update(id, |record| record.set_status(status)).await
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
        .await
    }

    async fn write_config(&self, id: &DeploymentId, plan: &Plan) -> Result<(), StoreError> {
        self.update(id, |record| {
            record.plan = plan.clone();
            record.updated_at = chrono::Utc::now();
            Ok(())
        })
        .await
    }

    async fn list(
        &self,
        environment: Option<&EnvironmentId>,
    ) -> Result<Vec<DeploymentRecord>, StoreError> {
        let dir = self.deployments_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: dir, source }),
        };

        let mut records = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let Some(entry) = entry else { break };
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Some(record) = read_json::<DeploymentRecord>(&path).await?
                && environment.is_none_or(|env| &record.environment_id == env)
            {
                records.push(record);
            }
        }

        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::PointKind;
    use crate::state::StateConfig;

    fn store(dir: &Path) -> FileStore {
        FileStore::new(dir, LockSettings::default())
    }

    #[test]
    fn ids_stay_one_path_component() {
        assert_eq!(file_stem("alice-dev"), "alice-dev");
        assert_eq!(file_stem("../etc/passwd"), ".._etc_passwd");
    }

    #[tokio::test]
    async fn record_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::new("alice", "dev");
        let id = {
            let store = store(dir.path());
            store.put_environment(&env).await.unwrap();
            let record = store
                .create_deployment(NewDeployment {
                    environment_id: env.id.clone(),
                    previous_deployment_id: None,
                    plan: Plan::default(),
                })
                .await
                .unwrap();
            let state = State {
                configs: vec![StateConfig::new("app", "img", PointKind::String, "nginx")],
                service_index: 1,
            };
            store
                .write_state_and_status(&record.id, &state, DeploymentStatus::InProgress)
                .await
                .unwrap();
            record.id
        };

        let reopened = store(dir.path());
        let record = reopened.read(&id).await.unwrap();
        assert_eq!(record.status, DeploymentStatus::InProgress);
        assert_eq!(record.state.service_index, 1);
        assert_eq!(record.state.configs[0].value, b"nginx");
        assert_eq!(reopened.environment(&env.id).await.unwrap(), env);
        assert_eq!(reopened.list(Some(&env.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir.path().join("absent"));
        assert!(store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn illegal_transition_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let record = store
            .create_deployment(NewDeployment {
                environment_id: EnvironmentId::new("e"),
                previous_deployment_id: None,
                plan: Plan::default(),
            })
            .await
            .unwrap();

        let err = store
            .write_status(&record.id, DeploymentStatus::Success)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
        assert_eq!(
            store.read(&record.id).await.unwrap().status,
            DeploymentStatus::NotStarted
        );
    }
}
