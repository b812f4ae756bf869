// ABOUTME: Persistence of environments and deployments, with per-deployment advisory locks.
// ABOUTME: Every status write is checked against the deployment state machine.

mod file;
mod lock;
mod memory;

pub use file::FileStore;
pub use lock::{LockInfo, LockSettings};
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::path::PathBuf;

use crate::plan::Plan;
use crate::state::State;
use crate::types::{DeploymentId, Environment, EnvironmentId};

/// Lifecycle of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    NotStarted,
    InProgress,
    /// Suspended until configuration is supplied.
    Waiting,
    Success,
    Errored,
    Cancelled,
}

impl DeploymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeploymentStatus::Success | DeploymentStatus::Errored | DeploymentStatus::Cancelled
        )
    }

    /// Whether a pass may run from this status.
    pub fn is_runnable(self) -> bool {
        matches!(
            self,
            DeploymentStatus::NotStarted | DeploymentStatus::InProgress | DeploymentStatus::Waiting
        )
    }

    pub fn can_transition_to(self, next: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        match self {
            NotStarted => matches!(next, InProgress | Cancelled),
            InProgress => matches!(next, InProgress | Waiting | Success | Errored | Cancelled),
            Waiting => matches!(next, InProgress | Waiting | Errored | Cancelled),
            Success | Errored | Cancelled => false,
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentStatus::NotStarted => "not started",
            DeploymentStatus::InProgress => "in progress",
            DeploymentStatus::Waiting => "waiting",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Errored => "errored",
            DeploymentStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One persisted deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentRecord {
    pub id: DeploymentId,
    pub environment_id: EnvironmentId,
    #[serde(default)]
    pub previous_deployment_id: Option<DeploymentId>,
    pub status: DeploymentStatus,
    pub plan: Plan,
    #[serde(default)]
    pub state: State,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRecord {
    fn new(new: NewDeployment) -> Self {
        let now = Utc::now();
        Self {
            id: DeploymentId::generate(),
            environment_id: new.environment_id,
            previous_deployment_id: new.previous_deployment_id,
            status: DeploymentStatus::NotStarted,
            plan: new.plan,
            state: State::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn set_status(&mut self, status: DeploymentStatus) -> Result<(), StoreError> {
        if !self.status.can_transition_to(status) {
            return Err(StoreError::IllegalTransition {
                deployment: self.id.clone(),
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// What a caller supplies to create a deployment.
#[derive(Debug, Clone)]
pub struct NewDeployment {
    pub environment_id: EnvironmentId,
    pub previous_deployment_id: Option<DeploymentId>,
    pub plan: Plan,
}

/// A held deployment lock. Released on drop.
pub struct DeploymentLock {
    deployment: DeploymentId,
    _guard: Box<dyn Any + Send + Sync>,
}

impl DeploymentLock {
    pub(crate) fn new(deployment: DeploymentId, guard: impl Any + Send + Sync) -> Self {
        Self {
            deployment,
            _guard: Box::new(guard),
        }
    }

    pub fn deployment(&self) -> &DeploymentId {
        &self.deployment
    }
}

impl fmt::Debug for DeploymentLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentLock")
            .field("deployment", &self.deployment)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("deployment {0} not found")]
    DeploymentNotFound(DeploymentId),

    #[error("environment {0} not found")]
    EnvironmentNotFound(EnvironmentId),

    #[error("deployment {deployment} cannot move from {from} to {to}")]
    IllegalTransition {
        deployment: DeploymentId,
        from: DeploymentStatus,
        to: DeploymentStatus,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("corrupt record at {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Whether a write was refused because the deployment had been cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            StoreError::IllegalTransition {
                from: DeploymentStatus::Cancelled,
                ..
            }
        )
    }
}

/// Durable storage for environments and deployments.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Insert or replace an environment.
    async fn put_environment(&self, environment: &Environment) -> Result<(), StoreError>;

    async fn environment(&self, id: &EnvironmentId) -> Result<Environment, StoreError>;

    /// Persist a new deployment in `NotStarted`.
    async fn create_deployment(&self, new: NewDeployment) -> Result<DeploymentRecord, StoreError>;

    /// Wait for the deployment's exclusive lock.
    async fn lock(&self, id: &DeploymentId) -> Result<DeploymentLock, StoreError>;

    async fn read(&self, id: &DeploymentId) -> Result<DeploymentRecord, StoreError>;

    async fn write_status(
        &self,
        id: &DeploymentId,
        status: DeploymentStatus,
    ) -> Result<(), StoreError>;

    /// Replace state and status in one write.
    async fn write_state_and_status(
        &self,
        id: &DeploymentId,
        state: &State,
        status: DeploymentStatus,
    ) -> Result<(), StoreError>;

    async fn write_config(&self, id: &DeploymentId, plan: &Plan) -> Result<(), StoreError>;

    /// A deployment that no longer exists counts as cancelled.
    async fn is_cancelled(&self, id: &DeploymentId) -> Result<bool, StoreError> {
        match self.read(id).await {
            Ok(record) => Ok(record.status == DeploymentStatus::Cancelled),
            Err(StoreError::DeploymentNotFound(_)) => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Cancel every unfinished deployment of an environment. Returns their ids.
    async fn cancel_active(
        &self,
        environment: &EnvironmentId,
    ) -> Result<Vec<DeploymentId>, StoreError> {
        let mut cancelled = Vec::new();
        for record in self.list(Some(environment)).await? {
            if record.status.is_terminal() {
                continue;
            }
            match self.write_status(&record.id, DeploymentStatus::Cancelled).await {
                Ok(()) => cancelled.push(record.id),
                // Finished between list and write.
                Err(StoreError::IllegalTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(cancelled)
    }

    /// The most recent deployment of an environment that reached `Success`.
    async fn last_successful(
        &self,
        environment: &EnvironmentId,
    ) -> Result<Option<DeploymentRecord>, StoreError> {
        Ok(self
            .list(Some(environment))
            .await?
            .into_iter()
            .rev()
            .find(|record| record.status == DeploymentStatus::Success))
    }

    /// Deployments in creation order, optionally for one environment.
    async fn list(
        &self,
        environment: Option<&EnvironmentId>,
    ) -> Result<Vec<DeploymentRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeploymentStatus::*;

    const ALL: [DeploymentStatus; 6] = [NotStarted, InProgress, Waiting, Success, Errored, Cancelled];

    #[test]
    fn terminal_states_accept_nothing() {
        for from in [Success, Errored, Cancelled] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn every_live_state_can_be_cancelled() {
        for from in [NotStarted, InProgress, Waiting] {
            assert!(from.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn waiting_loops_back_to_in_progress() {
        assert!(Waiting.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Waiting));
        assert!(!Waiting.can_transition_to(Success));
        assert!(!NotStarted.can_transition_to(Waiting));
    }

    #[test]
    fn cancelled_refusal_is_recognized() {
        let err = StoreError::IllegalTransition {
            deployment: DeploymentId::new("d"),
            from: Cancelled,
            to: Errored,
        };
        assert!(err.is_cancelled());
    }
}
