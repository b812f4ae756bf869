// ABOUTME: The deployment engine: submission, passes, configuration and cancellation.
// ABOUTME: Cheap to clone; every clone shares the same store, cluster and registry.

use nonempty::NonEmpty;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::error::{PassError, SubmitError};
use super::watcher::CancelWatcher;
use crate::cancel::CancelFlag;
use crate::cluster::Cluster;
use crate::expr::ConfigPoint;
use crate::function::FunctionRegistry;
use crate::plan::{Submission, build_plan};
use crate::resource::ConvergeSettings;
use crate::store::{DeploymentRecord, DeploymentStatus, DeploymentStore, NewDeployment, StoreError};
use crate::types::{DeploymentId, Environment, ServiceRef};
use crate::wingman::{SidecarLocator, WingmanSettings};

/// Tunables for passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub converge: ConvergeSettings,
    /// How often a running pass checks for cancellation.
    pub cancel_poll_interval: Duration,
    pub wingman: WingmanSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            converge: ConvergeSettings::default(),
            cancel_poll_interval: Duration::from_secs(2),
            wingman: WingmanSettings::default(),
        }
    }
}

/// How a pass ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// Suspended until the points are supplied.
    Waiting {
        service: ServiceRef,
        points: NonEmpty<ConfigPoint>,
    },
    Succeeded,
}

pub(crate) struct Inner {
    pub(crate) store: Arc<dyn DeploymentStore>,
    pub(crate) cluster: Arc<dyn Cluster>,
    pub(crate) sidecars: Arc<dyn SidecarLocator>,
    pub(crate) registry: FunctionRegistry,
    pub(crate) settings: EngineSettings,
}

#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<Inner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.inner.registry)
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        cluster: Arc<dyn Cluster>,
        sidecars: Arc<dyn SidecarLocator>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                cluster,
                sidecars,
                registry: FunctionRegistry::with_builtins(),
                settings,
            }),
        }
    }

    /// Functions available to every evaluation. New registrations apply to later passes.
    pub fn registry(&self) -> &FunctionRegistry {
        &self.inner.registry
    }

    pub fn store(&self) -> &Arc<dyn DeploymentStore> {
        &self.inner.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Build the plan and record a new deployment in `NotStarted`.
    ///
    /// Unfinished deployments of the same environment are cancelled, and
    /// the last successful one becomes the new deployment's previous.
    pub async fn submit(
        &self,
        environment: &Environment,
        submission: &Submission,
    ) -> Result<DeploymentRecord, SubmitError> {
        let plan = build_plan(submission, &self.inner.registry).await?;
        let store = &self.inner.store;

        store.put_environment(environment).await?;
        for id in store.cancel_active(&environment.id).await? {
            tracing::info!(deployment = %id, environment = %environment.id, "cancelled superseded deployment");
        }
        let previous = store.last_successful(&environment.id).await?.map(|r| r.id);

        let record = store
            .create_deployment(NewDeployment {
                environment_id: environment.id.clone(),
                previous_deployment_id: previous,
                plan,
            })
            .await?;
        tracing::info!(
            deployment = %record.id,
            environment = %environment.id,
            services = record.plan.services.len(),
            "deployment created"
        );
        Ok(record)
    }

    /// Run one pass to completion, suspension or failure.
    ///
    /// A failure other than cancellation marks the deployment `Errored`.
    pub async fn deploy(&self, id: &DeploymentId) -> Result<PassOutcome, PassError> {
        let span = tracing::info_span!("deploy", deployment = %id);
        async {
            let cancel = CancelFlag::new();
            let _watcher = CancelWatcher::spawn(
                self.inner.store.clone(),
                id.clone(),
                cancel.clone(),
                self.inner.settings.cancel_poll_interval,
            );

            tracing::info!("deployment pass started");
            let result = super::pass::run(&self.inner, id, &cancel).await;
            match &result {
                Ok(PassOutcome::Succeeded) => tracing::info!("deployment successful"),
                Ok(PassOutcome::Waiting { service, points }) => tracing::info!(
                    service = %service,
                    points = points.len(),
                    "deployment waiting for configuration"
                ),
                Err(e) if e.is_cancellation() => tracing::info!("deployment cancelled"),
                // Nothing ran; the stored status is someone else's.
                Err(e @ PassError::InvalidStatus { .. }) => tracing::warn!(error = %e, "deployment not runnable"),
                Err(e) => {
                    tracing::error!(error = %e, "deployment failed");
                    self.mark_errored(id).await;
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Run a pass in the background.
    pub fn spawn_deploy(&self, id: DeploymentId) -> JoinHandle<Result<PassOutcome, PassError>> {
        let engine = self.clone();
        tokio::spawn(async move { engine.deploy(&id).await })
    }

    /// Request cancellation. A running pass stops at its next checkpoint.
    pub async fn cancel(&self, id: &DeploymentId) -> Result<(), StoreError> {
        self.inner
            .store
            .write_status(id, DeploymentStatus::Cancelled)
            .await?;
        tracing::info!(deployment = %id, "deployment cancellation requested");
        Ok(())
    }

    /// Best effort, without the lock; never replaces `Cancelled`.
    async fn mark_errored(&self, id: &DeploymentId) {
        match self
            .inner
            .store
            .write_status(id, DeploymentStatus::Errored)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::warn!(error = %e, "failed to mark deployment errored"),
        }
    }
}
