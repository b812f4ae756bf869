// ABOUTME: Supplying configuration to a waiting deployment, and querying what it waits for.
// ABOUTME: Submissions are checked against the pending points before state is written.

use snafu::ResultExt;
use std::collections::HashSet;
use tokio::task::JoinHandle;

use super::engine::{Engine, PassOutcome};
use super::error::{ConfigureError, EvaluateSnafu, PassError, StoreSnafu};
use super::pass::{dynamic_points, sidecars_in_plan_order};
use crate::cancel::CancelFlag;
use crate::cluster::SecretBytes;
use crate::expr::{ConfigPoint, EvalContext, PendingPoints, PointKind};
use crate::function::FunctionChain;
use crate::plan::Resolution;
use crate::resource::{Resource, ResourceContext, SecretResource, converge};
use crate::state::StateConfig;
use crate::store::{DeploymentRecord, DeploymentStatus};
use crate::types::{DeploymentId, Environment};
use crate::wingman::SidecarFunctions;

/// A value for one pending point.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigSubmission {
    pub module: String,
    pub identifier: String,
    pub value: ConfigValue,
}

#[derive(Clone, PartialEq, Eq)]
pub enum ConfigValue {
    /// The value itself. For secret points, the secret's contents.
    Value(String),
    /// Reuse the value from the environment's previous deployment.
    Inherit,
}

impl ConfigSubmission {
    pub fn value(
        module: impl Into<String>,
        identifier: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            identifier: identifier.into(),
            value: ConfigValue::Value(value.into()),
        }
    }

    pub fn inherit(module: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            identifier: identifier.into(),
            value: ConfigValue::Inherit,
        }
    }
}

// Submitted values may be secrets.
impl std::fmt::Debug for ConfigSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self.value {
            ConfigValue::Value(_) => "<value>",
            ConfigValue::Inherit => "<inherit>",
        };
        f.debug_struct("ConfigSubmission")
            .field("module", &self.module)
            .field("identifier", &self.identifier)
            .field("value", &value)
            .finish()
    }
}

impl Engine {
    /// The points a waiting deployment needs before it can continue.
    ///
    /// Follows the same steps as a pass without converging anything, and
    /// reports the first step that is missing configuration. Empty unless
    /// the deployment is `Waiting`.
    pub async fn pending_points(&self, id: &DeploymentId) -> Result<Vec<ConfigPoint>, PassError> {
        let store = &self.inner.store;
        let record = store.read(id).await.context(StoreSnafu {
            step: "read deployment",
        })?;
        if record.status != DeploymentStatus::Waiting {
            return Ok(Vec::new());
        }
        let environment = store
            .environment(&record.environment_id)
            .await
            .context(StoreSnafu {
                step: "read environment",
            })?;
        self.pending_for(&record, &environment).await
    }

    async fn pending_for(
        &self,
        record: &DeploymentRecord,
        environment: &Environment,
    ) -> Result<Vec<ConfigPoint>, PassError> {
        let inner = self.inner.as_ref();
        let plan = &record.plan;
        let state = &record.state;
        let Some(service) = plan.service(state.service_index) else {
            return Ok(Vec::new());
        };
        let service_ref = service.service_ref();

        let remote = SidecarFunctions::new(
            environment,
            sidecars_in_plan_order(inner, plan, environment, &service_ref).await?,
        );
        let functions = FunctionChain::new(&inner.registry).then(&remote);
        let cx = EvalContext::new(&service.module_name, state, &plan.configs, &functions)
            .with_service(&service.service_name);

        let mut pending = PendingPoints::new();
        let wingman = service.evaluate_wingman(&cx).await.context(EvaluateSnafu {
            service: service_ref.clone(),
            what: "wingman",
        })?;
        match wingman {
            Some(Resolution::Pending(points)) => pending.extend(points),
            Some(Resolution::Ready(_)) => {
                if let Some(points) = dynamic_points(inner, service, environment, state).await? {
                    pending.extend(points);
                }
            }
            None => {}
        }

        if pending.is_empty()
            && let Resolution::Pending(points) =
                service.evaluate(&cx).await.context(EvaluateSnafu {
                    service: service_ref,
                    what: "service",
                })?
        {
            pending.extend(points);
        }

        Ok(pending
            .into_pending()
            .map(|points| points.into_iter().collect())
            .unwrap_or_default())
    }

    /// Add values for pending points and start the next pass in the background.
    ///
    /// Secret values are stored in a cluster secret first; state records the
    /// secret's name.
    pub async fn configure(
        &self,
        id: &DeploymentId,
        submissions: Vec<ConfigSubmission>,
    ) -> Result<JoinHandle<Result<PassOutcome, PassError>>, ConfigureError> {
        let store = &self.inner.store;
        let lock = store.lock(id).await?;

        let record = store.read(id).await?;
        if record.status != DeploymentStatus::Waiting {
            return Err(ConfigureError::NotWaiting {
                id: id.clone(),
                status: record.status,
            });
        }
        let environment = store.environment(&record.environment_id).await?;
        let pending = self
            .pending_for(&record, &environment)
            .await
            .map_err(|e| ConfigureError::Pending(Box::new(e)))?;

        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let key = (submission.module.clone(), submission.identifier.clone());
            let Some(point) = pending
                .iter()
                .find(|p| p.matches(&submission.module, &submission.identifier))
            else {
                return Err(ConfigureError::NotPending {
                    module: key.0,
                    identifier: key.1,
                });
            };
            if !seen.insert(key.clone()) {
                return Err(ConfigureError::Duplicate {
                    module: key.0,
                    identifier: key.1,
                });
            }
            if record.state.has_config(&key.0, &key.1) {
                return Err(ConfigureError::AlreadySet {
                    module: key.0,
                    identifier: key.1,
                });
            }
            accepted.push((point.kind, submission));
        }

        let mut state = record.state.clone();
        for (kind, submission) in accepted {
            let config = self
                .resolve_submission(&record, &environment, kind, submission)
                .await?;
            state.configs.push(config);
        }

        store
            .write_state_and_status(id, &state, DeploymentStatus::InProgress)
            .await?;
        tracing::info!(deployment = %id, configs = state.configs.len(), "configuration updated");
        drop(lock);

        Ok(self.spawn_deploy(id.clone()))
    }

    async fn resolve_submission(
        &self,
        record: &DeploymentRecord,
        environment: &Environment,
        kind: PointKind,
        submission: ConfigSubmission,
    ) -> Result<StateConfig, ConfigureError> {
        let ConfigSubmission {
            module,
            identifier,
            value,
        } = submission;

        let text = match value {
            ConfigValue::Inherit => {
                let Some(previous) = &record.previous_deployment_id else {
                    return Err(ConfigureError::NoPrevious { module, identifier });
                };
                let previous_record = self.inner.store.read(previous).await?;
                let Some(config) = previous_record.state.find_config(&module, &identifier) else {
                    return Err(ConfigureError::NotInherited {
                        module,
                        identifier,
                        previous: previous.clone(),
                    });
                };
                // A secret must stay a secret name and never become plaintext.
                if config.kind != kind {
                    return Err(ConfigureError::KindMismatch {
                        module,
                        identifier,
                        previous: previous.clone(),
                        expected: kind,
                        found: config.kind,
                    });
                }
                tracing::debug!(module = %module, identifier = %identifier, previous = %previous, "inherited configuration");
                return Ok(config.clone());
            }
            ConfigValue::Value(text) => text,
        };

        let stored = match kind {
            PointKind::String => text.into_bytes(),
            PointKind::Secret => {
                let secret = SecretResource {
                    module: module.clone(),
                    identifier: identifier.clone(),
                    value: SecretBytes(text.into_bytes()),
                };
                let cx = ResourceContext::new(self.inner.cluster.as_ref(), environment)
                    .for_module(&module);
                converge(&cx, &secret, &self.inner.settings.converge, &CancelFlag::new())
                    .await
                    .map_err(|source| ConfigureError::Secret {
                        module: module.clone(),
                        identifier: identifier.clone(),
                        source,
                    })?;
                secret.name().into_bytes()
            }
        };

        Ok(StateConfig::new(module, identifier, kind, stored))
    }
}
