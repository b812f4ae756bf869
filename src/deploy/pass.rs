// ABOUTME: One deployment pass: walk the plan from the persisted cursor, converging each service.
// ABOUTME: Suspends as Waiting when configuration is missing and persists progress per service.

use nonempty::NonEmpty;
use snafu::ResultExt;
use std::sync::Arc;

use super::engine::{Inner, PassOutcome};
use super::error::{
    ConvergeSnafu, EvaluateSnafu, InvalidStatusSnafu, NamespaceSnafu, PassError, StoreSnafu,
    WingmanSnafu,
};
use crate::cancel::CancelFlag;
use crate::expr::{ConfigPoint, EvalContext};
use crate::function::FunctionChain;
use crate::plan::{Plan, Resolution, ServiceConfig};
use crate::resource::{MaterializedService, NamespaceResource, ResourceContext, converge};
use crate::state::State;
use crate::store::DeploymentStatus;
use crate::types::{DeploymentId, Environment, ServiceRef};
use crate::wingman::{Sidecar, SidecarFunctions};

pub(crate) async fn run(
    engine: &Inner,
    id: &DeploymentId,
    cancel: &CancelFlag,
) -> Result<PassOutcome, PassError> {
    let store = &engine.store;
    let _lock = store.lock(id).await.context(StoreSnafu {
        step: "lock deployment",
    })?;

    let record = store.read(id).await.context(StoreSnafu {
        step: "read deployment",
    })?;
    if !record.status.is_runnable() {
        return InvalidStatusSnafu {
            id: id.clone(),
            status: record.status,
        }
        .fail();
    }
    store
        .write_status(id, DeploymentStatus::InProgress)
        .await
        .context(StoreSnafu {
            step: "mark deployment in progress",
        })?;

    let environment = store
        .environment(&record.environment_id)
        .await
        .context(StoreSnafu {
            step: "read environment",
        })?;

    cancel.checkpoint()?;
    let root = ResourceContext::new(engine.cluster.as_ref(), &environment);
    converge(
        &root,
        &NamespaceResource::for_context(&root),
        &engine.settings.converge,
        cancel,
    )
    .await
    .context(NamespaceSnafu)?;

    let plan = &record.plan;
    let mut state = record.state;
    if state.service_index > 0 {
        tracing::info!(service_index = state.service_index, "resuming deployment");
    }

    while let Some(service) = plan.service(state.service_index) {
        cancel.checkpoint()?;
        let service_ref = service.service_ref();

        if let Some(points) =
            deploy_service(engine, plan, service, &environment, &state, cancel).await?
        {
            store
                .write_state_and_status(id, &state, DeploymentStatus::Waiting)
                .await
                .context(StoreSnafu {
                    step: "suspend deployment",
                })?;
            return Ok(PassOutcome::Waiting {
                service: service_ref,
                points,
            });
        }

        state.service_index += 1;
        store
            .write_state_and_status(id, &state, DeploymentStatus::InProgress)
            .await
            .context(StoreSnafu {
                step: "persist progress",
            })?;
        tracing::info!(
            module = %service.module_name,
            service = %service.service_name,
            "deployed service"
        );
    }

    store
        .write_state_and_status(id, &state, DeploymentStatus::Success)
        .await
        .context(StoreSnafu {
            step: "mark deployment successful",
        })?;
    Ok(PassOutcome::Succeeded)
}

/// Converge one service and its wingman. Returns the points it is waiting on, if any.
async fn deploy_service(
    engine: &Inner,
    plan: &Plan,
    service: &ServiceConfig,
    environment: &Environment,
    state: &State,
    cancel: &CancelFlag,
) -> Result<Option<NonEmpty<ConfigPoint>>, PassError> {
    let service_ref = service.service_ref();
    let remote = SidecarFunctions::new(
        environment,
        sidecars_in_plan_order(engine, plan, environment, &service_ref).await?,
    );
    let functions = FunctionChain::new(&engine.registry).then(&remote);
    let cx = EvalContext::new(&service.module_name, state, &plan.configs, &functions)
        .with_service(&service.service_name);
    let rcx = ResourceContext::new(engine.cluster.as_ref(), environment)
        .for_service(&service.module_name, &service.service_name);

    let wingman = service.evaluate_wingman(&cx).await.context(EvaluateSnafu {
        service: service_ref.clone(),
        what: "wingman",
    })?;
    match wingman {
        None => {}
        Some(Resolution::Pending(points)) => {
            tracing::info!(service = %service_ref, "waiting for wingman configuration");
            return Ok(Some(points));
        }
        Some(Resolution::Ready(definition)) => {
            MaterializedService::for_wingman(
                &definition,
                &service.module_name,
                &service.service_name,
                engine.settings.wingman.port,
            )
            .converge(&rcx, &engine.settings.converge, cancel)
            .await
            .context(ConvergeSnafu {
                service: service_ref.clone(),
                what: "wingman",
            })?;
            tracing::info!(service = %service_ref, "deployed wingman");

            if let Some(points) = dynamic_points(engine, service, environment, state).await? {
                tracing::info!(service = %service_ref, "waiting for dynamic wingman configuration");
                return Ok(Some(points));
            }
        }
    }

    cancel.checkpoint()?;
    let definition = match service.evaluate(&cx).await.context(EvaluateSnafu {
        service: service_ref.clone(),
        what: "service",
    })? {
        Resolution::Pending(points) => {
            tracing::info!(service = %service_ref, "waiting for configuration");
            return Ok(Some(points));
        }
        Resolution::Ready(definition) => definition,
    };

    MaterializedService::for_service(&definition, &service.module_name, &service.service_name)
        .converge(&rcx, &engine.settings.converge, cancel)
        .await
        .context(ConvergeSnafu {
            service: service_ref,
            what: "service",
        })?;
    Ok(None)
}

/// Points the service's running wingman still needs.
pub(crate) async fn dynamic_points(
    engine: &Inner,
    service: &ServiceConfig,
    environment: &Environment,
    state: &State,
) -> Result<Option<NonEmpty<ConfigPoint>>, PassError> {
    let service_ref = service.service_ref();
    let Some(sidecar) = engine
        .sidecars
        .find(environment, &service_ref)
        .await
        .context(WingmanSnafu {
            service: service_ref.clone(),
        })?
    else {
        return Ok(None);
    };

    let points = sidecar
        .config_points(&service.module_name, state)
        .await
        .context(WingmanSnafu {
            service: service_ref,
        })?;
    Ok(NonEmpty::from_vec(points))
}

/// Every running sidecar of the environment, ordered as their services are in the plan.
pub(crate) async fn sidecars_in_plan_order(
    engine: &Inner,
    plan: &Plan,
    environment: &Environment,
    service: &ServiceRef,
) -> Result<Vec<(ServiceRef, Arc<dyn Sidecar>)>, PassError> {
    let mut sidecars = engine
        .sidecars
        .all(environment)
        .await
        .context(WingmanSnafu {
            service: service.clone(),
        })?;
    sidecars.sort_by_key(|(owner, _)| {
        plan.services
            .iter()
            .position(|s| s.module_name == owner.module && s.service_name == owner.service)
            .unwrap_or(usize::MAX)
    });
    Ok(sidecars)
}
