// ABOUTME: Status, list and cancel command implementations.
// ABOUTME: Read-only views of the store plus the cancellation request.

use mora::deploy::Engine;
use mora::error::Result;
use mora::output::Output;
use mora::types::{DeploymentId, EnvironmentId};

pub async fn status(engine: &Engine, id: &str, output: Output) -> Result<()> {
    let id = DeploymentId::new(id);
    let record = engine.store().read(&id).await?;
    let pending = engine.pending_points(&id).await?;
    output.deployment(&record, &pending);
    Ok(())
}

pub async fn list(engine: &Engine, environment: Option<&str>, output: Output) -> Result<()> {
    let environment = environment.map(EnvironmentId::new);
    let records = engine.store().list(environment.as_ref()).await?;
    output.deployments(&records);
    Ok(())
}

pub async fn cancel(engine: &Engine, id: &str, output: Output) -> Result<()> {
    let id = DeploymentId::new(id);
    engine.cancel(&id).await?;
    output.success(&format!("Deployment {id} cancelled"));
    Ok(())
}
