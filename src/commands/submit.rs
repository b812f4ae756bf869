// ABOUTME: Submit command implementation.
// ABOUTME: Reads a plan file, records the deployment and runs its first pass.

use mora::deploy::{Engine, PassOutcome};
use mora::error::Result;
use mora::output::Output;
use mora::plan::Submission;
use mora::types::{DeploymentId, Environment};
use std::path::Path;

pub async fn submit(
    engine: &Engine,
    plan: &Path,
    user: &str,
    environment: &str,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let submission = read_submission(plan)?;
    let environment = Environment::new(user, environment);

    output.progress(&format!(
        "Submitting {} module(s) to {}",
        submission.modules.len(),
        environment.id
    ));
    let record = engine.submit(&environment, &submission).await?;
    output.progress(&format!("Created deployment {}", record.id));

    let outcome = engine.deploy(&record.id).await?;
    report(engine, &record.id, &outcome, &output).await
}

/// JSON when the extension says so, YAML otherwise.
fn read_submission(path: &Path) -> Result<Submission> {
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(Submission::from_yaml(&content)?)
    }
}

/// Print where a pass left the deployment.
pub(super) async fn report(
    engine: &Engine,
    id: &DeploymentId,
    outcome: &PassOutcome,
    output: &Output,
) -> Result<()> {
    let record = engine.store().read(id).await?;
    match outcome {
        PassOutcome::Succeeded => {
            output.deployment(&record, &[]);
            output.success(&format!("Deployment {id} succeeded"));
        }
        PassOutcome::Waiting { service, points } => {
            let points: Vec<_> = points.iter().cloned().collect();
            output.deployment(&record, &points);
            output.success(&format!("Deployment {id} is waiting for configuration of {service}"));
        }
    }
    Ok(())
}
