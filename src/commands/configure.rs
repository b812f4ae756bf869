// ABOUTME: Configure and resume command implementations.
// ABOUTME: Parses module/identifier arguments and runs the next pass.

use super::submit::report;
use mora::deploy::{ConfigSubmission, Engine};
use mora::error::{Error, Result};
use mora::output::Output;
use mora::types::DeploymentId;

pub async fn configure(
    engine: &Engine,
    id: &str,
    set: &[String],
    inherit: &[String],
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let id = DeploymentId::new(id);

    let mut submissions = Vec::with_capacity(set.len() + inherit.len());
    for arg in set {
        let (key, value) = arg.split_once('=').ok_or_else(|| {
            Error::InvalidArgument(format!("expected MODULE/ID=VALUE, got {arg:?}"))
        })?;
        let (module, identifier) = parse_key(key)?;
        submissions.push(ConfigSubmission::value(module, identifier, value));
    }
    for arg in inherit {
        let (module, identifier) = parse_key(arg)?;
        submissions.push(ConfigSubmission::inherit(module, identifier));
    }
    if submissions.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to configure; pass --set or --inherit".to_string(),
        ));
    }

    output.progress(&format!(
        "Configuring {} point(s) of deployment {id}",
        submissions.len()
    ));
    let pass = engine.configure(&id, submissions).await?;
    let outcome = pass.await??;
    report(engine, &id, &outcome, &output).await
}

pub async fn resume(engine: &Engine, id: &str, mut output: Output) -> Result<()> {
    output.start_timer();
    let id = DeploymentId::new(id);
    output.progress(&format!("Resuming deployment {id}"));
    let outcome = engine.deploy(&id).await?;
    report(engine, &id, &outcome, &output).await
}

fn parse_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once('/') {
        Some((module, identifier)) if !module.is_empty() && !identifier.is_empty() => {
            Ok((module, identifier))
        }
        _ => Err(Error::InvalidArgument(format!(
            "expected MODULE/ID, got {key:?}"
        ))),
    }
}
