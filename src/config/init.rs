// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Writes a mora.yml template holding every default.

use humantime_serde::re::humantime::format_duration;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

/// Write the template to `dir`. Returns the path written.
pub fn init_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, generate_template_yaml(&Config::default()))?;
    Ok(config_path)
}

pub fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"# Directory for deployment records, locks and the cluster snapshot
state_dir: {}
convergence:
  # Upper bound for one resource to become ready
  timeout: {}
  poll_interval: {}
cancellation:
  poll_interval: {}
lock:
  poll_interval: {}
  # Locks older than this are broken
  stale_after: {}
wingman:
  port: {}
  attempts: {}
  backoff: {}
"#,
        config.state_dir.display(),
        format_duration(config.convergence.timeout),
        format_duration(config.convergence.poll_interval),
        format_duration(config.cancellation.poll_interval),
        format_duration(config.lock.poll_interval),
        format_duration(config.lock.stale_after),
        config.wingman.port,
        config.wingman.attempts,
        format_duration(config.wingman.backoff),
    )
}
