// ABOUTME: Engine settings read from mora.yml.
// ABOUTME: Every field has a default, so a missing discovered file means defaults.

mod init;

pub use init::{generate_template_yaml, init_config};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::deploy::EngineSettings;
use crate::error::{Error, Result};
use crate::resource::ConvergeSettings;
use crate::store::LockSettings;
use crate::wingman::WingmanSettings;

pub const CONFIG_FILENAME: &str = "mora.yml";
pub const CONFIG_FILENAME_ALT: &str = "mora.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".mora/config.yml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Where deployments, locks and the cluster snapshot live. Relative to
    /// the directory holding the config.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub convergence: ConvergenceConfig,

    #[serde(default)]
    pub cancellation: CancellationConfig,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub wingman: WingmanConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    #[serde(default = "default_converge_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_converge_poll", with = "humantime_serde")]
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationConfig {
    #[serde(default = "default_cancel_poll", with = "humantime_serde")]
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_poll", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_lock_stale", with = "humantime_serde")]
    pub stale_after: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WingmanConfig {
    #[serde(default = "default_wingman_port")]
    pub port: u16,
    #[serde(default = "default_wingman_attempts")]
    pub attempts: u32,
    #[serde(default = "default_wingman_backoff", with = "humantime_serde")]
    pub backoff: Duration,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".mora")
}

fn default_converge_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_converge_poll() -> Duration {
    Duration::from_millis(500)
}

fn default_cancel_poll() -> Duration {
    Duration::from_secs(2)
}

fn default_lock_poll() -> Duration {
    Duration::from_millis(100)
}

fn default_lock_stale() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_wingman_port() -> u16 {
    8080
}

fn default_wingman_attempts() -> u32 {
    10
}

fn default_wingman_backoff() -> Duration {
    Duration::from_secs(1)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            convergence: ConvergenceConfig::default(),
            cancellation: CancellationConfig::default(),
            lock: LockConfig::default(),
            wingman: WingmanConfig::default(),
        }
    }
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            timeout: default_converge_timeout(),
            poll_interval: default_converge_poll(),
        }
    }
}

impl Default for CancellationConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_cancel_poll(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_lock_poll(),
            stale_after: default_lock_stale(),
        }
    }
}

impl Default for WingmanConfig {
    fn default() -> Self {
        Self {
            port: default_wingman_port(),
            attempts: default_wingman_attempts(),
            backoff: default_wingman_backoff(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicitly named file. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ConfigNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        Self::from_yaml(&content)
    }

    /// The first config file found in `dir`, or defaults when there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(config = %path.display(), "loading configuration");
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        if self.wingman.attempts == 0 {
            return Err(Error::InvalidConfig(
                "wingman.attempts must be at least 1".to_string(),
            ));
        }
        if self.convergence.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "convergence.poll_interval must be positive".to_string(),
            ));
        }
        if self.cancellation.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "cancellation.poll_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `state_dir` resolved against `base`.
    pub fn state_path(&self, base: &Path) -> PathBuf {
        base.join(&self.state_dir)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            converge: ConvergeSettings {
                timeout: self.convergence.timeout,
                poll_interval: self.convergence.poll_interval,
            },
            cancel_poll_interval: self.cancellation.poll_interval,
            wingman: self.wingman_settings(),
        }
    }

    pub fn wingman_settings(&self) -> WingmanSettings {
        WingmanSettings {
            port: self.wingman.port,
            attempts: self.wingman.attempts,
            backoff: self.wingman.backoff,
        }
    }

    pub fn lock_settings(&self) -> LockSettings {
        LockSettings {
            poll_interval: self.lock.poll_interval,
            stale_after: self.lock.stale_after,
        }
    }
}
