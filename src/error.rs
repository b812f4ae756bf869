// ABOUTME: Application-level error for the mora CLI and config loading.
// ABOUTME: Wraps every library layer error behind one thiserror enum.

use std::path::PathBuf;
use thiserror::Error;

use crate::cluster::ClusterError;
use crate::deploy::{ConfigureError, PassError, SubmitError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Pass(#[from] PassError),

    #[error(transparent)]
    Configure(#[from] ConfigureError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("background deployment task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
