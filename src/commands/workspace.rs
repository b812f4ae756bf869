// ABOUTME: Builds the engine the CLI runs on from the loaded config.
// ABOUTME: File-backed store and persistent cluster under state_dir, sidecars found in the cluster.

use mora::cluster::{Cluster, MemoryCluster};
use mora::config::Config;
use mora::deploy::Engine;
use mora::error::Result;
use mora::store::FileStore;
use mora::wingman::ClusterLocator;
use std::path::Path;
use std::sync::Arc;

pub const CLUSTER_SNAPSHOT: &str = "cluster.json";

/// Open the engine for the project rooted at `base`.
pub fn open_engine(config: &Config, base: &Path) -> Result<Engine> {
    let state_dir = config.state_path(base);
    std::fs::create_dir_all(&state_dir)?;

    let store = Arc::new(FileStore::new(&state_dir, config.lock_settings()));
    let cluster: Arc<dyn Cluster> =
        Arc::new(MemoryCluster::open(state_dir.join(CLUSTER_SNAPSHOT))?);
    let sidecars = Arc::new(ClusterLocator::new(
        cluster.clone(),
        config.wingman_settings(),
    ));

    tracing::debug!(state_dir = %state_dir.display(), "engine opened");
    Ok(Engine::new(store, cluster, sidecars, config.engine_settings()))
}
