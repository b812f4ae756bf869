// ABOUTME: Advisory file lock created atomically, with holder info stored in the file.
// ABOUTME: Waits while another holder is live and breaks locks older than a threshold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::StoreError;

/// How lock contention is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    pub poll_interval: Duration,
    pub stale_after: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            stale_after: Duration::from_secs(60 * 60),
        }
    }
}

/// Information about who holds a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    /// Deployment the lock protects.
    pub deployment: String,
}

impl LockInfo {
    pub fn new(deployment: impl Into<String>) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            deployment: deployment.into(),
        }
    }

    pub fn is_stale(&self, stale_after: Duration) -> bool {
        (Utc::now() - self.started_at)
            .to_std()
            .is_ok_and(|age| age >= stale_after)
    }
}

/// A held lock file. Removed on drop.
#[derive(Debug)]
pub(crate) struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Create `path` exclusively, waiting for a live holder to release it.
    pub(crate) async fn acquire(
        path: PathBuf,
        info: &LockInfo,
        settings: &LockSettings,
    ) -> Result<Self, StoreError> {
        let io_error = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let content = serde_json::to_vec(info).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let mut announced = false;
        loop {
            match Self::try_create(&path, &content) {
                Ok(Some(lock)) => return Ok(lock),
                Ok(None) => {}
                Err(e) => return Err(io_error(e)),
            }

            if Self::is_breakable(&path, settings).await {
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(io_error(e)),
                }
                continue;
            }

            if !announced {
                tracing::debug!(lock = %path.display(), "waiting for lock");
                announced = true;
            }
            tokio::time::sleep(settings.poll_interval).await;
        }
    }

    /// Create and fill the lock file without yielding, so a caller that stops
    /// waiting can never leave behind a file nobody owns.
    fn try_create(path: &Path, content: &[u8]) -> std::io::Result<Option<Self>> {
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(e),
        };
        // Removed again by drop if the write fails.
        let lock = Self {
            path: path.to_path_buf(),
        };
        file.write_all(content)?;
        Ok(Some(lock))
    }

    /// A lock is broken when its holder info is stale, or when it has been
    /// unreadable for longer than the stale threshold.
    async fn is_breakable(path: &Path, settings: &LockSettings) -> bool {
        let Ok(content) = tokio::fs::read(path).await else {
            return false;
        };

        match serde_json::from_slice::<LockInfo>(&content) {
            Ok(existing) if existing.is_stale(settings.stale_after) => {
                tracing::warn!(
                    "Breaking stale lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                true
            }
            Ok(_) => false,
            Err(_) => {
                let age = tokio::fs::metadata(path)
                    .await
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|modified| SystemTime::now().duration_since(modified).ok());
                let stale = age.is_some_and(|age| age >= settings.stale_after);
                if stale {
                    tracing::warn!(lock = %path.display(), "Breaking unreadable stale lock");
                }
                stale
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != ErrorKind::NotFound
        {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> LockSettings {
        LockSettings {
            poll_interval: Duration::from_millis(5),
            stale_after: Duration::from_secs(3600),
        }
    }

    #[test]
    fn lock_info_creates_with_current_host_and_pid() {
        let info = LockInfo::new("d-1");
        assert_eq!(info.deployment, "d-1");
        assert_eq!(info.pid, std::process::id());
        assert!(!info.holder.is_empty());
    }

    #[test]
    fn old_lock_is_stale() {
        let mut info = LockInfo::new("d-1");
        assert!(!info.is_stale(Duration::from_secs(3600)));
        info.started_at = Utc::now() - chrono::Duration::hours(2);
        assert!(info.is_stale(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.lock");
        let info = LockInfo::new("d");

        let lock = FileLock::acquire(path.clone(), &info, &fast()).await.unwrap();
        assert!(path.exists());
        drop(lock);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn second_holder_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.lock");
        let info = LockInfo::new("d");

        let first = FileLock::acquire(path.clone(), &info, &fast()).await.unwrap();
        let waiter = {
            let path = path.clone();
            let info = info.clone();
            tokio::spawn(async move { FileLock::acquire(path, &info, &fast()).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());
        drop(first);

        let second = waiter.await.unwrap().unwrap();
        assert!(path.exists());
        drop(second);
    }

    #[tokio::test]
    async fn abandoned_wait_leaves_no_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.lock");
        let info = LockInfo::new("d");

        for _ in 0..20 {
            let holder = FileLock::acquire(path.clone(), &info, &fast()).await.unwrap();
            let waited = tokio::time::timeout(
                Duration::from_millis(15),
                FileLock::acquire(path.clone(), &info, &fast()),
            )
            .await;
            assert!(waited.is_err());
            drop(holder);

            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(!path.exists());
        }
    }

    #[tokio::test]
    async fn stale_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.lock");
        let mut old = LockInfo::new("d");
        old.started_at = Utc::now() - chrono::Duration::hours(2);
        std::fs::write(&path, serde_json::to_vec(&old).unwrap()).unwrap();

        let lock = FileLock::acquire(path.clone(), &LockInfo::new("d"), &fast())
            .await
            .unwrap();
        let held: LockInfo = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(held.pid, std::process::id());
        assert!(!held.is_stale(Duration::from_secs(3600)));
        drop(lock);
    }
}
