// ABOUTME: Per-project deploy lock so two deploys of one project never interleave.
// ABOUTME: In-memory async mutexes keyed by `<user>/<project>`, released on drop.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock table shared by every deploy of one orchestrator.
#[derive(Debug, Clone, Default)]
pub struct DeployLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl DeployLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(username: &str, project: &str) -> String {
        format!("{}/{}", username, project)
    }

    /// Wait for and take the lock for a project.
    pub async fn acquire(&self, username: &str, project: &str) -> DeployLock {
        let key = Self::key(username, project);
        let mutex = {
            let mut table = self.inner.lock();
            table.entry(key.clone()).or_default().clone()
        };

        let guard = match mutex.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!(project = %key, "waiting for running deploy of this project");
                mutex.lock_owned().await
            }
        };

        tracing::debug!(project = %key, "deploy lock acquired");
        DeployLock {
            key,
            started_at: Utc::now(),
            _guard: guard,
        }
    }

    /// Whether a deploy currently holds the lock for a project.
    pub fn is_held(&self, username: &str, project: &str) -> bool {
        let table = self.inner.lock();
        table
            .get(&Self::key(username, project))
            .is_some_and(|m| m.try_lock().is_err())
    }
}

/// A held project lock.
pub struct DeployLock {
    key: String,
    started_at: DateTime<Utc>,
    _guard: OwnedMutexGuard<()>,
}

impl DeployLock {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl std::fmt::Debug for DeployLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployLock")
            .field("key", &self.key)
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        tracing::debug!(project = %self.key, "deploy lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn lock_is_released_on_drop() {
        let locks = DeployLocks::new();
        let lock = locks.acquire("admin", "demo").await;
        assert_eq!(lock.key(), "admin/demo");
        assert!(locks.is_held("admin", "demo"));
        drop(lock);
        assert!(!locks.is_held("admin", "demo"));
    }

    #[tokio::test]
    async fn different_projects_do_not_block() {
        let locks = DeployLocks::new();
        let _a = locks.acquire("admin", "one").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("admin", "two")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn same_project_waits_for_holder() {
        let locks = DeployLocks::new();
        let first = locks.acquire("admin", "demo").await;

        let waiting = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("admin", "demo").await.started_at() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        let released_at = Utc::now();
        drop(first);
        let second_started = waiting.await.unwrap();
        assert!(second_started >= released_at);
    }
}
