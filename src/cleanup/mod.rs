// ABOUTME: Rolling-update reconciler that retires pre-update containers.
// ABOUTME: Removes an old container only after its replacement is observed running.

mod task;

pub use task::{CleanupState, CleanupTask, ExistingContainer};

use crate::config::ServerConfig;
use crate::runtime::{ContainerFilters, ContainerOps, ImageOps, PruneReport, Runtime};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Timing and bounds for the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    /// Wait before each probing pass.
    pub settle_delay: Duration,
    /// Probing passes before the task is abandoned.
    pub max_attempts: u32,
    /// Prune unused images and volumes once the task is done.
    pub autoprune: bool,
}

impl CleanupPolicy {
    pub fn from_server(server: &ServerConfig) -> Self {
        Self {
            settle_delay: server.cleanup_settle_delay,
            max_attempts: server.cleanup_max_attempts.max(1),
            autoprune: server.autoprune,
        }
    }
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self::from_server(&ServerConfig::default())
    }
}

/// How a cleanup task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Done {
        attempts: u32,
        removed: Vec<ExistingContainer>,
        pruned: Option<PruneReport>,
    },
    Abandoned {
        attempts: u32,
        remaining: Vec<ExistingContainer>,
    },
}

/// Drives one cleanup task through its states.
pub struct Reconciler {
    runtime: Arc<dyn Runtime>,
    policy: CleanupPolicy,
    task: CleanupTask,
    state: CleanupState,
    attempts: u32,
    removed: Vec<ExistingContainer>,
    pruned: Option<PruneReport>,
}

impl Reconciler {
    pub fn new(runtime: Arc<dyn Runtime>, task: CleanupTask, policy: CleanupPolicy) -> Self {
        Self {
            runtime,
            policy,
            task,
            state: CleanupState::Scheduled { attempt: 1 },
            attempts: 0,
            removed: Vec::new(),
            pruned: None,
        }
    }

    pub fn state(&self) -> &CleanupState {
        &self.state
    }

    pub fn task(&self) -> &CleanupTask {
        &self.task
    }

    /// Advance by one transition. Terminal states do not move.
    pub async fn step(&mut self) -> &CleanupState {
        let next = match self.state.clone() {
            CleanupState::Scheduled { .. } if self.task.existing.is_empty() => {
                self.finish().await
            }
            CleanupState::Scheduled { attempt } => {
                tokio::time::sleep(self.policy.settle_delay).await;
                CleanupState::Probing { attempt }
            }
            CleanupState::Probing { attempt } => {
                self.attempts = attempt;
                self.probe().await;
                if self.task.existing.is_empty() {
                    self.finish().await
                } else if attempt >= self.policy.max_attempts {
                    tracing::warn!(
                        user = %self.task.username,
                        project = %self.task.project,
                        remaining = self.task.existing.len(),
                        attempts = attempt,
                        "giving up on cleanup of previous deployments"
                    );
                    CleanupState::Abandoned {
                        remaining: self.task.existing.clone(),
                    }
                } else {
                    CleanupState::Scheduled {
                        attempt: attempt + 1,
                    }
                }
            }
            CleanupState::Done | CleanupState::Abandoned { .. } => return &self.state,
        };
        self.state = next;
        &self.state
    }

    /// Step until a terminal state.
    pub async fn run(mut self) -> CleanupOutcome {
        while !self.state.is_terminal() {
            self.step().await;
        }
        match self.state {
            CleanupState::Abandoned { remaining } => CleanupOutcome::Abandoned {
                attempts: self.attempts,
                remaining,
            },
            _ => CleanupOutcome::Done {
                attempts: self.attempts,
                removed: self.removed,
                pruned: self.pruned,
            },
        }
    }

    /// One probing pass: list, pick eligible containers, remove them together.
    async fn probe(&mut self) {
        let filters = ContainerFilters::for_project(&self.task.username, &self.task.project);
        let current = match self.runtime.list_containers(&filters).await {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(error = %e, project = %self.task.project, "listing containers for cleanup failed");
                return;
            }
        };

        let eligible = self.task.eligible(&current);
        if eligible.is_empty() {
            tracing::debug!(
                project = %self.task.project,
                waiting = self.task.existing.len(),
                "replacements not running yet"
            );
            return;
        }

        let runtime = &self.runtime;
        let results = join_all(eligible.iter().map(|old| async move {
            let result = runtime.remove_container(&old.id, true).await;
            (old, result)
        }))
        .await;

        let mut gone = Vec::new();
        for (old, result) in results {
            match result {
                Ok(()) => {
                    tracing::info!(container = %old.name, "removed previous deployment");
                    gone.push(old.clone());
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!(container = %old.name, "previous deployment already gone");
                    gone.push(old.clone());
                }
                Err(e) => {
                    tracing::warn!(container = %old.name, error = %e, "failed to remove previous deployment");
                }
            }
        }

        self.task
            .existing
            .retain(|e| !gone.iter().any(|g| g.id == e.id));
        self.removed.extend(gone);
    }

    async fn finish(&mut self) -> CleanupState {
        if self.policy.autoprune {
            match self.runtime.prune().await {
                Ok(report) => {
                    tracing::info!(
                        images = report.images_deleted,
                        volumes = report.volumes_deleted,
                        reclaimed = report.space_reclaimed,
                        "pruned unused images and volumes"
                    );
                    self.pruned = Some(report);
                }
                Err(e) => tracing::warn!(error = %e, "prune after cleanup failed"),
            }
        }
        CleanupState::Done
    }
}

/// Run a cleanup task in the background.
pub fn schedule_cleanup(
    runtime: Arc<dyn Runtime>,
    task: CleanupTask,
    policy: CleanupPolicy,
) -> JoinHandle<CleanupOutcome> {
    tracing::debug!(
        user = %task.username,
        project = %task.project,
        existing = task.existing.len(),
        created_at = %task.created_at,
        "scheduling cleanup"
    );
    tokio::spawn(Reconciler::new(runtime, task, policy).run())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_follows_server_config() {
        let server = ServerConfig {
            cleanup_settle_delay: Duration::from_millis(5),
            cleanup_max_attempts: 0,
            autoprune: true,
            ..Default::default()
        };
        let policy = CleanupPolicy::from_server(&server);
        assert_eq!(policy.settle_delay, Duration::from_millis(5));
        assert_eq!(policy.max_attempts, 1);
        assert!(policy.autoprune);
    }

    #[test]
    fn default_policy_is_bounded() {
        let policy = CleanupPolicy::default();
        assert_eq!(policy.max_attempts, 60);
        assert_eq!(policy.settle_delay, Duration::from_secs(10));
    }
}
