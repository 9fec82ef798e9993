// ABOUTME: Cleanup task data and reconciler states.
// ABOUTME: A task shrinks its `existing` set on every pass until empty or abandoned.

use crate::runtime::ContainerSummary;
use crate::types::{ContainerId, strip_instance_suffix};
use chrono::{DateTime, Utc};

/// A pre-update container waiting to be retired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingContainer {
    pub id: ContainerId,
    pub name: String,
}

impl ExistingContainer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ContainerId::new(id),
            name: name.into(),
        }
    }

    /// Name with its instance suffix stripped.
    pub fn logical_name(&self) -> &str {
        strip_instance_suffix(&self.name)
    }
}

impl From<&ContainerSummary> for ExistingContainer {
    fn from(summary: &ContainerSummary) -> Self {
        Self {
            id: summary.id.clone(),
            name: summary.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanupTask {
    pub username: String,
    pub project: String,
    pub existing: Vec<ExistingContainer>,
    pub created_at: DateTime<Utc>,
}

impl CleanupTask {
    pub fn new(
        username: impl Into<String>,
        project: impl Into<String>,
        existing: Vec<ExistingContainer>,
    ) -> Self {
        Self {
            username: username.into(),
            project: project.into(),
            existing,
            created_at: Utc::now(),
        }
    }

    fn is_existing(&self, id: &ContainerId) -> bool {
        self.existing.iter().any(|e| &e.id == id)
    }

    /// Existing containers whose replacement is observed running and up.
    ///
    /// A replacement has the same logical name, a different id, and is not
    /// itself one of the containers being retired.
    pub fn eligible(&self, current: &[ContainerSummary]) -> Vec<ExistingContainer> {
        self.existing
            .iter()
            .filter(|old| {
                current.iter().any(|c| {
                    c.id != old.id
                        && !self.is_existing(&c.id)
                        && strip_instance_suffix(&c.name) == old.logical_name()
                        && c.is_running_and_up()
                })
            })
            .cloned()
            .collect()
    }
}

/// Reconciler state for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupState {
    /// Waiting out the settle delay before pass `attempt`.
    Scheduled { attempt: u32 },
    /// Listing and removing during pass `attempt`.
    Probing { attempt: u32 },
    /// Every existing container was removed.
    Done,
    /// Attempts ran out with containers still in place.
    Abandoned { remaining: Vec<ExistingContainer> },
}

impl CleanupState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CleanupState::Done | CleanupState::Abandoned { .. })
    }
}
