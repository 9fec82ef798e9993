// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: Create, start, stop, restart, remove, inspect, and list containers.

use super::shared_types::{ContainerConfig, ContainerInfo, ContainerState};
use crate::types::ContainerId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Send + Sync {
    /// Create a container from the given configuration.
    async fn create_container(&self, config: &ContainerConfig)
    -> Result<ContainerId, ContainerError>;

    /// Start a created container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stop a running container.
    async fn stop_container(&self, id: &ContainerId, timeout: Duration)
    -> Result<(), ContainerError>;

    /// Restart a container in place.
    async fn restart_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Remove a container.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    /// Get detailed information about a container.
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError>;

    /// List containers matching the given filters.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Filter by label (key=value).
    pub labels: HashMap<String, String>,
    /// Filter by name (engine does partial matching).
    pub name: Option<String>,
    /// Include stopped containers.
    pub all: bool,
}

impl ContainerFilters {
    /// Filter on the deployment owner and project labels.
    pub fn for_project(username: &str, project: &str) -> Self {
        let mut labels = HashMap::new();
        labels.insert(crate::launch::LABEL_USER.to_string(), username.to_string());
        labels.insert(crate::launch::LABEL_PROJECT.to_string(), project.to_string());
        Self {
            labels,
            ..Default::default()
        }
    }
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: ContainerId,
    /// Name without the leading slash.
    pub name: String,
    pub image: String,
    /// Engine state, e.g. `running`.
    pub state: String,
    /// Human status text, e.g. `Up 3 minutes`.
    pub status: String,
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    /// Running per the engine and reported as up.
    pub fn is_running_and_up(&self) -> bool {
        ContainerState::parse(&self.state) == Some(ContainerState::Running)
            && self.status.to_lowercase().contains("up")
    }
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ContainerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContainerError::NotFound(_))
    }
}
