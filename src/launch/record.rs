// ABOUTME: Inspected state of a launched container as reported back to the caller.
// ABOUTME: The unit carried in a status event's `deployments`.

use crate::runtime::{ContainerInfo, ContainerState, NetworkSettings};
use crate::types::ContainerId;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub labels: BTreeMap<String, String>,
    pub network_settings: NetworkSettings,
}

impl DeploymentRecord {
    pub fn state_label(&self) -> &'static str {
        match self.state {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

impl From<ContainerInfo> for DeploymentRecord {
    fn from(info: ContainerInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
            image: info.image,
            state: info.state,
            labels: info.labels.into_iter().collect(),
            network_settings: info.network_settings,
        }
    }
}
