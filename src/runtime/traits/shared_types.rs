// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerConfig, ContainerInfo, BuildOptions, PruneReport, etc.

use crate::types::{ContainerId, NetworkAlias};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Configuration for creating a container.
#[derive(Debug, Clone, Default)]
pub struct ContainerConfig {
    /// Name for the container.
    pub name: String,
    /// Image to run.
    pub image: String,
    /// Environment as ordered `KEY=value` entries.
    pub env: Vec<String>,
    /// Labels to apply.
    pub labels: BTreeMap<String, String>,
    /// Published ports.
    pub ports: Vec<PortMapping>,
    /// Volume and bind mounts.
    pub volumes: Vec<VolumeMount>,
    /// Restart policy.
    pub restart_policy: RestartPolicyConfig,
    /// Network to attach at creation.
    pub network: Option<String>,
    /// Aliases on that network.
    pub network_aliases: Vec<NetworkAlias>,
}

/// Port mapping configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
}

/// Kind of mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// Host path bind mount.
    Bind,
    /// Named engine volume.
    Volume,
}

/// Volume mount configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// Host path or volume name.
    pub source: String,
    /// Target path in container.
    pub target: String,
    pub kind: MountKind,
}

impl VolumeMount {
    /// Parse a `source:dest` pair. Absolute or relative paths become bind
    /// mounts, bare names become named volumes.
    pub fn parse(spec: &str) -> Option<Self> {
        let (source, target) = spec.split_once(':')?;
        let target = target.split(':').next().unwrap_or(target);
        if source.is_empty() || target.is_empty() {
            return None;
        }
        let kind = if source.starts_with('/') || source.starts_with('.') {
            MountKind::Bind
        } else {
            MountKind::Volume
        };
        Some(Self {
            source: source.to_string(),
            target: target.to_string(),
            kind,
        })
    }
}

/// Restart policy handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicyConfig {
    /// Never restart.
    #[default]
    No,
    /// Always restart.
    Always,
    /// Restart on failure, at most `max_retries` times.
    OnFailure { max_retries: u32 },
}

/// Information about a container, as reported by inspect.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub labels: HashMap<String, String>,
    pub network_settings: NetworkSettings,
    pub mounts: Vec<MountPoint>,
}

/// Container state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl ContainerState {
    /// Parse the lowercase state string the engine reports in listings.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Some(Self::Created),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "restarting" => Some(Self::Restarting),
            "removing" => Some(Self::Removing),
            "exited" => Some(Self::Exited),
            "dead" => Some(Self::Dead),
            _ => None,
        }
    }
}

/// A mount as reported by inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub source: String,
    pub destination: String,
}

/// Network settings for a container.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkSettings {
    /// Endpoints by network name.
    pub networks: HashMap<String, NetworkInfo>,
}

/// Network endpoint of a container.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkInfo {
    pub network_id: String,
    pub ip_address: String,
    pub aliases: Vec<String>,
}

/// Configuration for creating a network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub name: String,
    pub driver: Option<String>,
    pub labels: HashMap<String, String>,
}

/// Options for an image build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Tag applied to the resulting image.
    pub tag: String,
    /// Dockerfile path inside the context.
    pub dockerfile: String,
    /// Build arguments.
    pub build_args: HashMap<String, String>,
    /// Always try to refresh base images.
    pub pull: bool,
    /// Labels applied to the image.
    pub labels: HashMap<String, String>,
}

/// What a prune pass reclaimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub images_deleted: usize,
    pub volumes_deleted: usize,
    pub space_reclaimed: u64,
}
