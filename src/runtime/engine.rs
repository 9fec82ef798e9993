// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Supports both Docker and Podman via the Docker-compatible API.

use crate::runtime::traits::{
    BuildOptions, BuildOutputStream, ContainerConfig, ContainerError, ContainerFilters,
    ContainerInfo, ContainerOps, ContainerState, ContainerSummary, ImageError, ImageOps,
    MountKind, MountPoint, NetworkConfig, NetworkError, NetworkInfo, NetworkOps, NetworkSettings,
    PruneReport, RestartPolicyConfig,
};
use crate::runtime::types::{RuntimeInfo, RuntimeType};
use crate::runtime::RuntimeError;
use crate::types::{ContainerId, NetworkAlias, NetworkId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{
    BuildInfo, ContainerCreateBody, EndpointSettings, HostConfig, Mount, MountTypeEnum, PortBinding,
    RestartPolicy, RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, CreateImageOptions, ImportImageOptions,
    InspectContainerOptions, InspectNetworkOptions, ListContainersOptions, PruneImagesOptions,
    PruneVolumesOptions, RemoveContainerOptions, RestartContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{Either, Full};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn status_of(e: &bollard::errors::Error) -> Option<(u16, String)> {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.clone())),
        _ => None,
    }
}

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::ImageNotFound(message),
        Some((409, message)) => ContainerError::AlreadyExists(message),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::NotFound(message),
        Some((304, message)) => ContainerError::AlreadyRunning(message),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_stop_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::NotFound(message),
        Some((304, message)) => ContainerError::NotRunning(message),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::NotFound(message),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_network_create_error(e: bollard::errors::Error) -> NetworkError {
    match status_of(&e) {
        Some((409, message)) => NetworkError::AlreadyExists(message),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_network_connect_error(e: bollard::errors::Error) -> NetworkError {
    match status_of(&e) {
        Some((404, message)) => NetworkError::NotFound(message),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_state(status: bollard::models::ContainerStateStatusEnum) -> ContainerState {
    use bollard::models::ContainerStateStatusEnum as S;
    match status {
        S::CREATED => ContainerState::Created,
        S::RUNNING => ContainerState::Running,
        S::PAUSED => ContainerState::Paused,
        S::RESTARTING => ContainerState::Restarting,
        S::REMOVING => ContainerState::Removing,
        S::DEAD => ContainerState::Dead,
        _ => ContainerState::Exited,
    }
}

fn restart_policy(policy: RestartPolicyConfig) -> RestartPolicy {
    match policy {
        RestartPolicyConfig::No => RestartPolicy {
            name: Some(RestartPolicyNameEnum::NO),
            maximum_retry_count: None,
        },
        RestartPolicyConfig::Always => RestartPolicy {
            name: Some(RestartPolicyNameEnum::ALWAYS),
            maximum_retry_count: None,
        },
        RestartPolicyConfig::OnFailure { max_retries } => RestartPolicy {
            name: Some(RestartPolicyNameEnum::ON_FAILURE),
            maximum_retry_count: Some(i64::from(max_retries)),
        },
    }
}

/// One build progress message as a JSON fragment, or `None` when it carries nothing.
fn build_fragment(info: BuildInfo) -> Option<String> {
    if let Some(message) = info
        .error_detail
        .and_then(|detail| detail.message)
        .filter(|m| !m.is_empty())
    {
        return Some(json!({ "error": message, "errorDetail": { "message": message } }).to_string());
    }
    if let Some(stream) = info.stream.filter(|s| !s.is_empty()) {
        return Some(json!({ "stream": stream }).to_string());
    }
    info.status
        .filter(|s| !s.is_empty())
        .map(|status| json!({ "status": status }).to_string())
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime implementation using bollard.
///
/// Works against Docker and Podman through the Docker-compatible API.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to a container runtime using detected runtime info.
    pub fn connect(info: &RuntimeInfo) -> Result<Self, RuntimeError> {
        let client =
            Docker::connect_with_unix(&info.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| RuntimeError::Connection {
                    message: format!("{}: {}", info.socket_path, e),
                })?;
        Ok(Self::new(client, info.runtime_type))
    }

    /// Get the runtime type (Docker or Podman).
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn pull_image(&self, reference: &str) -> Result<(), ImageError> {
        let opts = CreateImageOptions {
            from_image: Some(reference.to_string()),
            ..Default::default()
        };

        // Pull returns a stream of progress updates - consume it
        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| ImageError::PullFailed(format!("{}: {}", reference, e)))?;
        }

        Ok(())
    }

    async fn image_exists(&self, reference: &str) -> Result<bool, ImageError> {
        match self.client.inspect_image(reference).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ImageError::Runtime(format!(
                "failed to inspect {}: {}",
                reference, e
            ))),
        }
    }

    async fn image_exposed_ports(&self, reference: &str) -> Result<Vec<u16>, ImageError> {
        let details = self.client.inspect_image(reference).await.map_err(|e| {
            match status_of(&e) {
                Some((404, _)) => ImageError::NotFound(reference.to_string()),
                _ => ImageError::Runtime(format!("failed to inspect {}: {}", reference, e)),
            }
        })?;

        // Keys look like "3000/tcp"
        let mut ports: Vec<u16> = details
            .config
            .and_then(|c| c.exposed_ports)
            .unwrap_or_default()
            .iter()
            .filter_map(|key| key.split('/').next().and_then(|p| p.parse().ok()))
            .collect();
        ports.sort_unstable();
        ports.dedup();
        Ok(ports)
    }

    fn build_image(&self, context: Vec<u8>, options: &BuildOptions) -> BuildOutputStream<'_> {
        let build_options = BuildImageOptions {
            dockerfile: options.dockerfile.clone(),
            t: Some(options.tag.clone()),
            buildargs: Some(options.build_args.clone()),
            labels: Some(options.labels.clone()),
            pull: options.pull.then(|| "true".to_string()),
            rm: true,
            ..Default::default()
        };

        let body = Either::Left(Full::new(Bytes::from(context)));
        let stream = self.client.build_image(build_options, None, Some(body));

        // Re-encode as the daemon's JSON so the build executor owns classification
        Box::pin(stream.filter_map(|item| async move {
            match item {
                Ok(info) => build_fragment(info).map(Ok),
                Err(e) => Some(Err(ImageError::BuildFailed(e.to_string()))),
            }
        }))
    }

    async fn load_image(&self, archive: Vec<u8>) -> Result<(), ImageError> {
        let body = Either::Left(Full::new(Bytes::from(archive)));
        let mut stream = self
            .client
            .import_image(ImportImageOptions::default(), body, None);

        while let Some(result) = stream.next().await {
            let info = result.map_err(|e| ImageError::LoadFailed(e.to_string()))?;
            if let Some(detail) = info.error_detail {
                return Err(ImageError::LoadFailed(detail.message.unwrap_or_default()));
            }
        }

        Ok(())
    }

    async fn prune(&self) -> Result<PruneReport, ImageError> {
        let images = self
            .client
            .prune_images(None::<PruneImagesOptions>)
            .await
            .map_err(|e| ImageError::Runtime(format!("failed to prune images: {}", e)))?;
        let volumes = self
            .client
            .prune_volumes(None::<PruneVolumesOptions>)
            .await
            .map_err(|e| ImageError::Runtime(format!("failed to prune volumes: {}", e)))?;

        let reclaimed = images.space_reclaimed.unwrap_or(0) + volumes.space_reclaimed.unwrap_or(0);
        Ok(PruneReport {
            images_deleted: images.images_deleted.map(|v| v.len()).unwrap_or(0),
            volumes_deleted: volumes.volumes_deleted.map(|v| v.len()).unwrap_or(0),
            space_reclaimed: u64::try_from(reclaimed).unwrap_or(0),
        })
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let mut host_config = HostConfig {
            restart_policy: Some(restart_policy(config.restart_policy)),
            ..Default::default()
        };

        let mounts: Vec<Mount> = config
            .volumes
            .iter()
            .map(|m| Mount {
                source: Some(m.source.clone()),
                target: Some(m.target.clone()),
                typ: Some(match m.kind {
                    MountKind::Bind => MountTypeEnum::BIND,
                    MountKind::Volume => MountTypeEnum::VOLUME,
                }),
                ..Default::default()
            })
            .collect();
        if !mounts.is_empty() {
            host_config.mounts = Some(mounts);
        }

        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: Vec<String> = Vec::new();
        for port in &config.ports {
            let port_key = format!("{}/tcp", port.container_port);
            exposed_ports.push(port_key.clone());
            port_bindings.insert(
                port_key,
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(port.host_port.to_string()),
                }]),
            );
        }
        if !port_bindings.is_empty() {
            host_config.port_bindings = Some(port_bindings);
        }

        let networking_config = config.network.as_ref().map(|network| {
            host_config.network_mode = Some(network.clone());
            let aliases: Vec<String> = config
                .network_aliases
                .iter()
                .map(NetworkAlias::to_string)
                .collect();
            let mut endpoints: HashMap<String, EndpointSettings> = HashMap::new();
            endpoints.insert(
                network.clone(),
                EndpointSettings {
                    aliases: if aliases.is_empty() { None } else { Some(aliases) },
                    ..Default::default()
                },
            );
            bollard::models::NetworkingConfig {
                endpoints_config: Some(endpoints),
            }
        });

        let container_config = ContainerCreateBody {
            image: Some(config.image.clone()),
            env: if config.env.is_empty() {
                None
            } else {
                Some(config.env.clone())
            },
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone().into_iter().collect())
            },
            host_config: Some(host_config),
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            networking_config,
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(config.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), container_config)
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn restart_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .restart_container(id.as_str(), None::<RestartContainerOptions>)
            .await
            .map_err(map_container_not_found_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let state = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(map_state)
            .unwrap_or(ContainerState::Exited);

        let mut networks = HashMap::new();
        if let Some(ref network_settings) = details.network_settings
            && let Some(ref nets) = network_settings.networks
        {
            for (name, endpoint) in nets {
                networks.insert(
                    name.clone(),
                    NetworkInfo {
                        network_id: endpoint.network_id.clone().unwrap_or_default(),
                        ip_address: endpoint.ip_address.clone().unwrap_or_default(),
                        aliases: endpoint.aliases.clone().unwrap_or_default(),
                    },
                );
            }
        }

        let mounts = details
            .mounts
            .unwrap_or_default()
            .into_iter()
            .map(|m| MountPoint {
                source: m.source.unwrap_or_default(),
                destination: m.destination.unwrap_or_default(),
            })
            .collect();

        Ok(ContainerInfo {
            id: ContainerId::new(details.id.unwrap_or_else(|| id.to_string())),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            state,
            labels: details.config.and_then(|c| c.labels).unwrap_or_default(),
            network_settings: NetworkSettings { networks },
            mounts,
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        if let Some(ref name) = filters.name {
            filter_map.insert("name".to_string(), vec![name.clone()]);
        }

        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        // Podman reports "stopping" during shutdown, which bollard fails to
        // deserialize. It is transient, so retry after a short delay.
        let mut last_error = None;
        for attempt in 0..3 {
            match self.client.list_containers(Some(opts.clone())).await {
                Ok(containers) => {
                    return Ok(containers
                        .into_iter()
                        .map(|c| {
                            let name = c
                                .names
                                .unwrap_or_default()
                                .first()
                                .map(|n| n.trim_start_matches('/').to_string())
                                .unwrap_or_default();

                            ContainerSummary {
                                id: ContainerId::new(c.id.unwrap_or_default()),
                                name,
                                image: c.image.unwrap_or_default(),
                                state: c
                                    .state
                                    .map(|s| format!("{:?}", s).to_lowercase())
                                    .unwrap_or_default(),
                                status: c.status.unwrap_or_default(),
                                labels: c.labels.unwrap_or_default(),
                            }
                        })
                        .collect());
                }
                Err(e) => {
                    let err_str = e.to_string();
                    if (err_str.contains("unknown variant `stopping`")
                        || err_str.contains("unknown variant `stopped`"))
                        && attempt < 2
                    {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        last_error = Some(err_str);
                        continue;
                    }
                    return Err(ContainerError::Runtime(err_str));
                }
            }
        }

        Err(ContainerError::Runtime(
            last_error.unwrap_or_else(|| "list_containers failed".to_string()),
        ))
    }
}

#[async_trait]
impl NetworkOps for BollardRuntime {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let opts = bollard::models::NetworkCreateRequest {
            name: config.name.clone(),
            driver: config.driver.clone(),
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            ..Default::default()
        };

        let response = self
            .client
            .create_network(opts)
            .await
            .map_err(map_network_create_error)?;

        Ok(NetworkId::new(response.id))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        match self
            .client
            .inspect_network(name, None::<InspectNetworkOptions>)
            .await
        {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(NetworkError::Runtime(e.to_string())),
        }
    }

    async fn connect_to_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
        aliases: &[NetworkAlias],
    ) -> Result<(), NetworkError> {
        let config = bollard::models::NetworkConnectRequest {
            container: container.to_string(),
            endpoint_config: Some(EndpointSettings {
                aliases: if aliases.is_empty() {
                    None
                } else {
                    Some(aliases.iter().map(|a| a.to_string()).collect())
                },
                ..Default::default()
            }),
        };

        self.client
            .connect_network(network.as_str(), config)
            .await
            .map_err(map_network_connect_error)
    }
}
