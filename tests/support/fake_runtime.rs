// ABOUTME: In-memory container engine implementing the runtime traits.
// ABOUTME: Scripted build output, container states and removal failures for tests.

use async_trait::async_trait;
use exoframe::runtime::{
    BuildOptions, BuildOutputStream, ContainerConfig, ContainerError, ContainerFilters,
    ContainerInfo, ContainerOps, ContainerState, ContainerSummary, ImageError, ImageOps,
    MountPoint, NetworkConfig, NetworkError, NetworkInfo, NetworkOps, NetworkSettings,
    PruneReport,
};
use exoframe::types::{ContainerId, NetworkAlias, NetworkId};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// A container held by the fake engine.
#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
    pub labels: HashMap<String, String>,
    pub config: ContainerConfig,
    pub restarts: u32,
}

/// How a scripted removal fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveFailure {
    /// The engine says the container is already gone, and it is.
    NotFound,
    /// Any other engine error; the container stays.
    Other,
}

#[derive(Default)]
struct State {
    next_id: u64,
    containers: Vec<FakeContainer>,
    networks: BTreeSet<String>,
    images: BTreeSet<String>,
    image_ports: HashMap<String, Vec<u16>>,
    build_output: Vec<String>,
    builds: Vec<BuildOptions>,
    build_contexts: Vec<usize>,
    pulls: Vec<String>,
    loads: usize,
    prunes: usize,
    removed: Vec<String>,
    remove_failures: HashMap<String, RemoveFailure>,
    start_status: Option<(String, String)>,
    pulls_fail: bool,
}

/// In-memory engine. Containers start as `running`/`Up` unless told otherwise.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<State>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(self, reference: &str) -> Self {
        self.state.lock().images.insert(reference.to_string());
        self
    }

    pub fn with_image_ports(self, reference: &str, ports: &[u16]) -> Self {
        self.state
            .lock()
            .image_ports
            .insert(reference.to_string(), ports.to_vec());
        self
    }

    pub fn with_network(self, name: &str) -> Self {
        self.state.lock().networks.insert(name.to_string());
        self
    }

    /// Fragments every build will stream, as raw JSON strings.
    pub fn script_build(&self, fragments: &[&str]) {
        self.state.lock().build_output = fragments.iter().map(|f| f.to_string()).collect();
    }

    /// State and status given to containers when they start.
    pub fn start_as(&self, state: &str, status: &str) {
        self.state.lock().start_status = Some((state.to_string(), status.to_string()));
    }

    pub fn add_container(
        &self,
        id: &str,
        name: &str,
        labels: &[(&str, &str)],
        state: &str,
        status: &str,
    ) {
        let labels: HashMap<String, String> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.state.lock().containers.push(FakeContainer {
            id: id.to_string(),
            name: name.to_string(),
            image: "seeded".to_string(),
            state: state.to_string(),
            status: status.to_string(),
            labels,
            config: ContainerConfig {
                name: name.to_string(),
                ..Default::default()
            },
            restarts: 0,
        });
    }

    pub fn set_status(&self, id: &str, state: &str, status: &str) {
        let mut s = self.state.lock();
        if let Some(c) = s.containers.iter_mut().find(|c| c.id == id) {
            c.state = state.to_string();
            c.status = status.to_string();
        }
    }

    /// Make every image pull fail, as with an unreachable registry.
    pub fn fail_pulls(&self) {
        self.state.lock().pulls_fail = true;
    }

    pub fn fail_remove(&self, id: &str, failure: RemoveFailure) {
        self.state
            .lock()
            .remove_failures
            .insert(id.to_string(), failure);
    }

    pub fn containers(&self) -> Vec<FakeContainer> {
        self.state.lock().containers.clone()
    }

    pub fn container_named(&self, name: &str) -> Option<FakeContainer> {
        self.containers().into_iter().find(|c| c.name == name)
    }

    pub fn has_container(&self, id: &str) -> bool {
        self.state.lock().containers.iter().any(|c| c.id == id)
    }

    pub fn removed(&self) -> Vec<String> {
        self.state.lock().removed.clone()
    }

    pub fn builds(&self) -> Vec<BuildOptions> {
        self.state.lock().builds.clone()
    }

    pub fn build_context_sizes(&self) -> Vec<usize> {
        self.state.lock().build_contexts.clone()
    }

    pub fn pulls(&self) -> Vec<String> {
        self.state.lock().pulls.clone()
    }

    pub fn loads(&self) -> usize {
        self.state.lock().loads
    }

    pub fn prunes(&self) -> usize {
        self.state.lock().prunes
    }

    pub fn networks(&self) -> Vec<String> {
        self.state.lock().networks.iter().cloned().collect()
    }

    fn summary(c: &FakeContainer) -> ContainerSummary {
        ContainerSummary {
            id: ContainerId::new(c.id.clone()),
            name: c.name.clone(),
            image: c.image.clone(),
            state: c.state.clone(),
            status: c.status.clone(),
            labels: c.labels.clone(),
        }
    }

    fn not_found(id: &ContainerId) -> ContainerError {
        ContainerError::NotFound(id.to_string())
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let mut s = self.state.lock();
        if s.containers.iter().any(|c| c.name == config.name) {
            return Err(ContainerError::AlreadyExists(config.name.clone()));
        }
        if let Some(network) = &config.network
            && !s.networks.contains(network)
        {
            return Err(ContainerError::Runtime(format!(
                "network {} not found",
                network
            )));
        }
        s.next_id += 1;
        let id = format!("fake{:04}", s.next_id);
        s.containers.push(FakeContainer {
            id: id.clone(),
            name: config.name.clone(),
            image: config.image.clone(),
            state: "created".to_string(),
            status: "Created".to_string(),
            labels: config.labels.clone().into_iter().collect(),
            config: config.clone(),
            restarts: 0,
        });
        Ok(ContainerId::new(id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut s = self.state.lock();
        let (state, status) = s
            .start_status
            .clone()
            .unwrap_or_else(|| ("running".to_string(), "Up Less than a second".to_string()));
        let c = s
            .containers
            .iter_mut()
            .find(|c| c.id == id.as_str())
            .ok_or_else(|| Self::not_found(id))?;
        c.state = state;
        c.status = status;
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let mut s = self.state.lock();
        let c = s
            .containers
            .iter_mut()
            .find(|c| c.id == id.as_str())
            .ok_or_else(|| Self::not_found(id))?;
        c.state = "exited".to_string();
        c.status = "Exited (0) Less than a second ago".to_string();
        Ok(())
    }

    async fn restart_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut s = self.state.lock();
        let c = s
            .containers
            .iter_mut()
            .find(|c| c.id == id.as_str())
            .ok_or_else(|| Self::not_found(id))?;
        c.state = "running".to_string();
        c.status = "Up Less than a second".to_string();
        c.restarts += 1;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> Result<(), ContainerError> {
        let mut s = self.state.lock();
        match s.remove_failures.get(id.as_str()).copied() {
            Some(RemoveFailure::Other) => {
                return Err(ContainerError::Runtime(format!(
                    "cannot remove {}: device busy",
                    id
                )));
            }
            Some(RemoveFailure::NotFound) => {
                s.containers.retain(|c| c.id != id.as_str());
                return Err(Self::not_found(id));
            }
            None => {}
        }
        let before = s.containers.len();
        s.containers.retain(|c| c.id != id.as_str());
        if s.containers.len() == before {
            return Err(Self::not_found(id));
        }
        s.removed.push(id.to_string());
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let s = self.state.lock();
        let c = s
            .containers
            .iter()
            .find(|c| c.id == id.as_str())
            .ok_or_else(|| Self::not_found(id))?;

        let mut networks = HashMap::new();
        if let Some(network) = &c.config.network {
            networks.insert(
                network.clone(),
                NetworkInfo {
                    network_id: network.clone(),
                    ip_address: "172.20.0.2".to_string(),
                    aliases: c
                        .config
                        .network_aliases
                        .iter()
                        .map(|a| a.to_string())
                        .collect(),
                },
            );
        }

        Ok(ContainerInfo {
            id: ContainerId::new(c.id.clone()),
            name: c.name.clone(),
            image: c.image.clone(),
            state: ContainerState::parse(&c.state).unwrap_or(ContainerState::Created),
            labels: c.labels.clone(),
            network_settings: NetworkSettings { networks },
            mounts: c
                .config
                .volumes
                .iter()
                .map(|v| MountPoint {
                    source: v.source.clone(),
                    destination: v.target.clone(),
                })
                .collect(),
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let s = self.state.lock();
        Ok(s.containers
            .iter()
            .filter(|c| filters.all || c.state == "running")
            .filter(|c| {
                filters
                    .name
                    .as_ref()
                    .is_none_or(|n| c.name.contains(n.as_str()))
            })
            .filter(|c| {
                filters
                    .labels
                    .iter()
                    .all(|(k, v)| c.labels.get(k) == Some(v))
            })
            .map(Self::summary)
            .collect())
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn pull_image(&self, reference: &str) -> Result<(), ImageError> {
        let mut s = self.state.lock();
        s.pulls.push(reference.to_string());
        if s.pulls_fail {
            return Err(ImageError::PullFailed(format!("{}: registry unreachable", reference)));
        }
        s.images.insert(reference.to_string());
        Ok(())
    }

    async fn image_exists(&self, reference: &str) -> Result<bool, ImageError> {
        Ok(self.state.lock().images.contains(reference))
    }

    async fn image_exposed_ports(&self, reference: &str) -> Result<Vec<u16>, ImageError> {
        let s = self.state.lock();
        if !s.images.contains(reference) && !s.image_ports.contains_key(reference) {
            return Err(ImageError::NotFound(reference.to_string()));
        }
        Ok(s.image_ports.get(reference).cloned().unwrap_or_default())
    }

    fn build_image(&self, context: Vec<u8>, options: &BuildOptions) -> BuildOutputStream<'_> {
        let mut s = self.state.lock();
        s.builds.push(options.clone());
        s.build_contexts.push(context.len());
        let output = s.build_output.clone();
        if !output.iter().any(|f| f.contains("\"error\"")) {
            s.images.insert(options.tag.clone());
        }
        Box::pin(futures::stream::iter(output.into_iter().map(Ok)))
    }

    async fn load_image(&self, archive: Vec<u8>) -> Result<(), ImageError> {
        if archive.is_empty() {
            return Err(ImageError::LoadFailed("empty archive".to_string()));
        }
        self.state.lock().loads += 1;
        Ok(())
    }

    async fn prune(&self) -> Result<PruneReport, ImageError> {
        self.state.lock().prunes += 1;
        Ok(PruneReport {
            images_deleted: 2,
            volumes_deleted: 1,
            space_reclaimed: 1024,
        })
    }
}

#[async_trait]
impl NetworkOps for FakeRuntime {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let mut s = self.state.lock();
        if !s.networks.insert(config.name.clone()) {
            return Err(NetworkError::AlreadyExists(config.name.clone()));
        }
        Ok(NetworkId::new(config.name.clone()))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        Ok(self.state.lock().networks.contains(name))
    }

    async fn connect_to_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
        _aliases: &[NetworkAlias],
    ) -> Result<(), NetworkError> {
        let s = self.state.lock();
        if !s.networks.contains(network.as_str()) {
            return Err(NetworkError::NotFound(network.to_string()));
        }
        if !s.containers.iter().any(|c| c.id == container.as_str()) {
            return Err(NetworkError::Runtime(format!("no such container {}", container)));
        }
        Ok(())
    }
}
