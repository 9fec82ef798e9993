// ABOUTME: Reverse-proxy bootstrap: keeps the traefik container running with current config.
// ABOUTME: Regenerates its config file, then restarts, recreates or creates the container.

mod config;

pub use config::{ACME_STORAGE, DOCKER_ENDPOINT, generate, merge};

use crate::config::{ConfigError, ServerConfig};
use crate::launch::ensure_network;
use crate::runtime::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerOps, ContainerState, ImageError,
    MountKind, NetworkError, PortMapping, RestartPolicyConfig, Runtime, VolumeMount,
};
use crate::types::ContainerId;
use std::path::{Path, PathBuf};

pub const PROXY_DIR: &str = "traefik";
pub const GENERATED_CONFIG: &str = "traefik.yml";
pub const CUSTOM_CONFIG: &str = "traefik.custom.yml";
pub const ACME_DIR: &str = "acme";

const DOCKER_SOCKET: &str = "/var/run/docker.sock";

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("proxy container error: {0}")]
    Container(#[from] ContainerError),

    #[error("proxy image error: {0}")]
    Image(#[from] ImageError),

    #[error("proxy network error: {0}")]
    Network(#[from] NetworkError),

    #[error("proxy config error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for ProxyError {
    fn from(err: serde_yaml::Error) -> Self {
        ProxyError::Config(err.into())
    }
}

/// What a bootstrap run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyOutcome {
    /// No proxy image configured.
    Disabled,
    /// Existing running container restarted to pick up config.
    Restarted,
    /// New container created and started.
    Created,
}

/// Where proxy files live, as seen by this process and by the engine host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPaths {
    /// Directory this process writes to.
    pub local: PathBuf,
    /// The same directory on the engine host, used for bind mounts.
    pub host: PathBuf,
}

impl ProxyPaths {
    /// Paths when running directly on the host.
    pub fn on_host(config_dir: &Path) -> Self {
        let dir = config_dir.join(PROXY_DIR);
        Self {
            local: dir.clone(),
            host: dir,
        }
    }

    /// Work out the host side of `config_dir`.
    ///
    /// When this process runs in a container (its hostname is a container
    /// id the engine knows), the mount targeting `config_dir` gives the host
    /// path. Otherwise both sides are the same.
    pub async fn detect<C: ContainerOps + ?Sized>(containers: &C, config_dir: &Path) -> Self {
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();
        let mut paths = Self::on_host(config_dir);

        let Ok(info) = containers.inspect_container(&ContainerId::new(&hostname)).await else {
            return paths;
        };
        let wanted = config_dir.to_string_lossy();
        let wanted = wanted.trim_end_matches('/');
        if let Some(mount) = info
            .mounts
            .iter()
            .find(|m| m.destination.trim_end_matches('/') == wanted)
        {
            tracing::debug!(host = %mount.source, "config dir is a container mount");
            paths.host = PathBuf::from(&mount.source).join(PROXY_DIR);
        }
        paths
    }

    pub fn generated_config(&self) -> PathBuf {
        self.local.join(GENERATED_CONFIG)
    }

    pub fn custom_config(&self) -> PathBuf {
        self.local.join(CUSTOM_CONFIG)
    }
}

/// Regenerate `traefik.yml`, merging the user override file on top.
pub async fn write_config(server: &ServerConfig, paths: &ProxyPaths) -> Result<(), ProxyError> {
    tokio::fs::create_dir_all(paths.local.join(ACME_DIR)).await?;
    if server.traefik_disable_generated_config {
        tracing::debug!("generated proxy config disabled");
        return Ok(());
    }

    let mut config = generate(server)?;
    match tokio::fs::read_to_string(paths.custom_config()).await {
        Ok(custom) => {
            let overrides: serde_yaml::Value = serde_yaml::from_str(&custom)?;
            config = merge(config, overrides);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let yaml = serde_yaml::to_string(&config)?;
    tokio::fs::write(paths.generated_config(), yaml).await?;
    Ok(())
}

fn proxy_container_config(server: &ServerConfig, paths: &ProxyPaths) -> ContainerConfig {
    let bind = |source: String, target: &str| VolumeMount {
        source,
        target: target.to_string(),
        kind: MountKind::Bind,
    };

    ContainerConfig {
        name: server.traefik_name.clone(),
        image: server.traefik_image.clone(),
        env: Vec::new(),
        labels: server.traefik_labels.clone(),
        ports: vec![
            PortMapping {
                host_port: 80,
                container_port: 80,
            },
            PortMapping {
                host_port: 443,
                container_port: 443,
            },
        ],
        volumes: vec![
            bind(DOCKER_SOCKET.to_string(), DOCKER_SOCKET),
            bind(paths.host.to_string_lossy().into_owned(), "/etc/traefik"),
            bind(
                paths.host.join(ACME_DIR).to_string_lossy().into_owned(),
                "/var/acme",
            ),
        ],
        restart_policy: RestartPolicyConfig::Always,
        network: Some(server.exoframe_network.clone()),
        network_aliases: Vec::new(),
    }
}

/// Ensure the proxy runs with config matching `server`.
///
/// Idempotent: a running proxy is restarted in place, a stopped one is
/// replaced, a missing one is created. Calling it twice never yields two
/// proxy containers.
pub async fn ensure_proxy_running(
    runtime: &dyn Runtime,
    server: &ServerConfig,
    paths: &ProxyPaths,
) -> Result<ProxyOutcome, ProxyError> {
    if !server.proxy_enabled() {
        tracing::debug!("proxy management disabled");
        return Ok(ProxyOutcome::Disabled);
    }

    write_config(server, paths).await?;

    let filters = ContainerFilters {
        name: Some(server.traefik_name.clone()),
        all: true,
        ..Default::default()
    };
    let existing = runtime
        .list_containers(&filters)
        .await?
        .into_iter()
        .find(|c| c.name == server.traefik_name);

    if let Some(container) = existing {
        if matches!(
            ContainerState::parse(&container.state),
            Some(ContainerState::Running | ContainerState::Restarting)
        ) {
            tracing::info!(name = %container.name, state = %container.state, "restarting proxy");
            runtime.restart_container(&container.id).await?;
            return Ok(ProxyOutcome::Restarted);
        }
        tracing::info!(name = %container.name, state = %container.state, "removing stopped proxy");
        match runtime.remove_container(&container.id, true).await {
            Ok(()) | Err(ContainerError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    ensure_network(runtime, &server.exoframe_network).await?;

    if !runtime.image_exists(&server.traefik_image).await? {
        tracing::info!(image = %server.traefik_image, "pulling proxy image");
        runtime.pull_image(&server.traefik_image).await?;
    }

    let id = runtime
        .create_container(&proxy_container_config(server, paths))
        .await?;
    runtime.start_container(&id).await?;
    tracing::info!(name = %server.traefik_name, "proxy started");
    Ok(ProxyOutcome::Created)
}
