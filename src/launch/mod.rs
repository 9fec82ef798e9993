// ABOUTME: Container launcher: turns project + server config into a container spec and runs it.
// ABOUTME: Handles env, identity/routing labels, mounts, restart policy and the shared network.

mod env;
mod record;
pub mod routing;

pub use env::{ENV_DEPLOYMENT, ENV_HOST, ENV_PROJECT, ENV_USER, Identity, build_env};
pub use record::DeploymentRecord;
pub use routing::{RoutingInput, RoutingRules};

use crate::config::{ProjectConfig, RestartPolicy, ServerConfig};
use crate::diagnostics::{Diagnostics, Warning};
use crate::plugins::{PluginError, PluginRegistry, StartContext};
use crate::runtime::{
    ContainerConfig, ContainerError, ImageOps, NetworkConfig, NetworkError, NetworkOps, Runtime,
    VolumeMount,
};
use crate::secrets::Secret;
use crate::types::{DeploymentName, NetworkAlias, NetworkId};
use std::collections::{BTreeMap, HashMap};

pub const LABEL_DEPLOYMENT: &str = "exoframe.deployment";
pub const LABEL_USER: &str = "exoframe.user";
pub const LABEL_PROJECT: &str = "exoframe.project";

/// Port routed to when neither the config nor the image names one.
pub const DEFAULT_PORT: u16 = 80;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("container launch failed: {0}")]
    Container(#[from] ContainerError),

    #[error("network setup failed: {0}")]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// Everything needed to run one deployment container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub name: DeploymentName,
    pub env: Vec<String>,
    /// User labels plus identity labels.
    pub labels: BTreeMap<String, String>,
    pub routing: RoutingRules,
    pub restart: RestartPolicy,
    pub volumes: Vec<VolumeMount>,
    pub network: String,
    pub alias: Option<NetworkAlias>,
}

impl ContainerSpec {
    /// Labels as applied to the container; routing labels win on conflict.
    pub fn all_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.labels.clone();
        labels.extend(self.routing.to_labels());
        labels
    }

    pub fn to_container_config(&self) -> ContainerConfig {
        ContainerConfig {
            name: self.name.to_string(),
            image: self.image.clone(),
            env: self.env.clone(),
            labels: self.all_labels(),
            ports: Vec::new(),
            volumes: self.volumes.clone(),
            restart_policy: self.restart.to_runtime(),
            network: Some(self.network.clone()),
            network_aliases: self.alias.iter().cloned().collect(),
        }
    }
}

/// Inputs for one launch.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    pub image: &'a str,
    pub config: &'a ProjectConfig,
    pub server: &'a ServerConfig,
    pub username: &'a str,
    pub secrets: &'a [Secret],
}

/// Identity labels every deployment carries.
pub fn identity_labels(name: &str, username: &str, project: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_DEPLOYMENT.to_string(), name.to_string()),
        (LABEL_USER.to_string(), username.to_string()),
        (LABEL_PROJECT.to_string(), project.to_string()),
    ])
}

async fn resolve_port<I: ImageOps + ?Sized>(
    images: &I,
    image: &str,
    config: &ProjectConfig,
    diagnostics: &mut Diagnostics,
) -> u16 {
    if let Some(port) = config.port {
        return port;
    }
    match images.image_exposed_ports(image).await {
        Ok(ports) => ports.first().copied().unwrap_or(DEFAULT_PORT),
        Err(e) => {
            diagnostics.warn(Warning::port_introspection(format!(
                "could not read exposed ports of {}: {}; routing to port {}",
                image, e, DEFAULT_PORT
            )));
            DEFAULT_PORT
        }
    }
}

/// Assemble the container spec. Only image inspection touches the engine.
pub async fn assemble<I: ImageOps + ?Sized>(
    images: &I,
    req: &LaunchRequest<'_>,
    diagnostics: &mut Diagnostics,
) -> ContainerSpec {
    let config = req.config;
    let server = req.server;
    let project = config.project_name();
    let name = DeploymentName::generate(req.username, &config.name);
    let host = config.routing_host(server);

    let port = match &host {
        Some(_) => Some(resolve_port(images, req.image, config, diagnostics).await),
        None => None,
    };

    let routing = RoutingRules::build(&RoutingInput {
        name: name.as_str(),
        network: &server.exoframe_network,
        host: host.as_deref().zip(port),
        letsencrypt: config.letsencrypt_enabled(server),
        compress: config.compress_enabled(server),
        rate_limit: config.rate_limit.as_ref(),
        basic_auth: config.basic_auth.as_deref(),
        extra_middlewares: &config.middlewares,
    });

    let env = build_env(
        &config.env,
        req.secrets,
        Identity {
            deployment: name.as_str(),
            username: req.username,
            project,
            host: host.as_deref(),
        },
    );

    let mut labels = config.labels.clone();
    labels.extend(identity_labels(name.as_str(), req.username, project));

    let volumes = config
        .volumes
        .iter()
        .filter_map(|v| {
            let mount = VolumeMount::parse(v);
            if mount.is_none() {
                diagnostics.warn(Warning::invalid_volume(v));
            }
            mount
        })
        .collect();

    let alias = config
        .hostname
        .as_deref()
        .filter(|h| !h.trim().is_empty())
        .and_then(|h| match NetworkAlias::new(h) {
            Ok(alias) => Some(alias),
            Err(e) => {
                diagnostics.warn(Warning::invalid_hostname(h, e));
                None
            }
        });

    ContainerSpec {
        image: req.image.to_string(),
        name,
        env,
        labels,
        routing,
        restart: config.restart,
        volumes,
        network: server.exoframe_network.clone(),
        alias,
    }
}

/// Make sure the shared network exists, creating it if needed.
///
/// Losing a creation race to another deploy is fine: the network is looked up
/// by name, never by a held id.
pub async fn ensure_network<N: NetworkOps + ?Sized>(
    network: &N,
    name: &str,
) -> Result<NetworkId, NetworkError> {
    if network.network_exists(name).await? {
        return Ok(NetworkId::new(name));
    }

    let config = NetworkConfig {
        name: name.to_string(),
        driver: Some("bridge".to_string()),
        labels: HashMap::new(),
    };

    match network.create_network(&config).await {
        Ok(_) => {
            tracing::info!(network = name, "created shared network");
            Ok(NetworkId::new(name))
        }
        Err(NetworkError::AlreadyExists(_)) => Ok(NetworkId::new(name)),
        Err(e) => Err(e),
    }
}

/// Launch a deployment container and return its inspected state.
///
/// Installed plugins see the assembled spec first; an exclusive plugin that
/// returns a record replaces the default create/start path.
pub async fn launch(
    runtime: &dyn Runtime,
    plugins: &PluginRegistry,
    req: &LaunchRequest<'_>,
    diagnostics: &mut Diagnostics,
) -> Result<DeploymentRecord, LaunchError> {
    let spec = assemble(runtime, req, diagnostics).await;

    let ctx = StartContext {
        spec: &spec,
        config: req.config,
        server: req.server,
        username: req.username,
        runtime,
    };
    if let Some(record) = plugins.start(&ctx).await? {
        return Ok(record);
    }

    ensure_network(runtime, &spec.network).await?;

    let container_config = spec.to_container_config();
    let id = runtime.create_container(&container_config).await?;
    tracing::debug!(name = %spec.name, id = %id, "container created");

    runtime.start_container(&id).await?;
    let info = runtime.inspect_container(&id).await?;
    tracing::info!(name = %spec.name, image = %spec.image, "deployment started");

    Ok(info.into())
}
