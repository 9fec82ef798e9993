// ABOUTME: Process-wide server configuration loaded from server.config.yml.
// ABOUTME: Hot-reloadable through SharedServerConfig; every field has a default.

use super::ConfigError;
use super::deserialize::string_or_false;
use crate::runtime::{RuntimeConfig, RuntimeType};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const SERVER_CONFIG_FILENAME: &str = "server.config.yml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Shared network every deployment and the proxy attach to.
    pub exoframe_network: String,
    /// Proxy image. Empty disables proxy management.
    pub traefik_image: String,
    pub traefik_name: String,
    /// Extra labels for the proxy container.
    pub traefik_labels: BTreeMap<String, String>,
    pub traefik_disable_generated_config: bool,
    pub compress: bool,
    pub letsencrypt: bool,
    pub letsencrypt_email: String,
    /// Suffix for generated hosts, e.g. `.apps.example.com`.
    #[serde(deserialize_with = "string_or_false")]
    pub base_domain: Option<String>,
    pub autoprune: bool,
    pub debug: bool,
    #[serde(with = "humantime_serde")]
    pub cleanup_settle_delay: Duration,
    pub cleanup_max_attempts: u32,
    pub runtime: Option<RuntimeType>,
    pub socket: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            exoframe_network: "exoframe".to_string(),
            traefik_image: "traefik:v2.11".to_string(),
            traefik_name: "exoframe-traefik".to_string(),
            traefik_labels: BTreeMap::new(),
            traefik_disable_generated_config: false,
            compress: true,
            letsencrypt: false,
            letsencrypt_email: "admin@example.com".to_string(),
            base_domain: None,
            autoprune: false,
            debug: false,
            cleanup_settle_delay: Duration::from_secs(10),
            cleanup_max_attempts: 60,
            runtime: None,
            socket: None,
        }
    }
}

impl ServerConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(ConfigError::from)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_yaml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no server config, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Default location inside the config directory.
    pub fn default_path() -> PathBuf {
        super::config_dir().join(SERVER_CONFIG_FILENAME)
    }

    /// Proxy management is on when an image is configured.
    pub fn proxy_enabled(&self) -> bool {
        !self.traefik_image.trim().is_empty()
    }

    /// Convert to RuntimeConfig for engine detection.
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            runtime: self.runtime,
            socket: self.socket.clone(),
        }
    }
}

/// Hot-reloadable handle to the server config.
///
/// Readers take a snapshot per deploy, so a reload never changes a deploy
/// that is already running.
#[derive(Debug, Clone, Default)]
pub struct SharedServerConfig {
    inner: Arc<RwLock<ServerConfig>>,
}

impl SharedServerConfig {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn snapshot(&self) -> ServerConfig {
        self.inner.read().clone()
    }

    pub fn replace(&self, config: ServerConfig) {
        *self.inner.write() = config;
    }

    /// Re-read `path` and swap in the result. On error the current config
    /// stays in place.
    pub fn reload(&self, path: &Path) -> Result<(), ConfigError> {
        let config = ServerConfig::load(path)?;
        tracing::info!(path = %path.display(), "server config reloaded");
        self.replace(config);
        Ok(())
    }
}
