// ABOUTME: Configuration types and parsing for exoframe.json and server.config.yml.
// ABOUTME: Project manifests are JSON, the server config is YAML and hot-reloadable.

mod deserialize;
mod restart_policy;
mod server;

pub use restart_policy::RestartPolicy;
pub use server::{SERVER_CONFIG_FILENAME, ServerConfig, SharedServerConfig};

use crate::types::kebab_case;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "exoframe.json";
pub const CONFIG_DIR_ENV: &str = "EXOFRAME_CONFIG_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("project config not found: {0}")]
    NotFound(PathBuf),

    #[error("project config is missing a name")]
    MissingName,

    #[error("{0}")]
    Invalid(String),

    #[error("invalid project config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid server config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory holding server config, proxy config and installed extensions.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".config").join("exoframe")
}

/// Per-project manifest.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default)]
    pub name: String,

    /// Routing domain; `false` disables routing.
    #[serde(default)]
    pub domain: DomainSetting,

    /// Alias on the shared network.
    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub project: Option<String>,

    #[serde(default, deserialize_with = "deserialize::lenient_port")]
    pub port: Option<u16>,

    #[serde(default, deserialize_with = "deserialize::ordered_string_map")]
    pub env: Vec<(String, String)>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub volumes: Vec<String>,

    #[serde(default)]
    pub rate_limit: Option<RateLimit>,

    /// Pre-hashed `user:hash` credential string.
    #[serde(default)]
    pub basic_auth: Option<String>,

    #[serde(default)]
    pub restart: RestartPolicy,

    #[serde(default)]
    pub template: Option<String>,

    #[serde(default)]
    pub compress: Option<bool>,

    #[serde(default)]
    pub letsencrypt: Option<bool>,

    #[serde(default)]
    pub middlewares: Vec<String>,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub image_file: Option<String>,

    #[serde(default, deserialize_with = "deserialize::ordered_string_map")]
    pub buildargs: Vec<(String, String)>,
}

/// The manifest `domain` field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DomainSetting {
    /// Not written; the server base domain applies.
    #[default]
    Unset,
    /// `false`: never route this project.
    Disabled,
    Host(String),
}

impl<'de> Deserialize<'de> for DomainSetting {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Host(String),
            Flag(bool),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(DomainSetting::Unset),
            Some(Raw::Flag(false)) => Ok(DomainSetting::Disabled),
            Some(Raw::Flag(true)) => Err(serde::de::Error::custom(
                "domain must be a host name or false",
            )),
            Some(Raw::Host(h)) if h.trim().is_empty() => Ok(DomainSetting::Unset),
            Some(Raw::Host(h)) => Ok(DomainSetting::Host(h.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    #[serde(default = "default_rate_period")]
    pub period: String,
    #[serde(default = "default_rate_average")]
    pub average: u32,
    #[serde(default = "default_rate_burst")]
    pub burst: u32,
}

fn default_rate_period() -> String {
    "1s".to_string()
}

fn default_rate_average() -> u32 {
    1
}

fn default_rate_burst() -> u32 {
    5
}

impl ProjectConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ProjectConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json(&content)
    }

    /// Load the manifest from a project working directory.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        Self::load(&dir.join(CONFIG_FILENAME))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }
        Ok(())
    }

    /// Grouping key; the name unless `project` is set.
    pub fn project_name(&self) -> &str {
        self.project
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.name)
    }

    pub fn letsencrypt_enabled(&self, server: &ServerConfig) -> bool {
        server.letsencrypt && self.letsencrypt != Some(false)
    }

    pub fn compress_enabled(&self, server: &ServerConfig) -> bool {
        server.compress || self.compress == Some(true)
    }

    /// Host to route to: the explicit domain, else the kebab-cased name
    /// under the server base domain.
    pub fn routing_host(&self, server: &ServerConfig) -> Option<String> {
        match &self.domain {
            DomainSetting::Host(host) => Some(host.clone()),
            DomainSetting::Disabled => None,
            DomainSetting::Unset => server
                .base_domain
                .as_ref()
                .map(|base| format!("{}{}", kebab_case(&self.name), base)),
        }
    }
}
