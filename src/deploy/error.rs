// ABOUTME: Error types for deploy orchestration.
// ABOUTME: Config, template, build, launch, plugin and compose failures.

use crate::build::BuildError;
use crate::config::ConfigError;
use crate::launch::LaunchError;
use crate::plugins::PluginError;
use crate::runtime::{ContainerError, ImageError, NetworkError};

/// Errors that end a deploy attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Manifest missing, unparsable or without a name.
    #[error("invalid project config: {0}")]
    ConfigInvalid(#[from] ConfigError),

    /// Explicit template not installed, or nothing matched the project.
    #[error("{}", template_not_found(.name.as_deref()))]
    TemplateNotFound { name: Option<String> },

    /// The image build reported an error.
    #[error("build failed: {message}")]
    BuildFailed { message: String, log: Vec<String> },

    #[error(transparent)]
    LaunchFailed(#[from] LaunchError),

    /// Pulling or loading the image for an image deployment failed.
    #[error("image error: {0}")]
    Image(#[from] ImageError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// `docker compose` exited unsuccessfully.
    #[error("compose failed: {message}")]
    Compose { message: String, log: Vec<String> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn template_not_found(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("template not found: {}", name),
        None => "no deployment template matches this project".to_string(),
    }
}

impl DeployError {
    /// Build or compose output collected before the failure.
    pub fn log(&self) -> Vec<String> {
        match self {
            DeployError::BuildFailed { log, .. } | DeployError::Compose { log, .. } => log.clone(),
            _ => Vec::new(),
        }
    }
}

impl From<BuildError> for DeployError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Archive(e) => DeployError::Io(e),
            BuildError::Failed { message, log, .. } => DeployError::BuildFailed { message, log },
        }
    }
}

impl From<ContainerError> for DeployError {
    fn from(err: ContainerError) -> Self {
        DeployError::LaunchFailed(err.into())
    }
}

impl From<NetworkError> for DeployError {
    fn from(err: NetworkError) -> Self {
        DeployError::LaunchFailed(err.into())
    }
}
