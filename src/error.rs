// ABOUTME: Application-wide error type for the exoframe binary.
// ABOUTME: Wraps the per-layer errors with thiserror.

use crate::config::ConfigError;
use crate::deploy::DeployError;
use crate::proxy::ProxyError;
use crate::runtime::{ContainerError, RuntimeError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("project directory not found: {0}")]
    ProjectNotFound(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("deploy failed")]
    DeployFailed,

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("container engine error: {0}")]
    Container(#[from] ContainerError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
