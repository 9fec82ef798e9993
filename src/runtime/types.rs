// ABOUTME: Engine flavours and the socket the deployment engine talks to.
// ABOUTME: RuntimeConfig carries the server config override for detection.

use serde::{Deserialize, Serialize};

/// Which engine answers on the socket. Both speak the Docker API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl RuntimeType {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeType::Docker => "docker",
            RuntimeType::Podman => "podman",
        }
    }
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of socket detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub runtime_type: RuntimeType,
    /// Filesystem path of the unix socket.
    pub socket_path: String,
}

impl RuntimeInfo {
    /// Socket as a `unix://` endpoint, the form engine clients log and accept.
    pub fn endpoint(&self) -> String {
        format!("unix://{}", self.socket_path)
    }
}

/// Detection override from the server config. Unset fields fall back to probing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuntimeConfig {
    pub runtime: Option<RuntimeType>,
    pub socket: Option<String>,
}

impl RuntimeConfig {
    pub fn is_empty(&self) -> bool {
        self.runtime.is_none() && self.socket.is_none()
    }
}
