// ABOUTME: Container engine socket detection on the local host.
// ABOUTME: Honors an explicit override, else checks Podman sockets first, then Docker.

use super::types::{RuntimeConfig, RuntimeInfo, RuntimeType};
use std::path::Path;

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,
}

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Detect the container engine to talk to.
///
/// Explicit values in `config` take precedence. Otherwise the order is:
/// 1. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
pub fn detect_local(config: Option<&RuntimeConfig>) -> Result<RuntimeInfo, DetectionError> {
    detect_with(config, get_uid().as_deref(), |path| Path::new(path).exists())
}

fn detect_with(
    config: Option<&RuntimeConfig>,
    uid: Option<&str>,
    socket_exists: impl Fn(&str) -> bool,
) -> Result<RuntimeInfo, DetectionError> {
    if let Some(cfg) = config {
        if let Some(runtime_type) = cfg.runtime {
            let socket_path = cfg
                .socket
                .clone()
                .unwrap_or_else(|| default_socket_path(runtime_type).to_string());
            return Ok(RuntimeInfo {
                runtime_type,
                socket_path,
            });
        }
        if let Some(socket) = &cfg.socket {
            let runtime_type = if socket.contains("podman") {
                RuntimeType::Podman
            } else {
                RuntimeType::Docker
            };
            return Ok(RuntimeInfo {
                runtime_type,
                socket_path: socket.clone(),
            });
        }
    }

    if let Some(uid) = uid {
        let rootless_socket = format!("/run/user/{}/podman/podman.sock", uid);
        if socket_exists(&rootless_socket) {
            return Ok(RuntimeInfo {
                runtime_type: RuntimeType::Podman,
                socket_path: rootless_socket,
            });
        }
    }

    if socket_exists(ROOTFUL_PODMAN) {
        return Ok(RuntimeInfo {
            runtime_type: RuntimeType::Podman,
            socket_path: ROOTFUL_PODMAN.to_string(),
        });
    }

    if socket_exists(DOCKER_SOCKET) {
        return Ok(RuntimeInfo {
            runtime_type: RuntimeType::Docker,
            socket_path: DOCKER_SOCKET.to_string(),
        });
    }

    Err(DetectionError::NoRuntimeFound)
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

fn default_socket_path(runtime: RuntimeType) -> &'static str {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET,
        RuntimeType::Podman => ROOTFUL_PODMAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_runtime_wins() {
        let cfg = RuntimeConfig {
            runtime: Some(RuntimeType::Docker),
            socket: None,
        };
        let info = detect_with(Some(&cfg), Some("1000"), |_| true).unwrap();
        assert_eq!(info.runtime_type, RuntimeType::Docker);
        assert_eq!(info.socket_path, DOCKER_SOCKET);
    }

    #[test]
    fn explicit_socket_infers_type() {
        let cfg = RuntimeConfig {
            runtime: None,
            socket: Some("/tmp/podman.sock".to_string()),
        };
        let info = detect_with(Some(&cfg), None, |_| false).unwrap();
        assert_eq!(info.runtime_type, RuntimeType::Podman);
    }

    #[test]
    fn rootless_podman_first() {
        let info = detect_with(None, Some("1000"), |_| true).unwrap();
        assert_eq!(info.socket_path, "/run/user/1000/podman/podman.sock");
    }

    #[test]
    fn falls_back_to_docker() {
        let info = detect_with(None, Some("1000"), |p| p == DOCKER_SOCKET).unwrap();
        assert_eq!(info.runtime_type, RuntimeType::Docker);
    }

    #[test]
    fn nothing_found() {
        assert!(matches!(
            detect_with(None, None, |_| false),
            Err(DetectionError::NoRuntimeFound)
        ));
    }
}
