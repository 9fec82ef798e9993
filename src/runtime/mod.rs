// ABOUTME: Container engine access for the deployment engine.
// ABOUTME: Capability traits, the bollard implementation, and local socket detection.

mod engine;
mod detection;
mod error;
pub mod traits;
mod types;

pub use engine::BollardRuntime;
pub use detection::{DetectionError, detect_local};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;
pub use types::{RuntimeConfig, RuntimeInfo, RuntimeType};

/// Detect the local engine and connect to it.
pub fn connect_local(config: Option<&RuntimeConfig>) -> Result<BollardRuntime, RuntimeError> {
    if config.is_none_or(RuntimeConfig::is_empty) {
        tracing::debug!("no engine override configured, probing local sockets");
    }
    let info = detect_local(config)?;
    tracing::debug!(runtime = %info.runtime_type, endpoint = %info.endpoint(), "connecting to container engine");
    BollardRuntime::connect(&info)
}
