// ABOUTME: Runtime error types with SNAFU pattern.
// ABOUTME: Unifies detection and connection errors for programmatic handling.

use snafu::Snafu;

use super::detection::DetectionError;

/// Unified runtime error for detection and connection failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("runtime detection failed: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("runtime connection failed: {message}"))]
    Connection { message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// No container runtime found on the system.
    NoRuntimeFound,
    /// Failed to connect to runtime socket.
    ConnectionFailed,
}

impl RuntimeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Detection { .. } => RuntimeErrorKind::NoRuntimeFound,
            RuntimeError::Connection { .. } => RuntimeErrorKind::ConnectionFailed,
        }
    }
}

impl From<DetectionError> for RuntimeError {
    fn from(source: DetectionError) -> Self {
        RuntimeError::Detection { source }
    }
}
