// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Pull, inspect, build, load and prune container images.

use super::shared_types::{BuildOptions, PruneReport};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of raw build output fragments, one JSON document per item.
///
/// Borrows the runtime that produced it.
pub type BuildOutputStream<'a> =
    Pin<Box<dyn Stream<Item = Result<String, ImageError>> + Send + 'a>>;

/// Image operations.
#[async_trait]
pub trait ImageOps: Send + Sync {
    /// Pull an image by tag.
    async fn pull_image(&self, reference: &str) -> Result<(), ImageError>;

    /// Check if an image exists locally.
    async fn image_exists(&self, reference: &str) -> Result<bool, ImageError>;

    /// Container ports the image declares as exposed, ascending.
    async fn image_exposed_ports(&self, reference: &str) -> Result<Vec<u16>, ImageError>;

    /// Build an image from a tar archive of the build context.
    ///
    /// Returns the engine's progress output without interpreting it.
    fn build_image(&self, context: Vec<u8>, options: &BuildOptions) -> BuildOutputStream<'_>;

    /// Load images from a tarball produced by `docker save`.
    async fn load_image(&self, archive: Vec<u8>) -> Result<(), ImageError>;

    /// Remove unused images and volumes.
    async fn prune(&self) -> Result<PruneReport, ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("load failed: {0}")]
    LoadFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
