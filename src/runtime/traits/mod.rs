// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines ContainerOps, ImageOps, NetworkOps and the combined Runtime.

mod container;
mod image;
mod network;
mod shared_types;

pub use container::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
pub use image::{BuildOutputStream, ImageError, ImageOps};
pub use network::{NetworkError, NetworkOps};
pub use shared_types::*;

/// Everything the deployment engine needs from a container engine.
///
/// Implemented automatically for any type providing all capabilities, so
/// components can hold an `Arc<dyn Runtime>`.
pub trait Runtime: ContainerOps + ImageOps + NetworkOps {}

impl<T: ContainerOps + ImageOps + NetworkOps> Runtime for T {}
