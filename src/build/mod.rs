// ABOUTME: Image build executor: packs the project, streams the engine build, aggregates the log.
// ABOUTME: Any error fragment fails the build; failures are terminal for the deploy attempt.

mod archive;
mod output;

pub use archive::{pack_directory, pack_directory_async};
pub use output::{BuildLine, classify};

use crate::runtime::{BuildOptions, ImageOps};
use crate::status::{StatusEvent, StatusSink};
use futures::StreamExt;
use std::path::Path;

/// A finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub log: Vec<String>,
    pub image: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to package build context: {0}")]
    Archive(#[from] std::io::Error),

    #[error("build of {image} failed: {message}")]
    Failed {
        message: String,
        image: String,
        log: Vec<String>,
    },
}

impl BuildError {
    pub fn log(&self) -> &[String] {
        match self {
            BuildError::Failed { log, .. } => log,
            BuildError::Archive(_) => &[],
        }
    }
}

/// Build `dir` into `options.tag`.
///
/// Log lines are forwarded to `status` as verbose events while the build
/// runs. Error fragments are flagged with `{"buildError": true}` in the
/// event data; the single error-level event for a failed build is left to
/// the caller.
pub async fn build<I: ImageOps + ?Sized>(
    images: &I,
    dir: &Path,
    options: &BuildOptions,
    status: &StatusSink,
) -> Result<BuildResult, BuildError> {
    let context = pack_directory_async(dir.to_path_buf()).await?;
    tracing::debug!(tag = %options.tag, bytes = context.len(), "starting image build");

    let mut stream = images.build_image(context, options);
    let mut log = Vec::new();
    let mut first_error: Option<String> = None;

    while let Some(item) = stream.next().await {
        let line = match item {
            Ok(fragment) => classify(&fragment),
            Err(e) => BuildLine::Error(e.to_string()),
        };

        let text = line.text().to_string();
        let mut event = StatusEvent::verbose(text.trim_end());
        if line.is_error() {
            event = event.with_data(serde_json::json!({ "buildError": true }));
            first_error.get_or_insert_with(|| text.clone());
        }
        status.send(event);
        log.push(text);
    }

    match first_error {
        Some(message) => {
            tracing::warn!(tag = %options.tag, error = %message, "image build failed");
            Err(BuildError::Failed {
                message,
                image: options.tag.clone(),
                log,
            })
        }
        None => {
            tracing::info!(tag = %options.tag, lines = log.len(), "image built");
            Ok(BuildResult {
                log,
                image: options.tag.clone(),
            })
        }
    }
}
