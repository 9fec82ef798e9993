// ABOUTME: Template for prebuilt images: `image` to pull, or `imageFile` to load.
// ABOUTME: Skips the build and goes straight to launch.

use super::{ProjectProbe, Template, TemplateContext};
use crate::config::ConfigError;
use crate::deploy::DeployError;
use crate::launch::{self, DeploymentRecord, LaunchRequest};
use async_trait::async_trait;

pub struct ImageTemplate;

#[async_trait]
impl Template for ImageTemplate {
    fn name(&self) -> &str {
        "image"
    }

    fn check(&self, probe: &ProjectProbe<'_>) -> bool {
        probe.config.image.is_some() || probe.config.image_file.is_some()
    }

    async fn execute(
        &self,
        ctx: &mut TemplateContext<'_>,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        let config = ctx.config;
        let image = config
            .image
            .as_deref()
            .filter(|i| !i.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::Invalid("`image` must name the image to run".to_string())
            })?;

        if let Some(file) = config.image_file.as_deref() {
            ctx.status.info(format!("Loading image from {}..", file));
            let archive = tokio::fs::read(ctx.dir.join(file)).await?;
            ctx.runtime.load_image(archive).await?;
            ctx.status.info("Image loaded");
        } else if !ctx.runtime.image_exists(image).await? {
            ctx.status.info(format!("Pulling image {}..", image));
            ctx.runtime.pull_image(image).await?;
        }

        ctx.status.info(format!("Starting deployment of {}..", image));
        let request = LaunchRequest {
            image,
            config,
            server: ctx.server,
            username: ctx.username,
            secrets: ctx.secrets,
        };
        let record = launch::launch(ctx.runtime, ctx.plugins, &request, ctx.diagnostics).await?;
        Ok(vec![record])
    }
}
