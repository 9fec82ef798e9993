// ABOUTME: Template for projects that ship their own Dockerfile.
// ABOUTME: Also hosts the shared build-then-launch path used by generated-Dockerfile templates.

use super::{ProjectProbe, Template, TemplateContext};
use crate::build;
use crate::deploy::DeployError;
use crate::launch::{self, DeploymentRecord, LABEL_PROJECT, LABEL_USER, LaunchRequest};
use crate::plugins::BuildConfigContext;
use crate::runtime::BuildOptions;
use crate::secrets::substitute;
use crate::types::image_tag;
use async_trait::async_trait;
use std::collections::HashMap;

pub const DOCKERFILE: &str = "Dockerfile";

pub struct DockerfileTemplate;

#[async_trait]
impl Template for DockerfileTemplate {
    fn name(&self) -> &str {
        "dockerfile"
    }

    fn check(&self, probe: &ProjectProbe<'_>) -> bool {
        probe.has_file(DOCKERFILE)
    }

    async fn execute(
        &self,
        ctx: &mut TemplateContext<'_>,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        ctx.status.info("Deploying Dockerfile project..");
        build_and_launch(ctx).await
    }
}

/// Build options for the project in `ctx`, before plugins see them.
fn build_options(ctx: &TemplateContext<'_>) -> BuildOptions {
    let build_args: HashMap<String, String> = substitute(&ctx.config.buildargs, ctx.secrets)
        .into_iter()
        .collect();
    let labels = HashMap::from([
        (LABEL_USER.to_string(), ctx.username.to_string()),
        (
            LABEL_PROJECT.to_string(),
            ctx.config.project_name().to_string(),
        ),
    ]);

    BuildOptions {
        tag: image_tag(ctx.username, &ctx.config.name),
        dockerfile: DOCKERFILE.to_string(),
        build_args,
        pull: true,
        labels,
    }
}

/// Build the project's Dockerfile and launch the result.
pub async fn build_and_launch(
    ctx: &mut TemplateContext<'_>,
) -> Result<Vec<DeploymentRecord>, DeployError> {
    let mut options = build_options(ctx);
    let hook = BuildConfigContext {
        options: &options,
        config: ctx.config,
        username: ctx.username,
        dir: ctx.dir,
    };
    if let Some(replaced) = ctx.plugins.build_config(&hook).await? {
        options = replaced;
    }

    ctx.status.info("Building image..");
    let built = build::build(ctx.runtime, ctx.dir, &options, ctx.status).await?;
    ctx.status.info(format!("Built image {}", built.image));

    ctx.status.info("Starting deployment..");
    let request = LaunchRequest {
        image: &built.image,
        config: ctx.config,
        server: ctx.server,
        username: ctx.username,
        secrets: ctx.secrets,
    };
    let record = launch::launch(ctx.runtime, ctx.plugins, &request, ctx.diagnostics).await?;
    Ok(vec![record])
}
