// ABOUTME: Template for static sites identified by index.html.
// ABOUTME: Serves the project directory from nginx.

use super::dockerfile::{DOCKERFILE, build_and_launch};
use super::{ProjectProbe, Template, TemplateContext};
use crate::deploy::DeployError;
use crate::launch::DeploymentRecord;
use async_trait::async_trait;

pub struct StaticTemplate;

pub fn static_dockerfile() -> &'static str {
    "FROM nginx:alpine
COPY . /usr/share/nginx/html
RUN chmod -R 755 /usr/share/nginx/html
"
}

#[async_trait]
impl Template for StaticTemplate {
    fn name(&self) -> &str {
        "static"
    }

    fn check(&self, probe: &ProjectProbe<'_>) -> bool {
        probe.has_file("index.html")
    }

    async fn execute(
        &self,
        ctx: &mut TemplateContext<'_>,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        tokio::fs::write(ctx.dir.join(DOCKERFILE), static_dockerfile()).await?;
        ctx.status.info("Deploying static HTML project..");
        build_and_launch(ctx).await
    }
}
