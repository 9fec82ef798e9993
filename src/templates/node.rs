// ABOUTME: Template for Node.js projects identified by package.json.
// ABOUTME: Writes a Dockerfile using yarn or npm, then builds and launches it.

use super::dockerfile::{DOCKERFILE, build_and_launch};
use super::{ProjectProbe, Template, TemplateContext};
use crate::deploy::DeployError;
use crate::launch::DeploymentRecord;
use async_trait::async_trait;

pub struct NodeTemplate;

/// Dockerfile for a node project.
pub fn node_dockerfile(use_yarn: bool, has_package_lock: bool) -> String {
    let (lock_copy, install, start) = if use_yarn {
        (
            "COPY yarn.lock /usr/src/app/\n",
            "RUN yarn install --production --frozen-lockfile",
            r#"CMD ["yarn", "start"]"#,
        )
    } else if has_package_lock {
        (
            "COPY package-lock.json /usr/src/app/\n",
            "RUN npm ci --omit=dev",
            r#"CMD ["npm", "start"]"#,
        )
    } else {
        ("", "RUN npm install --omit=dev", r#"CMD ["npm", "start"]"#)
    };

    format!(
        "FROM node:lts-alpine

RUN mkdir -p /usr/src/app
WORKDIR /usr/src/app

COPY package.json /usr/src/app/
{lock_copy}{install}

COPY . /usr/src/app

EXPOSE 80

{start}
"
    )
}

#[async_trait]
impl Template for NodeTemplate {
    fn name(&self) -> &str {
        "node"
    }

    fn check(&self, probe: &ProjectProbe<'_>) -> bool {
        probe.has_file("package.json")
    }

    async fn execute(
        &self,
        ctx: &mut TemplateContext<'_>,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        let probe = ctx.probe();
        let use_yarn = probe.has_file("yarn.lock");
        let has_package_lock = probe.has_file("package-lock.json");

        let dockerfile = node_dockerfile(use_yarn, has_package_lock);
        tokio::fs::write(ctx.dir.join(DOCKERFILE), &dockerfile).await?;
        ctx.status.info(format!(
            "Deploying Node.js project using {}..",
            if use_yarn { "yarn" } else { "npm" }
        ));
        ctx.status.debug(dockerfile);

        build_and_launch(ctx).await
    }
}
