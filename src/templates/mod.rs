// ABOUTME: Deployment templates and the resolver that picks one per project.
// ABOUTME: Built-ins are probed in a fixed order, followed by installed third-party templates.

mod compose;
mod context;
mod dockerfile;
mod image;
mod node;
mod static_html;

pub use compose::{COMPOSE_FILES, ComposeTemplate, GENERATED_COMPOSE_FILE, rewrite_compose};
pub use context::{ProjectProbe, TemplateContext};
pub use dockerfile::{DockerfileTemplate, build_and_launch};
pub use image::ImageTemplate;
pub use node::{NodeTemplate, node_dockerfile};
pub use static_html::{StaticTemplate, static_dockerfile};

use crate::deploy::DeployError;
use crate::launch::DeploymentRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// A named build strategy.
#[async_trait]
pub trait Template: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this template applies. Must be cheap and side-effect free.
    fn check(&self, probe: &ProjectProbe<'_>) -> bool;

    /// Run the deploy, reporting progress through `ctx.status`.
    async fn execute(
        &self,
        ctx: &mut TemplateContext<'_>,
    ) -> Result<Vec<DeploymentRecord>, DeployError>;
}

/// Ordered set of templates.
#[derive(Clone)]
pub struct TemplateRegistry {
    templates: Vec<Arc<dyn Template>>,
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateRegistry {
    /// Built-in templates in priority order.
    pub fn builtin() -> Self {
        Self {
            templates: vec![
                Arc::new(ImageTemplate),
                Arc::new(ComposeTemplate),
                Arc::new(DockerfileTemplate),
                Arc::new(NodeTemplate),
                Arc::new(StaticTemplate),
            ],
        }
    }

    pub fn empty() -> Self {
        Self {
            templates: Vec::new(),
        }
    }

    /// Append a third-party template after everything already installed.
    pub fn install(&mut self, template: Arc<dyn Template>) {
        tracing::debug!(template = template.name(), "template installed");
        self.templates.push(template);
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name()).collect()
    }

    /// Pick the template for a project.
    ///
    /// An explicit `template` is looked up by exact name with no fallback
    /// scan. Otherwise the first template whose check passes wins.
    pub fn resolve(&self, probe: &ProjectProbe<'_>) -> Result<Arc<dyn Template>, DeployError> {
        if let Some(name) = probe.config.template.as_deref() {
            return self
                .templates
                .iter()
                .find(|t| t.name() == name)
                .cloned()
                .ok_or_else(|| DeployError::TemplateNotFound {
                    name: Some(name.to_string()),
                });
        }

        self.templates
            .iter()
            .find(|t| t.check(probe))
            .cloned()
            .ok_or(DeployError::TemplateNotFound { name: None })
    }
}
