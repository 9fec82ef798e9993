// ABOUTME: Plugin hook protocol: start, build-config and compose extension points.
// ABOUTME: Plugins run in install order; an exclusive plugin's result short-circuits the default path.

use crate::config::{ProjectConfig, ServerConfig};
use crate::diagnostics::{Diagnostics, Warning};
use crate::launch::{ContainerSpec, DeploymentRecord};
use crate::runtime::{BuildOptions, Runtime};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("plugin {plugin} failed: {message}")]
pub struct PluginError {
    pub plugin: String,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

/// Context for the `start` hook: the assembled container spec, before
/// anything is created.
pub struct StartContext<'a> {
    pub spec: &'a ContainerSpec,
    pub config: &'a ProjectConfig,
    pub server: &'a ServerConfig,
    pub username: &'a str,
    pub runtime: &'a dyn Runtime,
}

/// Context for the `build_config` hook.
pub struct BuildConfigContext<'a> {
    pub options: &'a BuildOptions,
    pub config: &'a ProjectConfig,
    pub username: &'a str,
    pub dir: &'a Path,
}

/// Context for the `compose` hook: the rewritten compose document.
pub struct ComposeContext<'a> {
    pub compose: &'a serde_yaml::Value,
    pub config: &'a ProjectConfig,
    pub server: &'a ServerConfig,
    pub username: &'a str,
    pub dir: &'a Path,
    pub runtime: &'a dyn Runtime,
}

/// An installed extension. Every hook defaults to "not handled".
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Whether a returned result replaces the default path.
    fn exclusive(&self) -> bool {
        false
    }

    async fn start(
        &self,
        _ctx: &StartContext<'_>,
    ) -> Result<Option<DeploymentRecord>, PluginError> {
        Ok(None)
    }

    async fn build_config(
        &self,
        _ctx: &BuildConfigContext<'_>,
    ) -> Result<Option<BuildOptions>, PluginError> {
        Ok(None)
    }

    async fn compose(
        &self,
        _ctx: &ComposeContext<'_>,
    ) -> Result<Option<Vec<DeploymentRecord>>, PluginError> {
        Ok(None)
    }
}

/// Plugins in install order. Owned by the orchestrator and passed down.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name()))
            .finish()
    }
}

impl PluginRegistry {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>, diagnostics: &mut Diagnostics) -> Self {
        let exclusive: Vec<&str> = plugins
            .iter()
            .filter(|p| p.exclusive())
            .map(|p| p.name())
            .collect();
        if exclusive.len() > 1 {
            diagnostics.warn(Warning::multiple_exclusive_plugins(&exclusive));
        }
        Self { plugins }
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub async fn start(
        &self,
        ctx: &StartContext<'_>,
    ) -> Result<Option<DeploymentRecord>, PluginError> {
        for plugin in &self.plugins {
            let result = plugin.start(ctx).await?;
            if result.is_some() && plugin.exclusive() {
                tracing::debug!(plugin = plugin.name(), "start handled by plugin");
                return Ok(result);
            }
        }
        Ok(None)
    }

    pub async fn build_config(
        &self,
        ctx: &BuildConfigContext<'_>,
    ) -> Result<Option<BuildOptions>, PluginError> {
        for plugin in &self.plugins {
            let result = plugin.build_config(ctx).await?;
            if result.is_some() && plugin.exclusive() {
                tracing::debug!(plugin = plugin.name(), "build config handled by plugin");
                return Ok(result);
            }
        }
        Ok(None)
    }

    pub async fn compose(
        &self,
        ctx: &ComposeContext<'_>,
    ) -> Result<Option<Vec<DeploymentRecord>>, PluginError> {
        for plugin in &self.plugins {
            let result = plugin.compose(ctx).await?;
            if result.is_some() && plugin.exclusive() {
                tracing::debug!(plugin = plugin.name(), "compose handled by plugin");
                return Ok(result);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::WarningKind;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tagger {
        name: &'static str,
        exclusive: bool,
        answer: bool,
        calls: AtomicUsize,
    }

    impl Tagger {
        fn new(name: &'static str, exclusive: bool, answer: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                exclusive,
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Plugin for Tagger {
        fn name(&self) -> &str {
            self.name
        }

        fn exclusive(&self) -> bool {
            self.exclusive
        }

        async fn build_config(
            &self,
            ctx: &BuildConfigContext<'_>,
        ) -> Result<Option<BuildOptions>, PluginError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.answer {
                return Ok(None);
            }
            let mut options = ctx.options.clone();
            options.labels.insert("by".to_string(), self.name.to_string());
            Ok(Some(options))
        }
    }

    struct Failing;

    #[async_trait]
    impl Plugin for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn build_config(
            &self,
            _ctx: &BuildConfigContext<'_>,
        ) -> Result<Option<BuildOptions>, PluginError> {
            Err(PluginError::new("failing", "nope"))
        }
    }

    async fn run(registry: &PluginRegistry) -> Result<Option<BuildOptions>, PluginError> {
        let options = BuildOptions {
            tag: "t".to_string(),
            labels: HashMap::new(),
            ..Default::default()
        };
        let config = ProjectConfig {
            name: "demo".to_string(),
            ..Default::default()
        };
        let ctx = BuildConfigContext {
            options: &options,
            config: &config,
            username: "admin",
            dir: Path::new("."),
        };
        registry.build_config(&ctx).await
    }

    #[tokio::test]
    async fn non_exclusive_result_falls_through() {
        let augment = Tagger::new("augment", false, true);
        let mut diag = Diagnostics::default();
        let registry = PluginRegistry::new(vec![augment.clone() as Arc<dyn Plugin>], &mut diag);

        assert!(run(&registry).await.unwrap().is_none());
        assert_eq!(augment.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_exclusive_result_wins() {
        let skip = Tagger::new("skip", true, false);
        let winner = Tagger::new("winner", true, true);
        let never = Tagger::new("never", true, true);
        let mut diag = Diagnostics::default();
        let plugins: Vec<Arc<dyn Plugin>> = vec![skip.clone(), winner, never.clone()];
        let registry = PluginRegistry::new(plugins, &mut diag);

        let options = run(&registry).await.unwrap().unwrap();
        assert_eq!(options.labels["by"], "winner");
        assert_eq!(skip.calls.load(Ordering::SeqCst), 1);
        assert_eq!(never.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn multiple_exclusive_plugins_warn() {
        let mut diag = Diagnostics::default();
        let plugins: Vec<Arc<dyn Plugin>> =
            vec![Tagger::new("a", true, false), Tagger::new("b", true, false)];
        PluginRegistry::new(plugins, &mut diag);
        assert_eq!(diag.warnings().len(), 1);
        assert_eq!(
            diag.warnings()[0].kind,
            WarningKind::MultipleExclusivePlugins
        );
    }

    #[tokio::test]
    async fn plugin_error_aborts_chain() {
        let after = Tagger::new("after", true, true);
        let mut diag = Diagnostics::default();
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(Failing), after.clone()];
        let registry = PluginRegistry::new(plugins, &mut diag);

        let err = run(&registry).await.unwrap_err();
        assert_eq!(err.plugin, "failing");
        assert_eq!(after.calls.load(Ordering::SeqCst), 0);
    }
}
