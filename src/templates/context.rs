// ABOUTME: Inputs handed to templates: the project probe and the execution context.
// ABOUTME: Probes only look at the filesystem; execution gets engine, plugins and status sink.

use crate::config::{ProjectConfig, ServerConfig};
use crate::diagnostics::Diagnostics;
use crate::plugins::PluginRegistry;
use crate::runtime::Runtime;
use crate::secrets::Secret;
use crate::status::StatusSink;
use std::path::Path;

/// Read-only view of a project used by template checks.
#[derive(Debug, Clone, Copy)]
pub struct ProjectProbe<'a> {
    pub dir: &'a Path,
    pub config: &'a ProjectConfig,
}

impl<'a> ProjectProbe<'a> {
    pub fn new(dir: &'a Path, config: &'a ProjectConfig) -> Self {
        Self { dir, config }
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.dir.join(name).is_file()
    }

    /// First of `names` present in the project.
    pub fn first_file<'n>(&self, names: &[&'n str]) -> Option<&'n str> {
        names.iter().copied().find(|n| self.has_file(n))
    }
}

/// Everything a template needs to run a deploy.
pub struct TemplateContext<'a> {
    pub dir: &'a Path,
    pub config: &'a ProjectConfig,
    pub server: &'a ServerConfig,
    pub username: &'a str,
    pub secrets: &'a [Secret],
    pub runtime: &'a dyn Runtime,
    pub plugins: &'a PluginRegistry,
    pub status: &'a StatusSink,
    pub diagnostics: &'a mut Diagnostics,
}

impl TemplateContext<'_> {
    pub fn probe(&self) -> ProjectProbe<'_> {
        ProjectProbe::new(self.dir, self.config)
    }
}
