// ABOUTME: Deploy orchestration: resolve a template, run it, report through status events.
// ABOUTME: Owns the engine, template and plugin registries, secrets and per-project locks.

mod error;
mod lock;

pub use error::DeployError;
pub use lock::{DeployLock, DeployLocks};

use crate::cleanup::{CleanupOutcome, CleanupPolicy, CleanupTask, ExistingContainer, schedule_cleanup};
use crate::config::{ProjectConfig, SharedServerConfig};
use crate::diagnostics::Diagnostics;
use crate::launch::DeploymentRecord;
use crate::plugins::PluginRegistry;
use crate::proxy::{ProxyOutcome, ProxyPaths, ensure_proxy_running};
use crate::runtime::{ContainerError, ContainerFilters, Runtime};
use crate::secrets::SecretStore;
use crate::status::{StatusEvent, StatusSink};
use crate::templates::{ProjectProbe, TemplateContext, TemplateRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One deploy of a project directory on behalf of a user.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub username: String,
    pub dir: PathBuf,
    /// Retire the project's running containers once their replacements are
    /// up. They are looked up while the project lock is held.
    pub update: bool,
}

impl DeployRequest {
    pub fn new(username: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            username: username.into(),
            dir: dir.into(),
            update: false,
        }
    }

    pub fn updating(mut self) -> Self {
        self.update = true;
        self
    }
}

/// What a finished deploy produced.
#[derive(Debug)]
pub struct Deployed {
    pub project: String,
    pub deployments: Vec<DeploymentRecord>,
    /// Containers running before an update deploy started.
    pub superseded: Option<Vec<ExistingContainer>>,
}

/// A deploy in flight.
#[derive(Debug)]
pub struct DeployHandle {
    /// Ordered status stream. Ends with a deployments-bearing event or one
    /// error event.
    pub events: mpsc::UnboundedReceiver<StatusEvent>,
    /// Resolves once the deploy finishes.
    pub finished: JoinHandle<DeployOutcome>,
}

#[derive(Debug)]
pub struct DeployOutcome {
    pub deployments: Vec<DeploymentRecord>,
    pub succeeded: bool,
    /// Background cleanup of superseded containers, for update deploys.
    pub cleanup: Option<JoinHandle<CleanupOutcome>>,
}

/// Entry point for deploys.
#[derive(Clone)]
pub struct Orchestrator {
    runtime: Arc<dyn Runtime>,
    templates: Arc<TemplateRegistry>,
    plugins: Arc<PluginRegistry>,
    server: SharedServerConfig,
    secrets: Arc<dyn SecretStore>,
    locks: DeployLocks,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("templates", &self.templates)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        runtime: Arc<dyn Runtime>,
        templates: TemplateRegistry,
        plugins: PluginRegistry,
        server: SharedServerConfig,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            runtime,
            templates: Arc::new(templates),
            plugins: Arc::new(plugins),
            server,
            secrets,
            locks: DeployLocks::new(),
        }
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    pub fn server(&self) -> &SharedServerConfig {
        &self.server
    }

    /// Start a deploy in the background and hand back its status stream.
    pub fn resolve_and_deploy(&self, request: DeployRequest) -> DeployHandle {
        let (status, events) = StatusSink::channel();
        let this = self.clone();
        let finished = tokio::spawn(async move { this.run(request, status).await });
        DeployHandle { events, finished }
    }

    async fn run(self, request: DeployRequest, status: StatusSink) -> DeployOutcome {
        let username = request.username.clone();
        match self.deploy(&request, &status).await {
            Ok(Deployed {
                project,
                deployments,
                superseded,
            }) => {
                status.send(
                    StatusEvent::info("Deployment success!").with_deployments(deployments.clone()),
                );
                let cleanup = superseded.map(|existing| {
                    self.schedule_cleanup(CleanupTask::new(username, project, existing))
                });
                DeployOutcome {
                    deployments,
                    succeeded: true,
                    cleanup,
                }
            }
            Err(e) => {
                tracing::error!(user = %username, dir = %request.dir.display(), error = %e, "deploy failed");
                status.error(e.to_string(), e.log());
                DeployOutcome {
                    deployments: Vec::new(),
                    succeeded: false,
                    cleanup: None,
                }
            }
        }
    }

    /// Run one deploy to completion. Terminal events are left to the caller.
    pub async fn deploy(
        &self,
        request: &DeployRequest,
        status: &StatusSink,
    ) -> Result<Deployed, DeployError> {
        let config = ProjectConfig::discover(&request.dir)?;
        let server = self.server.snapshot();
        let project = config.project_name().to_string();

        let _lock = self.locks.acquire(&request.username, &project).await;

        let template = self
            .templates
            .resolve(&ProjectProbe::new(&request.dir, &config))?;
        tracing::info!(
            user = %request.username,
            project = %project,
            template = template.name(),
            "deploying"
        );
        status.verbose(format!("Deploying project using {} template..", template.name()));

        // Snapshot under the lock so a queued update sees the previous update's containers
        let superseded = if request.update {
            let existing = self.find_existing(&request.username, &project).await?;
            tracing::info!(project = %project, count = existing.len(), "updating deployments");
            Some(existing)
        } else {
            None
        };

        let secrets = self.secrets.secrets_for(&request.username);
        let mut diagnostics = Diagnostics::default();
        let result = {
            let mut ctx = TemplateContext {
                dir: &request.dir,
                config: &config,
                server: &server,
                username: &request.username,
                secrets: &secrets,
                runtime: self.runtime.as_ref(),
                plugins: &self.plugins,
                status,
                diagnostics: &mut diagnostics,
            };
            template.execute(&mut ctx).await
        };

        for warning in diagnostics.warnings() {
            status.verbose(warning.message.clone());
        }

        result.map(|deployments| Deployed {
            project,
            deployments,
            superseded,
        })
    }

    /// Bring the reverse proxy up with the current server config.
    ///
    /// A failure is logged and left for the next bootstrap; deploys go ahead
    /// without it.
    pub async fn bootstrap_proxy(&self, config_dir: &Path) -> Option<ProxyOutcome> {
        let server = self.server.snapshot();
        let paths = ProxyPaths::detect(self.runtime.as_ref(), config_dir).await;
        match ensure_proxy_running(self.runtime.as_ref(), &server, &paths).await {
            Ok(outcome) => {
                tracing::debug!(?outcome, "proxy bootstrap finished");
                Some(outcome)
            }
            Err(e) => {
                tracing::warn!(error = %e, "proxy bootstrap failed");
                None
            }
        }
    }

    /// Running containers of a user's project.
    pub async fn find_existing(
        &self,
        username: &str,
        project: &str,
    ) -> Result<Vec<ExistingContainer>, ContainerError> {
        find_existing(self.runtime.as_ref(), username, project).await
    }

    /// Retire superseded containers in the background.
    pub fn schedule_cleanup(&self, task: CleanupTask) -> JoinHandle<CleanupOutcome> {
        let policy = CleanupPolicy::from_server(&self.server.snapshot());
        schedule_cleanup(self.runtime.clone(), task, policy)
    }
}

/// Running containers labelled with the user and project.
pub async fn find_existing<C: crate::runtime::ContainerOps + ?Sized>(
    containers: &C,
    username: &str,
    project: &str,
) -> Result<Vec<ExistingContainer>, ContainerError> {
    let filters = ContainerFilters::for_project(username, project);
    let found = containers.list_containers(&filters).await?;
    tracing::debug!(user = %username, project = %project, count = found.len(), "existing deployments");
    Ok(found.iter().map(ExistingContainer::from).collect())
}
