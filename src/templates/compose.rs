// ABOUTME: Template for docker-compose projects.
// ABOUTME: Rewrites the compose file with identity labels and the shared network, then runs compose.

use super::{ProjectProbe, Template, TemplateContext};
use crate::config::ConfigError;
use crate::deploy::DeployError;
use crate::launch::{
    DeploymentRecord, LABEL_DEPLOYMENT, LABEL_PROJECT, LABEL_USER, ensure_network,
};
use crate::plugins::ComposeContext;
use crate::runtime::ContainerFilters;
use crate::types::{NAME_PREFIX, kebab_case};
use async_trait::async_trait;
use serde_yaml::{Mapping, Value};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

pub const COMPOSE_FILES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

pub const GENERATED_COMPOSE_FILE: &str = "docker-compose.exoframe.yml";

const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

pub struct ComposeTemplate;

/// What to stamp onto every service.
#[derive(Debug, Clone, Copy)]
pub struct ComposeRewrite<'a> {
    pub compose_project: &'a str,
    pub username: &'a str,
    pub project: &'a str,
    pub network: &'a str,
}

fn key(s: &str) -> Value {
    Value::String(s.to_string())
}

fn labels_as_mapping(labels: Option<Value>) -> Mapping {
    match labels {
        Some(Value::Mapping(map)) => map,
        Some(Value::Sequence(items)) => items
            .into_iter()
            .filter_map(|item| {
                let s = item.as_str()?.to_string();
                let (k, v) = s.split_once('=').unwrap_or((s.as_str(), ""));
                Some((key(k), key(v)))
            })
            .collect(),
        _ => Mapping::new(),
    }
}

fn with_network(networks: Option<Value>, network: &str) -> Value {
    match networks {
        Some(Value::Sequence(mut items)) => {
            if !items.iter().any(|n| n.as_str() == Some(network)) {
                items.push(key(network));
            }
            Value::Sequence(items)
        }
        Some(Value::Mapping(mut map)) => {
            map.entry(key(network)).or_insert(Value::Null);
            Value::Mapping(map)
        }
        _ => Value::Sequence(vec![key("default"), key(network)]),
    }
}

/// Stamp labels and the shared network onto every service and declare the
/// network as external.
pub fn rewrite_compose(doc: Value, rw: &ComposeRewrite<'_>) -> Result<Value, ConfigError> {
    let Value::Mapping(mut root) = doc else {
        return Err(ConfigError::Invalid(
            "compose file must be a mapping".to_string(),
        ));
    };

    let Some(Value::Mapping(services)) = root.get_mut("services") else {
        return Err(ConfigError::Invalid(
            "compose file has no services".to_string(),
        ));
    };

    for (name, service) in services.iter_mut() {
        let Some(name) = name.as_str() else { continue };
        let Value::Mapping(service) = service else {
            continue;
        };

        let mut labels = labels_as_mapping(service.remove("labels"));
        let deployment = format!("{}-{}", rw.compose_project, kebab_case(name));
        labels.insert(key(LABEL_DEPLOYMENT), key(&deployment));
        labels.insert(key(LABEL_USER), key(rw.username));
        labels.insert(key(LABEL_PROJECT), key(rw.project));
        labels.insert(key("traefik.docker.network"), key(rw.network));
        service.insert(key("labels"), Value::Mapping(labels));

        let networks = with_network(service.remove("networks"), rw.network);
        service.insert(key("networks"), networks);
    }

    let mut external = Mapping::new();
    external.insert(key("external"), Value::Bool(true));
    let networks = root
        .entry(key("networks"))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !networks.is_mapping() {
        *networks = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(networks) = networks {
        networks.insert(key(rw.network), Value::Mapping(external));
    }

    Ok(Value::Mapping(root))
}

/// Run `docker compose up`, streaming output lines as verbose events.
async fn run_compose(
    dir: &Path,
    compose_project: &str,
    ctx: &TemplateContext<'_>,
) -> Result<Vec<String>, DeployError> {
    let mut child = Command::new("docker")
        .args([
            "compose",
            "-p",
            compose_project,
            "-f",
            GENERATED_COMPOSE_FILE,
            "up",
            "-d",
            "--build",
        ])
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut log = Vec::new();
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(DeployError::Compose {
            message: "compose output not captured".to_string(),
            log,
        });
    };
    let mut out = BufReader::new(stdout).lines();
    let mut err = BufReader::new(stderr).lines();
    let (mut out_done, mut err_done) = (false, false);

    while !(out_done && err_done) {
        let line = tokio::select! {
            line = out.next_line(), if !out_done => {
                let line = line?;
                out_done = line.is_none();
                line
            }
            line = err.next_line(), if !err_done => {
                let line = line?;
                err_done = line.is_none();
                line
            }
        };
        if let Some(line) = line {
            ctx.status.verbose(line.clone());
            log.push(line);
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(DeployError::Compose {
            message: format!("docker compose exited with {}", status),
            log,
        });
    }
    Ok(log)
}

#[async_trait]
impl Template for ComposeTemplate {
    fn name(&self) -> &str {
        "compose"
    }

    fn check(&self, probe: &ProjectProbe<'_>) -> bool {
        probe.first_file(COMPOSE_FILES).is_some()
    }

    async fn execute(
        &self,
        ctx: &mut TemplateContext<'_>,
    ) -> Result<Vec<DeploymentRecord>, DeployError> {
        let source = ctx
            .probe()
            .first_file(COMPOSE_FILES)
            .ok_or(DeployError::TemplateNotFound {
                name: Some(self.name().to_string()),
            })?;
        ctx.status.info(format!("Deploying compose project from {}..", source));

        let project = ctx.config.project_name();
        let compose_project = format!(
            "{}-{}-{}",
            NAME_PREFIX,
            kebab_case(ctx.username),
            kebab_case(project)
        );

        let raw = tokio::fs::read_to_string(ctx.dir.join(source)).await?;
        let doc: Value = serde_yaml::from_str(&raw).map_err(ConfigError::from)?;
        let rewritten = rewrite_compose(
            doc,
            &ComposeRewrite {
                compose_project: &compose_project,
                username: ctx.username,
                project,
                network: &ctx.server.exoframe_network,
            },
        )?;
        let yaml = serde_yaml::to_string(&rewritten).map_err(ConfigError::from)?;
        tokio::fs::write(ctx.dir.join(GENERATED_COMPOSE_FILE), yaml).await?;

        let hook = ComposeContext {
            compose: &rewritten,
            config: ctx.config,
            server: ctx.server,
            username: ctx.username,
            dir: ctx.dir,
            runtime: ctx.runtime,
        };
        if let Some(records) = ctx.plugins.compose(&hook).await? {
            return Ok(records);
        }

        ensure_network(ctx.runtime, &ctx.server.exoframe_network).await?;
        ctx.status.info("Starting compose services..");
        run_compose(ctx.dir, &compose_project, ctx).await?;

        let mut filters = ContainerFilters::default();
        filters
            .labels
            .insert(COMPOSE_PROJECT_LABEL.to_string(), compose_project.clone());
        let mut records = Vec::new();
        for summary in ctx.runtime.list_containers(&filters).await? {
            let info = ctx.runtime.inspect_container(&summary.id).await?;
            records.push(DeploymentRecord::from(info));
        }
        tracing::info!(project = %compose_project, services = records.len(), "compose project started");
        Ok(records)
    }
}
